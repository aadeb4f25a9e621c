use std::sync::{Arc, mpsc};
use std::time::Duration;

use anyhow::Result;
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::info;

use crate::app::{App, Session};
use crate::audio::{ENDED, FAILED, PAUSED, PROGRESS, READY, RodioSink, STARTED};
use crate::bus::{Notice, NotificationBus};
use crate::config;
use crate::library::{METADATA_LOADED, TRACK_CHANGED, TRACKS_FILTERED};
use crate::remote::{CredentialStore, ProxyClient, SessionCredentials};

mod event_loop;
mod fetch;
pub mod logging;
mod settings;
mod startup;

pub use settings::load_settings;

/// Events the view model listens to.
const FORWARDED: [&str; 9] = [
    PROGRESS,
    READY,
    STARTED,
    PAUSED,
    ENDED,
    FAILED,
    METADATA_LOADED,
    TRACKS_FILTERED,
    TRACK_CHANGED,
];

/// Run the interactive player until the user quits.
pub fn run(settings: config::Settings) -> Result<()> {
    let credentials = Arc::new(SessionCredentials::new(settings.proxy.token.clone()));
    let client = Arc::new(ProxyClient::new(
        &settings.proxy.url,
        Duration::from_secs(settings.proxy.timeout_secs),
        credentials.clone(),
    ));

    let (done_tx, done_rx) = mpsc::channel();
    let fetcher = fetch::ThreadFetcher::new(client, done_tx);

    let bus = Arc::new(NotificationBus::new());
    let (notice_tx, notice_rx) = mpsc::channel::<(String, Notice)>();
    for event in FORWARDED {
        let tx = notice_tx.clone();
        bus.subscribe(event, move |notice: &Notice| {
            let _ = tx.send((event.to_string(), notice.clone()));
        });
    }

    let mut session = Session::new(bus, RodioSink::new(), fetcher, StdRng::from_os_rng());
    startup::apply_playback_defaults(&mut session, &settings);

    let mut app = App::new(settings.ui.follow_playback);
    if credentials.get().is_none() {
        app.enter_token_mode();
        app.set_status("Access token required");
    } else {
        session.fetcher().request_metadata();
        app.set_status("Loading library");
    }
    info!(proxy = %settings.proxy.url, "starting");

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let ctx = event_loop::LoopContext {
        settings: &settings,
        credentials: credentials.as_ref(),
        completions: &done_rx,
        notices: &notice_rx,
    };
    let mut state = event_loop::EventLoopState::new();
    let run_result = event_loop::run(&mut terminal, &ctx, &mut app, &mut session, &mut state);

    // Make sure the sink is torn down even when the loop bailed out.
    session.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    info!("bye");
    run_result
}
