use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

use crate::app::{App, InputMode, Session, View};
use crate::audio::MediaSink;
use crate::bus::Notice;
use crate::config;
use crate::remote::{ArtSource, AudioSource, CredentialStore, MetadataSource};
use crate::runtime::fetch::{Completion, ThreadFetcher};
use crate::ui;

/// State tracked by the runtime event loop across iterations.
#[derive(Debug, Default)]
pub struct EventLoopState {
    /// Two-key prefix state used for `gg`.
    pub pending_gg: bool,
    /// Two-key prefix state used for `zz`.
    pending_zz: bool,
}

impl EventLoopState {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_prefixes(&mut self) {
        self.pending_gg = false;
        self.pending_zz = false;
    }
}

/// Everything the loop needs besides the session and the view model.
pub struct LoopContext<'a> {
    pub settings: &'a config::Settings,
    pub credentials: &'a dyn CredentialStore,
    pub completions: &'a Receiver<Completion>,
    /// Bus notifications forwarded as `(event, payload)`.
    pub notices: &'a Receiver<(String, Notice)>,
}

/// Main terminal event loop: applies fetch results and bus notifications,
/// drives the engine, draws, and handles input. Returns when the user quits.
pub fn run<S, C>(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ctx: &LoopContext<'_>,
    app: &mut App,
    session: &mut Session<S, ThreadFetcher<C>>,
    state: &mut EventLoopState,
) -> Result<()>
where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    loop {
        while let Ok(done) = ctx.completions.try_recv() {
            apply_completion(done, app, session);
        }

        session.tick();

        while let Ok((event, notice)) = ctx.notices.try_recv() {
            app.apply_notice(&event, &notice);
        }

        let ids = app.visible_ids(session.store());
        if app.rows_dirty {
            app.clamp_selection(ids.len());
            app.rows_dirty = false;
        }
        app.apply_follow(&ids);

        terminal.draw(|f| {
            ui::draw(f, app, session, &ids, &ctx.settings.ui, &ctx.settings.controls)
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                handle_key_event(key, ctx, app, session, &ids, state);
            }
        }

        if app.quit {
            session.shutdown();
            return Ok(());
        }
    }
}

/// Fold one finished fetch into the session.
pub fn apply_completion<S, C>(
    done: Completion,
    app: &mut App,
    session: &mut Session<S, ThreadFetcher<C>>,
) where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    match done {
        Completion::Metadata(Ok(manifest)) => {
            let tracks = manifest.tracks.len();
            session.load_library(manifest);
            // Loading clears the store's filter; keep what the user typed.
            if !app.filter_query.is_empty() {
                session.filter(&app.filter_query);
            }
            app.set_status(format!("{tracks} tracks"));
        }
        Completion::Metadata(Err(e)) => {
            warn!(error = %e, "metadata fetch failed");
            if e.is_auth() {
                app.enter_token_mode();
                app.set_status("Access token required");
            } else {
                app.set_status(format!("Library unavailable: {e}"));
            }
        }
        Completion::Audio { token, result } => {
            if let Err(e) = session.on_audio_fetched(token, result) {
                if e.is_auth() {
                    app.enter_token_mode();
                }
                app.set_status(e.to_string());
            }
        }
        Completion::Art { album_id, bytes } => session.on_art_fetched(&album_id, bytes),
    }
}

/// Handle one key press. `ids` are the rows currently on screen.
pub fn handle_key_event<S, C>(
    key: KeyEvent,
    ctx: &LoopContext<'_>,
    app: &mut App,
    session: &mut Session<S, ThreadFetcher<C>>,
    ids: &[String],
    state: &mut EventLoopState,
) where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    match app.input {
        InputMode::Filter => {
            state.clear_prefixes();
            handle_filter_key(key, app, session, ids);
            return;
        }
        InputMode::Token => {
            state.clear_prefixes();
            handle_token_key(key, ctx, app, session);
            return;
        }
        InputMode::Normal => {}
    }

    let controls = &ctx.settings.controls;
    let scrub = Duration::from_secs(controls.scrub_seconds);

    match key.code {
        KeyCode::Char('q') => app.quit = true,
        KeyCode::Tab => app.toggle_view(),
        KeyCode::Char('/') => app.enter_filter_mode(),
        KeyCode::Char('t') => app.enter_token_mode(),
        KeyCode::Esc => {
            if !app.back() && !app.filter_query.is_empty() {
                app.clear_filter();
                session.filter("");
            }
        }
        KeyCode::Char('g') => {
            if state.pending_gg {
                app.follow_playback_off();
                app.select_first();
            }
            state.pending_gg = !state.pending_gg;
            state.pending_zz = false;
            return;
        }
        KeyCode::Char('z') => {
            if state.pending_zz {
                jump_to_playing(app, session);
            }
            state.pending_zz = !state.pending_zz;
            state.pending_gg = false;
            return;
        }
        KeyCode::Char('G') => {
            app.follow_playback_off();
            app.select_last(ids.len());
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.follow_playback_off();
            app.move_selection(1, ids.len());
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.follow_playback_off();
            app.move_selection(-1, ids.len());
        }
        KeyCode::Enter => activate_selected(app, session, ids),
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            app.follow_playback_on();
            if let Err(e) = session.toggle_play_pause() {
                app.set_status(e.to_string());
            }
        }
        KeyCode::Char('l') => {
            app.follow_playback_on();
            if !session.skip_next() {
                app.set_status("End of queue");
            }
        }
        KeyCode::Char('h') => {
            app.follow_playback_on();
            if !session.skip_previous() {
                app.set_status("Start of queue");
            }
        }
        KeyCode::Char('L') => session.seek_by(scrub, true),
        KeyCode::Char('H') => session.seek_by(scrub, false),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            let level = session.adjust_volume(controls.volume_step);
            app.set_status(format!("Volume {:.0}%", level * 100.0));
        }
        KeyCode::Char('-') => {
            let level = session.adjust_volume(-controls.volume_step);
            app.set_status(format!("Volume {:.0}%", level * 100.0));
        }
        KeyCode::Char('s') => {
            let on = session.toggle_shuffle();
            app.set_status(if on { "Shuffle on" } else { "Shuffle off" });
        }
        KeyCode::Char('r') => {
            let mode = session.cycle_repeat();
            app.set_status(format!("Repeat {}", mode.label()));
        }
        KeyCode::Char('a') => queue_album(app, session, ids),
        KeyCode::Char('Q') => {
            let n = session.queue_filtered();
            if n > 0 {
                app.set_status(format!("Queued {n} tracks"));
            } else {
                app.set_status("Nothing to queue");
            }
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit = true,
        KeyCode::Char('c') => {
            session.reset_queue();
            app.set_status("Queue follows the library");
        }
        KeyCode::Char('R') => {
            info!("reloading library");
            session.fetcher().request_metadata();
            app.set_status("Reloading library");
        }
        _ => {}
    }

    state.clear_prefixes();
}

fn handle_filter_key<S, C>(
    key: KeyEvent,
    app: &mut App,
    session: &mut Session<S, ThreadFetcher<C>>,
    ids: &[String],
) where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    match key.code {
        KeyCode::Esc => {
            app.clear_filter();
            session.filter("");
        }
        KeyCode::Backspace => {
            app.pop_filter_char();
            session.filter(&app.filter_query);
        }
        KeyCode::Down => app.move_selection(1, ids.len()),
        KeyCode::Up => app.move_selection(-1, ids.len()),
        KeyCode::Char('j') | KeyCode::Char('n') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.move_selection(1, ids.len());
        }
        KeyCode::Char('k') | KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.move_selection(-1, ids.len());
        }
        KeyCode::Char(c) if !c.is_control() => {
            app.push_filter_char(c);
            session.filter(&app.filter_query);
        }
        KeyCode::Enter => {
            if ids.is_empty() {
                return;
            }
            app.exit_input_mode();
            activate_selected(app, session, ids);
        }
        _ => {}
    }
}

fn handle_token_key<S, C>(
    key: KeyEvent,
    ctx: &LoopContext<'_>,
    app: &mut App,
    session: &mut Session<S, ThreadFetcher<C>>,
) where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    match key.code {
        KeyCode::Esc => {
            app.token_input.clear();
            app.exit_input_mode();
        }
        KeyCode::Backspace => {
            app.token_input.pop();
        }
        KeyCode::Char(c) if !c.is_control() => app.token_input.push(c),
        KeyCode::Enter => match app.take_token() {
            Some(token) => {
                ctx.credentials.set(&token);
                session.fetcher().request_metadata();
                app.set_status("Token saved, loading library");
            }
            None => {
                ctx.credentials.clear();
                app.set_status("Token cleared");
            }
        },
        _ => {}
    }
}

/// Enter: play the selected track, or open the selected album.
fn activate_selected<S, C>(app: &mut App, session: &mut Session<S, ThreadFetcher<C>>, ids: &[String])
where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    let Some(id) = ids.get(app.selected) else {
        return;
    };
    if app.view == View::Albums {
        app.open_album(id);
        return;
    }
    if session.store().is_current(id) && session.engine().is_playing() {
        return;
    }
    app.follow_playback_on();
    session.play_track(id);
}

fn queue_album<S, C>(app: &mut App, session: &mut Session<S, ThreadFetcher<C>>, ids: &[String])
where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    let album_id = match &app.view {
        View::Albums => ids.get(app.selected).cloned(),
        View::Album(id) => Some(id.clone()),
        View::Tracks => ids
            .get(app.selected)
            .and_then(|id| session.store().track(id))
            .and_then(|t| t.album_id.clone()),
    };
    let Some(album_id) = album_id else {
        return;
    };
    let n = session.queue_album(&album_id);
    if n > 0 {
        app.set_status(format!("Queued {n} tracks"));
    }
}

fn jump_to_playing<S, C>(app: &mut App, session: &Session<S, ThreadFetcher<C>>)
where
    S: MediaSink,
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    if let Some(track) = session.store().current_track() {
        if app.view == View::Albums {
            app.toggle_view();
        }
        app.follow_playback_on();
        app.pending_follow = Some(track.id.clone());
    }
}
