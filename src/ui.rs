//! UI rendering for the terminal user interface.
//!
//! Everything here reads the session and the view model; nothing mutates
//! them.

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, LineGauge, List, ListItem, ListState, Padding, Paragraph, Wrap},
};
use std::{collections::BTreeMap, sync::LazyLock, time::Duration};

use crate::app::{App, FetchDispatch, InputMode, Session, View};
use crate::audio::{EngineState, MediaSink};
use crate::config::{ControlsSettings, TimeField, UiSettings};
use crate::library::{LibraryStore, row_from_fields};

static CONTROLS_MAP: LazyLock<BTreeMap<&'static str, &'static str>> = LazyLock::new(|| {
    BTreeMap::from([
        ("j/k", "up/down"),
        ("gg/G", "top/bottom"),
        ("enter", "play / open"),
        ("tab", "tracks/albums"),
        ("space/p", "play/pause"),
        ("h/l", "prev/next song"),
        // H/L and +/- are filled from config.
        ("/", "filter"),
        ("s", "shuffle"),
        ("r", "repeat"),
        ("a/Q", "queue album/filtered"),
        ("c", "clear queue"),
        ("zz", "go to playing"),
        ("t", "token"),
        ("R", "reload"),
        ("q", "quit"),
    ])
});

/// Render the controls help text, incorporating the configured steps.
fn controls_text(controls: &ControlsSettings) -> String {
    let order = [
        "j/k", "h/l", "H/L", "+/-", "enter", "tab", "space/p", "gg/G", "zz", "/", "s", "r",
        "a/Q", "c", "t", "R", "q",
    ];
    order
        .iter()
        .filter_map(|k| match *k {
            "H/L" => Some(format!("[H/L] scrub -/+{}s", controls.scrub_seconds)),
            "+/-" => Some(format!(
                "[+/-] volume {:.0}%",
                controls.volume_step * 100.0
            )),
            _ => CONTROLS_MAP.get(k).map(|v| format!("[{k}] {v}")),
        })
        .collect::<Vec<String>>()
        .join(" | ")
}

/// Format a `Duration` as `MM:SS`.
fn format_mmss(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Build the now-playing time text (elapsed/total/remaining) per `UiSettings`.
fn time_text(elapsed: Duration, total: Option<Duration>, ui: &UiSettings) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for f in &ui.time_fields {
        match f {
            TimeField::Elapsed => parts.push(format_mmss(elapsed)),
            TimeField::Total => {
                if let Some(t) = total {
                    parts.push(format_mmss(t));
                }
            }
            TimeField::Remaining => {
                if let Some(t) = total {
                    parts.push(format!("-{}", format_mmss(t.saturating_sub(elapsed))));
                }
            }
        }
    }

    (!parts.is_empty()).then(|| parts.join(&ui.time_separator))
}

/// Split `text` into spans, emphasising the characters at `positions`.
fn highlighted(text: String, positions: &[usize]) -> Line<'static> {
    if positions.is_empty() {
        return Line::from(text);
    }
    let hit = Style::default().add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut run = String::new();
    let mut run_hit = false;
    for (i, ch) in text.chars().enumerate() {
        let is_hit = positions.binary_search(&i).is_ok();
        if is_hit != run_hit && !run.is_empty() {
            let part = std::mem::take(&mut run);
            spans.push(if run_hit {
                Span::styled(part, hit)
            } else {
                Span::raw(part)
            });
        }
        run_hit = is_hit;
        run.push(ch);
    }
    if !run.is_empty() {
        spans.push(if run_hit {
            Span::styled(run, hit)
        } else {
            Span::raw(run)
        });
    }
    Line::from(spans)
}

/// One list row for `id` in the current view.
fn row_line(store: &LibraryStore, app: &App, id: &str, ui: &UiSettings) -> Line<'static> {
    if app.view == View::Albums {
        let Some(album) = store.album(id) else {
            return Line::from(id.to_string());
        };
        let mut text = format!("{} - {}", album.artist_or_unknown(), album.name);
        if let Some(year) = album.year.as_deref() {
            text.push_str(&format!(" ({year})"));
        }
        let count = store.tracks_for_album(id).len();
        text.push_str(&format!(" [{count}]"));
        return Line::from(text);
    }

    let Some(track) = store.track(id) else {
        return Line::from(id.to_string());
    };
    let marker = if store.is_current(id) { "* " } else { "  " };
    let text = format!(
        "{marker}{}",
        row_from_fields(track, store.album_of(track), &ui.row_fields, &ui.row_separator)
    );

    let query = store.query();
    if query.trim().is_empty() {
        return Line::from(text);
    }
    match App::match_positions(&text, query) {
        Some(positions) => highlighted(text, &positions),
        None => Line::from(text),
    }
}

/// Compute the visible window `[start, end)` and the selected row inside it,
/// keeping the selection centred when possible.
fn visible_window(total: usize, height: usize, selected: usize) -> (usize, usize, usize) {
    if total <= height || height == 0 {
        return (0, total, selected.min(total.saturating_sub(1)));
    }
    let half = height / 2;
    let mut start = selected.saturating_sub(half);
    if start + height > total {
        start = total - height;
    }
    (start, start + height, selected - start)
}

fn list_title(store: &LibraryStore, app: &App) -> String {
    match &app.view {
        View::Tracks => {
            let q = store.query().trim();
            if q.is_empty() {
                format!(" tracks ({}) ", store.tracks().len())
            } else {
                format!(" tracks ({}/{}) ", store.filtered_ids().len(), store.tracks().len())
            }
        }
        View::Albums => format!(" albums ({}) ", store.album_count()),
        View::Album(id) => match store.album(id) {
            Some(a) => format!(" {} - {} ", a.artist_or_unknown(), a.name),
            None => " album ".to_string(),
        },
    }
}

fn draw_now_playing<S: MediaSink, D: FetchDispatch>(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    session: &Session<S, D>,
    ui: &UiSettings,
) {
    let block = Block::bordered()
        .padding(Padding::horizontal(1))
        .title(" now playing ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
        .split(inner);

    let store = session.store();
    let engine = session.engine();

    let song = match store.current_track() {
        Some(track) => {
            let mut text = format!("{} - {}", track.title, store.artist_for(track));
            if let Some(album) = store.album_of(track) {
                text.push_str(&format!(" ({})", album.name));
            }
            text
        }
        None => "Nothing selected".to_string(),
    };
    frame.render_widget(
        Paragraph::new(song).style(Style::default().add_modifier(Modifier::BOLD)),
        rows[0],
    );

    let sequencer = session.sequencer();
    let mut parts: Vec<String> = vec![engine.state().label().to_string()];
    if let Some(time) = time_text(app.position, app.duration, ui) {
        parts.push(time);
    }
    parts.push(format!("vol {:.0}%", engine.volume() * 100.0));
    parts.push(format!(
        "shuffle {}",
        if sequencer.is_shuffled() { "on" } else { "off" }
    ));
    parts.push(format!("repeat {}", sequencer.repeat().label()));
    if sequencer.is_explicit() {
        parts.push(format!("queue {}", sequencer.queue().len()));
    }
    if let Some(art) = session.art() {
        parts.push(format!("art {}K", art.len().div_ceil(1024)));
    }
    parts.push(if app.follow_playback {
        "follow".to_string()
    } else {
        "free-roam".to_string()
    });
    frame.render_widget(Paragraph::new(parts.join(" • ")), rows[1]);

    let ratio = match app.duration {
        Some(total) if !total.is_zero() => {
            (app.position.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0)
        }
        _ => 0.0,
    };
    let gauge_style = if engine.state() == EngineState::Playing {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    frame.render_widget(
        LineGauge::default()
            .filled_style(gauge_style)
            .ratio(ratio)
            .label(""),
        rows[2],
    );
}

fn draw_prompt(frame: &mut Frame, area: Rect, app: &App) {
    let (title, text) = match app.input {
        InputMode::Filter => (" filter ", format!("/{}_", app.filter_query)),
        InputMode::Token => (
            " access token (enter saves, esc cancels) ",
            format!("{}_", "*".repeat(app.token_input.chars().count())),
        ),
        InputMode::Normal => {
            let q = app.filter_query.trim();
            let text = match (&app.status, q.is_empty()) {
                (Some(status), _) => status.clone(),
                (None, false) => format!("filter: {q}"),
                (None, true) => String::new(),
            };
            (" status ", text)
        }
    };
    let prompt = Paragraph::new(text).block(
        Block::default()
            .borders(Borders::ALL)
            .padding(Padding::horizontal(1))
            .title(title),
    );
    frame.render_widget(prompt, area);
}

/// Render the entire UI. `ids` are the rows of the current view, as
/// returned by [`App::visible_ids`].
pub fn draw<S: MediaSink, D: FetchDispatch>(
    frame: &mut Frame,
    app: &App,
    session: &Session<S, D>,
    ids: &[String],
    ui_settings: &UiSettings,
    controls_settings: &ControlsSettings,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Min(1),
            Constraint::Length(3),
            Constraint::Length(4),
        ])
        .split(frame.area());

    // Header
    let tabs = match app.view {
        View::Tracks => " [tracks] albums ",
        View::Albums | View::Album(_) => " tracks [albums] ",
    };
    let header = Paragraph::new(ui_settings.header_text.as_str())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(tabs)
                .title_alignment(Alignment::Center),
        );
    frame.render_widget(header, chunks[0]);

    draw_now_playing(frame, chunks[1], app, session, ui_settings);

    // Main list: only build items for the visible window.
    {
        let store = session.store();
        let list_height = chunks[2].height.saturating_sub(2) as usize;
        let (start, end, selected) = visible_window(ids.len(), list_height, app.selected);

        let items: Vec<ListItem> = ids[start..end]
            .iter()
            .map(|id| ListItem::new(row_line(store, app, id, ui_settings)))
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(list_title(store, app)),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");
        let mut state = ListState::default();
        if !ids.is_empty() {
            state.select(Some(selected));
        }
        frame.render_stateful_widget(list, chunks[2], &mut state);
    }

    draw_prompt(frame, chunks[3], app);

    let footer = Paragraph::new(controls_text(controls_settings))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" controls ")
                .padding(Padding::horizontal(1)),
        )
        .wrap(Wrap { trim: true });
    frame.render_widget(footer, chunks[4]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_centres_the_selection() {
        assert_eq!(visible_window(5, 10, 3), (0, 5, 3));
        assert_eq!(visible_window(100, 10, 50), (45, 55, 5));
        assert_eq!(visible_window(100, 10, 98), (90, 100, 8));
        assert_eq!(visible_window(0, 10, 0), (0, 0, 0));
    }

    #[test]
    fn time_text_follows_configured_fields() {
        let ui = UiSettings {
            time_fields: vec![TimeField::Elapsed, TimeField::Remaining],
            ..UiSettings::default()
        };
        let text = time_text(
            Duration::from_secs(65),
            Some(Duration::from_secs(180)),
            &ui,
        );
        assert_eq!(text.as_deref(), Some("01:05 / -01:55"));

        let ui = UiSettings {
            time_fields: vec![TimeField::Total],
            ..UiSettings::default()
        };
        assert_eq!(time_text(Duration::ZERO, None, &ui), None);
    }

    #[test]
    fn highlighted_splits_runs() {
        let line = highlighted("Hello".to_string(), &[1, 2]);
        let parts: Vec<&str> = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(parts, vec!["H", "el", "lo"]);
    }

    #[test]
    fn controls_text_uses_configured_steps() {
        let text = controls_text(&ControlsSettings {
            scrub_seconds: 10,
            volume_step: 0.1,
        });
        assert!(text.contains("[H/L] scrub -/+10s"));
        assert!(text.contains("[+/-] volume 10%"));
        assert!(text.contains("[q] quit"));
    }
}
