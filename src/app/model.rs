//! Presentation state: which view is open, where the cursor is, what the
//! user is typing, and the latest playback figures reported on the bus.

use std::time::Duration;

use crate::audio::{ENDED, FAILED, PAUSED, PROGRESS, READY, STARTED};
use crate::bus::Notice;
use crate::library::{LibraryStore, METADATA_LOADED, TRACK_CHANGED, TRACKS_FILTERED};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Tracks,
    Albums,
    /// Tracks of one album, by album id.
    Album(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Filter,
    Token,
}

/// The main application model.
#[derive(Debug, Default)]
pub struct App {
    pub view: View,
    pub selected: usize,
    /// Cursor of the albums list, restored when leaving an album.
    pub album_cursor: usize,
    pub input: InputMode,
    pub filter_query: String,
    pub token_input: String,

    pub follow_playback: bool,
    /// Set when the playing track changed and the cursor should jump to it.
    pub pending_follow: Option<String>,

    pub position: Duration,
    pub duration: Option<Duration>,
    pub status: Option<String>,
    /// Rows of the current list must be recomputed.
    pub rows_dirty: bool,
    pub quit: bool,
}

impl App {
    pub fn new(follow_playback: bool) -> Self {
        Self {
            follow_playback,
            rows_dirty: true,
            ..Self::default()
        }
    }

    /// Fold a bus notification into the view state.
    pub fn apply_notice(&mut self, event: &str, notice: &Notice) {
        match (event, notice) {
            (PROGRESS, Notice::Progress { position, duration }) => {
                self.position = *position;
                if duration.is_some() {
                    self.duration = *duration;
                }
            }
            (READY, Notice::Ready(duration)) => {
                self.position = Duration::ZERO;
                self.duration = *duration;
            }
            (STARTED | PAUSED, _) => self.status = None,
            (ENDED, _) => self.status = Some("End of queue".to_string()),
            (FAILED, Notice::Message(msg)) => self.status = Some(msg.clone()),
            (TRACK_CHANGED, Notice::Track(id)) => {
                self.position = Duration::ZERO;
                if self.follow_playback {
                    self.pending_follow = Some(id.clone());
                }
            }
            (METADATA_LOADED | TRACKS_FILTERED, _) => self.rows_dirty = true,
            _ => {}
        }
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status = Some(msg.into());
    }

    /// Tracks <-> Albums. An open album counts as the albums view.
    pub fn toggle_view(&mut self) {
        self.view = match self.view {
            View::Tracks => {
                self.selected = self.album_cursor;
                View::Albums
            }
            View::Albums | View::Album(_) => {
                self.selected = 0;
                View::Tracks
            }
        };
        self.rows_dirty = true;
    }

    pub fn open_album(&mut self, album_id: &str) {
        self.album_cursor = self.selected;
        self.view = View::Album(album_id.to_string());
        self.selected = 0;
        self.rows_dirty = true;
    }

    /// Leave an album back to the albums list. Returns false when there was
    /// nothing to go back from.
    pub fn back(&mut self) -> bool {
        if let View::Album(_) = self.view {
            self.view = View::Albums;
            self.selected = self.album_cursor;
            self.rows_dirty = true;
            true
        } else {
            false
        }
    }

    /// Move the cursor by `delta` rows, wrapping around `len`.
    pub fn move_selection(&mut self, delta: isize, len: usize) {
        if len == 0 {
            self.selected = 0;
            return;
        }
        let len = len as isize;
        let cur = (self.selected as isize).min(len - 1);
        self.selected = (cur + delta).rem_euclid(len) as usize;
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self, len: usize) {
        self.selected = len.saturating_sub(1);
    }

    /// Keep the cursor inside a list of `len` rows.
    pub fn clamp_selection(&mut self, len: usize) {
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    /// Enter filter mode: typing edits the query and follow-playback pauses.
    pub fn enter_filter_mode(&mut self) {
        self.input = InputMode::Filter;
        self.follow_playback_off();
        if self.view != View::Tracks {
            self.view = View::Tracks;
            self.selected = 0;
        }
    }

    pub fn exit_input_mode(&mut self) {
        self.input = InputMode::Normal;
    }

    pub fn push_filter_char(&mut self, c: char) {
        self.filter_query.push(c);
        self.selected = 0;
    }

    pub fn pop_filter_char(&mut self) {
        self.filter_query.pop();
        self.selected = 0;
    }

    pub fn clear_filter(&mut self) {
        self.filter_query.clear();
        self.input = InputMode::Normal;
        self.selected = 0;
    }

    pub fn enter_token_mode(&mut self) {
        self.input = InputMode::Token;
        self.token_input.clear();
    }

    /// Finish token entry. Blank input yields `None`.
    pub fn take_token(&mut self) -> Option<String> {
        self.input = InputMode::Normal;
        let token = std::mem::take(&mut self.token_input);
        let token = token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }

    pub fn follow_playback_on(&mut self) {
        self.follow_playback = true;
    }

    /// Disable follow-playback and clear any pending follow.
    pub fn follow_playback_off(&mut self) {
        self.follow_playback = false;
        self.pending_follow = None;
    }

    /// Ids behind the rows of the current view: track ids, or album ids in
    /// the albums list.
    pub fn visible_ids(&self, store: &LibraryStore) -> Vec<String> {
        match &self.view {
            View::Tracks => store.filtered_ids(),
            View::Albums => store
                .albums_sorted()
                .into_iter()
                .map(|(id, _)| id.to_string())
                .collect(),
            View::Album(id) => store
                .tracks_for_album(id)
                .iter()
                .map(|t| t.id.clone())
                .collect(),
        }
    }

    /// Put the cursor on the followed track once it shows up in `ids`.
    /// Held back while the user is typing.
    pub fn apply_follow(&mut self, ids: &[String]) {
        if self.input != InputMode::Normal || self.view == View::Albums {
            return;
        }
        let Some(target) = self.pending_follow.as_deref() else {
            return;
        };
        if let Some(pos) = ids.iter().position(|id| id == target) {
            self.selected = pos;
            self.pending_follow = None;
        }
    }

    /// Character positions of the case-insensitive match of `query` in
    /// `text`, for highlighting. `None` when it does not occur.
    pub fn match_positions(text: &str, query: &str) -> Option<Vec<usize>> {
        let query = query.trim();
        if query.is_empty() {
            return Some(Vec::new());
        }

        let hay: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();
        let needle: Vec<char> = query.chars().flat_map(char::to_lowercase).collect();
        // Lowercasing can change the char count; only highlight when it didn't.
        if hay.len() != text.chars().count() {
            return text
                .to_lowercase()
                .contains(&query.to_lowercase())
                .then(Vec::new);
        }

        hay.windows(needle.len())
            .position(|w| w == needle.as_slice())
            .map(|start| (start..start + needle.len()).collect())
    }
}
