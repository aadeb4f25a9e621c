//! Audio-related small types.
//!
//! This module defines the engine state machine, repeat mode, sink events,
//! load tickets and the names of the notifications the engine publishes.

use std::time::Duration;

pub const PROGRESS: &str = "progress";
pub const READY: &str = "ready";
pub const STARTED: &str = "started";
pub const PAUSED: &str = "paused";
pub const ENDED: &str = "ended";
pub const FAILED: &str = "failed";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum EngineState {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Failed,
    /// Terminal: reached through `destroy()` from any state.
    Destroyed,
}

impl EngineState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Stopped",
            Self::Loading => "Loading",
            Self::Ready => "Ready",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Ended => "Ended",
            Self::Failed => "Failed",
            Self::Destroyed => "Closed",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RepeatMode {
    /// Stop at the end of the queue.
    #[default]
    Off,
    /// Wrap around to the start of the queue.
    All,
    /// Repeat the current song when it ends.
    One,
}

impl RepeatMode {
    /// Cycle `Off -> All -> One -> Off`.
    pub fn cycle(self) -> Self {
        match self {
            Self::Off => Self::All,
            Self::All => Self::One,
            Self::One => Self::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::All => "all",
            Self::One => "one",
        }
    }
}

/// Why the sequencer is asked for the next track.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdvanceReason {
    /// The current track played to the end.
    Natural,
    /// The user skipped. Repeat-one does not apply.
    Skip,
}

/// Something the media sink observed since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    TimeUpdate(Duration),
    Ended,
    Error(String),
}

/// Issued by `begin_load`: the bytes for `file_name` must be fetched and
/// handed back with the same `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub token: u64,
    pub track_id: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The track is bound and the engine is `Ready`.
    Ready,
    /// A newer load was started; this completion was discarded.
    Superseded,
}

/// Returned when a track finished playing and auto-advance is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvanceRequest {
    pub finished_track_id: String,
}
