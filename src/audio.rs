//! Audio subsystem: the playback engine, the media sink it drives and the
//! sequencing policy that picks the next track.
//!
//! The engine never fetches anything itself. It hands out load tickets and
//! binds whatever bytes come back for the latest one.

mod engine;
mod queue;
mod resource;
mod sink;
mod types;

pub use engine::PlaybackEngine;
pub use queue::Sequencer;
pub use sink::{MediaSink, RodioSink};
pub use types::{
    AdvanceReason, AdvanceRequest, ENDED, EngineState, FAILED, LoadOutcome, LoadTicket, PAUSED,
    PROGRESS, READY, RepeatMode, STARTED, SinkEvent,
};

#[cfg(test)]
pub(crate) mod testing;
