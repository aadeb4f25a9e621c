//! The playback engine: one media sink, one in-flight load, transport
//! controls and lifecycle notifications.
//!
//! Loading is split at its asynchronous boundary. [`PlaybackEngine::begin_load`]
//! hands out a [`LoadTicket`]; whoever fetches the bytes reports back through
//! [`PlaybackEngine::complete_load`] with the ticket's token. Only the latest
//! token is honoured, so a slow fetch for an earlier track can never bind
//! over a later one.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bus::{Notice, NotificationBus};
use crate::error::{FetchError, LoadError, PlaybackError};
use crate::library::Track;

use super::resource::{ResourceLedger, StreamedResource};
use super::sink::MediaSink;
use super::types::{
    AdvanceRequest, ENDED, EngineState, FAILED, LoadOutcome, LoadTicket, PAUSED, PROGRESS, READY,
    STARTED, SinkEvent,
};

pub struct PlaybackEngine<S: MediaSink> {
    sink: S,
    bus: Arc<NotificationBus>,
    ledger: ResourceLedger,
    state: EngineState,
    resource: Option<StreamedResource>,
    track: Option<Track>,
    /// Token of the load we are waiting for, if any.
    pending: Option<u64>,
    load_seq: u64,
    duration: Option<Duration>,
    volume: f32,
    auto_advance: bool,
}

impl<S: MediaSink> PlaybackEngine<S> {
    pub fn new(sink: S, bus: Arc<NotificationBus>) -> Self {
        Self {
            sink,
            bus,
            ledger: ResourceLedger::default(),
            state: EngineState::Idle,
            resource: None,
            track: None,
            pending: None,
            load_seq: 0,
            duration: None,
            volume: 1.0,
            auto_advance: true,
        }
    }

    /// Start loading `track`. Whatever was bound is detached and released
    /// before this returns.
    pub fn begin_load(&mut self, track: &Track) -> Result<LoadTicket, LoadError> {
        if self.state == EngineState::Destroyed {
            return Err(LoadError::Destroyed);
        }

        self.load_seq += 1;
        let token = self.load_seq;

        self.unbind();
        self.track = Some(track.clone());
        self.duration = track.duration();
        self.pending = Some(token);
        self.state = EngineState::Loading;

        debug!(token, track_id = %track.id, file_name = %track.file_name, "load started");
        Ok(LoadTicket {
            token,
            track_id: track.id.clone(),
            file_name: track.file_name.clone(),
        })
    }

    /// Apply the result of the fetch issued for `token`.
    pub fn complete_load(
        &mut self,
        token: u64,
        fetched: Result<Vec<u8>, FetchError>,
    ) -> Result<LoadOutcome, LoadError> {
        if self.state == EngineState::Destroyed {
            return Err(LoadError::Destroyed);
        }

        if self.pending != Some(token) {
            if let Ok(bytes) = fetched {
                // Never bound: account for it and hand it straight back.
                StreamedResource::acquire(&self.ledger, "superseded", bytes).release();
            }
            debug!(token, latest = self.load_seq, "discarding superseded load");
            return Ok(LoadOutcome::Superseded);
        }
        self.pending = None;

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => return Err(self.fail(LoadError::Fetch(e))),
        };

        let file_name = self
            .track
            .as_ref()
            .map(|t| t.file_name.as_str())
            .unwrap_or_default();
        let resource = StreamedResource::acquire(&self.ledger, file_name, bytes);

        match self.sink.bind(&resource) {
            Ok(reported) => {
                if reported.is_some() {
                    self.duration = reported;
                }
                self.sink.set_volume(self.volume);
                self.resource = Some(resource);
                self.state = EngineState::Ready;
                info!(token, duration = ?self.duration, "track ready");
                self.bus.publish(READY, &Notice::Ready(self.duration));
                Ok(LoadOutcome::Ready)
            }
            Err(e) => {
                self.sink.detach();
                resource.release();
                Err(self.fail(LoadError::Decode(e.to_string())))
            }
        }
    }

    fn fail(&mut self, err: LoadError) -> LoadError {
        warn!(error = %err, "load failed");
        self.state = EngineState::Failed;
        self.bus.publish(FAILED, &Notice::Message(err.to_string()));
        err
    }

    /// Stop output, detach the sink and release the bound resource.
    fn unbind(&mut self) {
        self.sink.stop();
        self.sink.detach();
        if let Some(resource) = self.resource.take() {
            resource.release();
        }
    }

    /// Start or resume. A rejection leaves the state as it was.
    pub fn play(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            EngineState::Destroyed => return Err(PlaybackError::Destroyed),
            EngineState::Playing => return Ok(()),
            EngineState::Ready | EngineState::Paused => {}
            _ => return Err(PlaybackError::NothingLoaded),
        }

        self.sink
            .play()
            .map_err(|e| PlaybackError::Rejected(e.to_string()))?;
        self.state = EngineState::Playing;
        self.bus.publish(STARTED, &Notice::Empty);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.state != EngineState::Playing {
            return;
        }
        self.sink.pause();
        self.state = EngineState::Paused;
        self.bus.publish(PAUSED, &Notice::Empty);
    }

    pub fn toggle_play_pause(&mut self) -> Result<(), PlaybackError> {
        if self.state == EngineState::Playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Seek to `seconds`, clamped into the track. Does nothing while the
    /// duration is unknown.
    pub fn seek_to(&mut self, seconds: f64) {
        if self.resource.is_none() || !seconds.is_finite() {
            return;
        }
        let Some(total) = self.duration else {
            return;
        };
        let target = seconds.clamp(0.0, total.as_secs_f64());
        self.sink
            .seek(Duration::try_from_secs_f64(target).unwrap_or(total));
    }

    /// Seek relative to the current position.
    pub fn seek_by(&mut self, delta_seconds: f64) {
        let now = self.current_time().as_secs_f64();
        self.seek_to(now + delta_seconds);
    }

    /// Set the volume in `[0, 1]`. Non-finite levels are ignored.
    pub fn set_volume(&mut self, level: f32) {
        if !level.is_finite() {
            return;
        }
        self.volume = level.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_auto_advance(&mut self, enabled: bool) {
        self.auto_advance = enabled;
    }

    pub fn current_time(&self) -> Duration {
        if self.resource.is_some() {
            self.sink.position()
        } else {
            Duration::ZERO
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.state == EngineState::Playing
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn live_resources(&self) -> usize {
        self.ledger.live()
    }

    /// Drain the sink and apply what it saw. Returns an advance request when
    /// the current track finished.
    pub fn pump(&mut self) -> Option<AdvanceRequest> {
        let mut advance = None;
        for event in self.sink.poll_events() {
            if let Some(req) = self.handle_sink_event(event) {
                advance = Some(req);
            }
        }
        advance
    }

    pub fn handle_sink_event(&mut self, event: SinkEvent) -> Option<AdvanceRequest> {
        match event {
            SinkEvent::TimeUpdate(position) => {
                if self.state == EngineState::Playing {
                    self.bus.publish(
                        PROGRESS,
                        &Notice::Progress {
                            position,
                            duration: self.duration,
                        },
                    );
                }
                None
            }
            SinkEvent::Ended => {
                // Only a playing track can end, so one completion yields at
                // most one transition.
                if self.state != EngineState::Playing {
                    return None;
                }
                self.state = EngineState::Ended;
                let finished = self.track.as_ref().map(|t| t.id.clone());
                debug!(track_id = ?finished, "track ended");

                match finished {
                    Some(finished_track_id) if self.auto_advance => {
                        Some(AdvanceRequest { finished_track_id })
                    }
                    _ => {
                        self.emit_ended();
                        None
                    }
                }
            }
            SinkEvent::Error(message) => {
                if matches!(
                    self.state,
                    EngineState::Ready | EngineState::Playing | EngineState::Paused
                ) {
                    warn!(%message, "sink error");
                    self.unbind();
                    self.state = EngineState::Failed;
                    self.bus.publish(FAILED, &Notice::Message(message));
                }
                None
            }
        }
    }

    /// Publish `ended` for a finished track nobody advanced from.
    pub fn emit_ended(&mut self) {
        if self.state == EngineState::Ended {
            self.bus.publish(ENDED, &Notice::Empty);
        }
    }

    /// `Failed -> Idle`, so the failure can be reported and left behind.
    pub fn recover(&mut self) {
        if self.state == EngineState::Failed {
            self.unbind();
            self.state = EngineState::Idle;
        }
    }

    /// Tear down. Safe to call more than once; the engine accepts nothing
    /// afterwards.
    pub fn destroy(&mut self) {
        if self.state == EngineState::Destroyed {
            return;
        }
        self.unbind();
        self.pending = None;
        self.track = None;
        self.duration = None;
        self.state = EngineState::Destroyed;
        debug!(live = self.ledger.live(), "playback engine destroyed");
    }
}

impl<S: MediaSink> Drop for PlaybackEngine<S> {
    fn drop(&mut self) {
        self.destroy();
    }
}
