//! Media sinks: the seam between the playback engine and an audio device.
//!
//! [`RodioSink`] decodes the bound resource's bytes with `rodio` and plays
//! them on the default output stream. The output stream is opened lazily, so
//! a machine without an audio device can still browse and load; `play()` is
//! then rejected instead of failing the load.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use tracing::{debug, warn};

use crate::error::SinkError;

use super::resource::StreamedResource;
use super::types::SinkEvent;

pub trait MediaSink {
    /// Decode and bind `resource`. Returns the duration once it is known.
    fn bind(&mut self, resource: &StreamedResource) -> Result<Option<Duration>, SinkError>;
    /// Drop everything that refers to the bound resource.
    fn detach(&mut self);
    fn play(&mut self) -> Result<(), SinkError>;
    fn pause(&mut self);
    /// Halt output without detaching.
    fn stop(&mut self);
    fn seek(&mut self, position: Duration);
    fn set_volume(&mut self, level: f32);
    fn position(&self) -> Duration;
    /// Drain what the sink observed since the last call.
    fn poll_events(&mut self) -> Vec<SinkEvent>;
}

type BytesDecoder = Decoder<Cursor<Arc<[u8]>>>;

pub struct RodioSink {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
    /// Decoded source waiting for an output stream.
    pending: Option<BytesDecoder>,
    start_at: Duration,
    volume: f32,
    playing: bool,
    last_pos: Duration,
    /// Length reported by the decoder, when it knows it.
    duration: Option<Duration>,
}

impl Default for RodioSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RodioSink {
    pub fn new() -> Self {
        Self {
            stream: None,
            sink: None,
            pending: None,
            start_at: Duration::ZERO,
            volume: 1.0,
            playing: false,
            last_pos: Duration::ZERO,
            duration: None,
        }
    }

    fn open_stream() -> Result<OutputStream, SinkError> {
        let mut stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| SinkError::Rejected(format!("no audio output device: {e}")))?;
        // rodio logs to stderr when OutputStream is dropped. That's useful in debugging,
        // but noisy for a TUI app.
        stream.log_on_drop(false);
        Ok(stream)
    }

    /// Connect the pending source to a fresh, paused `Sink`.
    fn ensure_attached(&mut self) -> Result<(), SinkError> {
        if self.sink.is_some() {
            return Ok(());
        }
        if self.pending.is_none() {
            return Err(SinkError::Rejected("nothing is bound".to_string()));
        }
        if self.stream.is_none() {
            self.stream = Some(Self::open_stream()?);
        }

        let (Some(stream), Some(source)) = (self.stream.as_ref(), self.pending.take()) else {
            return Err(SinkError::Rejected("output stream unavailable".to_string()));
        };

        let sink = Sink::connect_new(stream.mixer());
        sink.pause();
        sink.set_volume(self.volume);
        sink.append(source);
        if !self.start_at.is_zero() {
            if let Err(e) = sink.try_seek(self.start_at) {
                warn!(error = %e, "initial seek failed");
            }
        }
        self.sink = Some(sink);
        Ok(())
    }
}

impl MediaSink for RodioSink {
    fn bind(&mut self, resource: &StreamedResource) -> Result<Option<Duration>, SinkError> {
        self.detach();

        let source = Decoder::new(Cursor::new(resource.bytes()))
            .map_err(|e| SinkError::Decode(format!("{}: {e}", resource.file_name())))?;
        let duration = source.total_duration();
        debug!(file_name = resource.file_name(), ?duration, "decoder ready");

        self.pending = Some(source);
        self.duration = duration;
        if self.stream.is_some() {
            self.ensure_attached()?;
        }
        Ok(duration)
    }

    fn detach(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.pending = None;
        self.start_at = Duration::ZERO;
        self.playing = false;
        self.last_pos = Duration::ZERO;
        self.duration = None;
    }

    fn play(&mut self) -> Result<(), SinkError> {
        self.ensure_attached()?;
        if let Some(sink) = self.sink.as_ref() {
            sink.play();
            self.playing = true;
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.pause();
        }
        self.playing = false;
    }

    fn stop(&mut self) {
        self.pause();
    }

    fn seek(&mut self, position: Duration) {
        match self.sink.as_ref() {
            Some(sink) => {
                if let Err(e) = sink.try_seek(position) {
                    warn!(error = %e, "seek failed");
                }
            }
            None => self.start_at = position,
        }
    }

    fn set_volume(&mut self, level: f32) {
        self.volume = level;
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(level);
        }
    }

    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map_or(self.start_at, |sink| sink.get_pos())
    }

    fn poll_events(&mut self) -> Vec<SinkEvent> {
        let mut events = Vec::new();
        let Some(sink) = self.sink.as_ref() else {
            return events;
        };
        if !self.playing {
            return events;
        }

        let pos = sink.get_pos();
        if pos != self.last_pos {
            self.last_pos = pos;
            events.push(SinkEvent::TimeUpdate(pos));
        }
        if sink.empty() {
            self.playing = false;
            // rodio stops a source on a decode error without telling anyone;
            // running dry well before the known length is the only trace.
            match self.duration {
                Some(total) if ended_short(self.last_pos, total) => {
                    warn!(position = ?self.last_pos, ?total, "stream ended early");
                    events.push(SinkEvent::Error(format!(
                        "playback stopped at {}s of {}s",
                        self.last_pos.as_secs(),
                        total.as_secs()
                    )));
                }
                _ => events.push(SinkEvent::Ended),
            }
        }
        events
    }
}

/// Whether a source that ran dry at `position` stopped short of `total`.
/// Allows two seconds or 5% of the track, whichever is larger, for decoders
/// whose reported length is approximate.
fn ended_short(position: Duration, total: Duration) -> bool {
    let slack = (total / 20).max(Duration::from_secs(2));
    position + slack < total
}
