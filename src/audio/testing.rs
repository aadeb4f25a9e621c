//! A scripted media sink for engine and session tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::SinkError;

use super::resource::StreamedResource;
use super::sink::MediaSink;
use super::types::SinkEvent;

#[derive(Debug, Default)]
pub(crate) struct Script {
    /// File names passed to `bind`, in order.
    pub binds: Vec<String>,
    pub bound: Option<String>,
    pub detaches: usize,
    pub playing: bool,
    pub reject_play: bool,
    pub fail_decode: bool,
    pub duration: Option<Duration>,
    pub position: Duration,
    pub seeks: Vec<Duration>,
    pub volume: f32,
    pub events: VecDeque<SinkEvent>,
}

/// Cloning yields a handle onto the same script, so a test can keep one
/// while the engine owns the other.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedSink(Arc<Mutex<Script>>);

impl ScriptedSink {
    pub fn new() -> Self {
        let sink = Self::default();
        sink.script().duration = Some(Duration::from_secs(180));
        sink
    }

    pub fn script(&self) -> MutexGuard<'_, Script> {
        self.0.lock().unwrap()
    }

    pub fn push(&self, event: SinkEvent) {
        self.script().events.push_back(event);
    }
}

impl MediaSink for ScriptedSink {
    fn bind(&mut self, resource: &StreamedResource) -> Result<Option<Duration>, SinkError> {
        let mut s = self.script();
        s.binds.push(resource.file_name().to_string());
        if s.fail_decode {
            return Err(SinkError::Decode("unsupported format".to_string()));
        }
        s.bound = Some(resource.file_name().to_string());
        s.position = Duration::ZERO;
        Ok(s.duration)
    }

    fn detach(&mut self) {
        let mut s = self.script();
        s.detaches += 1;
        s.bound = None;
        s.playing = false;
    }

    fn play(&mut self) -> Result<(), SinkError> {
        let mut s = self.script();
        if s.reject_play {
            return Err(SinkError::Rejected("autoplay blocked".to_string()));
        }
        s.playing = true;
        Ok(())
    }

    fn pause(&mut self) {
        self.script().playing = false;
    }

    fn stop(&mut self) {
        self.script().playing = false;
    }

    fn seek(&mut self, position: Duration) {
        let mut s = self.script();
        s.seeks.push(position);
        s.position = position;
    }

    fn set_volume(&mut self, level: f32) {
        self.script().volume = level;
    }

    fn position(&self) -> Duration {
        self.script().position
    }

    fn poll_events(&mut self) -> Vec<SinkEvent> {
        self.script().events.drain(..).collect()
    }
}
