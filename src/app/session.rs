//! The session: one library store, one sequencer and one playback engine,
//! wired together on the event-loop thread.
//!
//! Network work is delegated to a [`FetchDispatch`]; its results come back
//! through [`Session::on_audio_fetched`] and [`Session::on_art_fetched`].

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use tracing::{debug, info, warn};

use crate::audio::{
    AdvanceReason, AdvanceRequest, EngineState, LoadOutcome, LoadTicket, MediaSink,
    PlaybackEngine, RepeatMode, Sequencer,
};
use crate::bus::NotificationBus;
use crate::error::{FetchError, PlaybackError, SessionError};
use crate::library::{LibraryStore, Manifest};

/// Starts fetches on behalf of the session. Implementations must not block.
pub trait FetchDispatch {
    fn request_audio(&mut self, ticket: &LoadTicket);
    fn request_art(&mut self, album_id: &str, file_name: &str);
}

pub struct Session<S: MediaSink, D: FetchDispatch> {
    bus: Arc<NotificationBus>,
    store: LibraryStore,
    sequencer: Sequencer,
    engine: PlaybackEngine<S>,
    fetcher: D,
    /// Start playback as soon as the pending load is ready.
    autoplay: bool,
    rng: StdRng,
    art_album: Option<String>,
    art: Option<Vec<u8>>,
}

impl<S: MediaSink, D: FetchDispatch> Session<S, D> {
    pub fn new(bus: Arc<NotificationBus>, sink: S, fetcher: D, rng: StdRng) -> Self {
        Self {
            store: LibraryStore::new(bus.clone()),
            sequencer: Sequencer::default(),
            engine: PlaybackEngine::new(sink, bus.clone()),
            bus,
            fetcher,
            autoplay: false,
            rng,
            art_album: None,
            art: None,
        }
    }

    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.bus
    }

    pub fn store(&self) -> &LibraryStore {
        &self.store
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn engine(&self) -> &PlaybackEngine<S> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PlaybackEngine<S> {
        &mut self.engine
    }

    pub fn fetcher(&self) -> &D {
        &self.fetcher
    }

    fn current_id(&self) -> Option<String> {
        self.store.current_track().map(|t| t.id.clone())
    }

    /// Replace the library and bring the queue in line with it.
    pub fn load_library(&mut self, manifest: Manifest) {
        self.store.init(manifest);
        let current = self.current_id();
        self.sequencer
            .sync_library(self.store.track_ids(), current.as_deref(), &mut self.rng);
    }

    pub fn filter(&mut self, query: &str) {
        self.store.filter(query);
    }

    /// Make `track_id` current and start loading it; playback starts once
    /// the bytes arrive. Unknown ids change nothing.
    pub fn play_track(&mut self, track_id: &str) -> bool {
        let Some(track) = self.store.track(track_id).cloned() else {
            debug!(track_id, "play_track: unknown id");
            return false;
        };

        let ticket = match self.engine.begin_load(&track) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!(error = %e, "cannot load track");
                return false;
            }
        };
        self.store.set_current_track(track_id);
        self.autoplay = true;
        self.fetcher.request_audio(&ticket);
        self.request_art_for_current();
        true
    }

    fn request_art_for_current(&mut self) {
        let Some(track) = self.store.current_track() else {
            return;
        };
        let album_id = track.album_id.clone();
        if album_id.is_some() && album_id == self.art_album {
            return;
        }

        self.art = None;
        self.art_album = album_id.clone();
        let art = album_id
            .as_deref()
            .and_then(|id| self.store.album(id))
            .and_then(|a| a.art.clone());
        if let (Some(album_id), Some(file_name)) = (album_id, art) {
            self.fetcher.request_art(&album_id, &file_name);
        }
    }

    /// Apply a finished audio fetch. Failures leave the engine idle and are
    /// returned for the caller to report.
    pub fn on_audio_fetched(
        &mut self,
        token: u64,
        fetched: Result<Vec<u8>, FetchError>,
    ) -> Result<LoadOutcome, SessionError> {
        match self.engine.complete_load(token, fetched) {
            Ok(LoadOutcome::Ready) => {
                if std::mem::take(&mut self.autoplay) {
                    self.engine.play()?;
                }
                Ok(LoadOutcome::Ready)
            }
            Ok(LoadOutcome::Superseded) => Ok(LoadOutcome::Superseded),
            Err(e) => {
                self.autoplay = false;
                self.engine.recover();
                Err(e.into())
            }
        }
    }

    pub fn on_art_fetched(&mut self, album_id: &str, bytes: Option<Vec<u8>>) {
        if self.art_album.as_deref() == Some(album_id) {
            self.art = bytes;
        }
    }

    pub fn art_available(&self) -> bool {
        self.art.is_some()
    }

    pub fn art(&self) -> Option<&[u8]> {
        self.art.as_deref()
    }

    /// Drain sink events; advance when the current track finished.
    pub fn tick(&mut self) {
        if let Some(req) = self.engine.pump() {
            self.advance(req);
        }
    }

    fn advance(&mut self, req: AdvanceRequest) {
        let next = self
            .sequencer
            .next(Some(&req.finished_track_id), AdvanceReason::Natural)
            .map(str::to_string);

        if let Some(id) = next {
            if self.play_track(&id) {
                info!(from = %req.finished_track_id, to = %id, "advanced");
                return;
            }
        }
        debug!("end of queue");
        self.engine.emit_ended();
    }

    pub fn skip_next(&mut self) -> bool {
        let current = self.current_id();
        let next = self
            .sequencer
            .next(current.as_deref(), AdvanceReason::Skip)
            .map(str::to_string);
        next.is_some_and(|id| self.play_track(&id))
    }

    pub fn skip_previous(&mut self) -> bool {
        let current = self.current_id();
        let prev = self
            .sequencer
            .previous(current.as_deref())
            .map(str::to_string);
        prev.is_some_and(|id| self.play_track(&id))
    }

    /// Pause or resume. With nothing bound, (re)load the current track.
    pub fn toggle_play_pause(&mut self) -> Result<(), PlaybackError> {
        match self.engine.state() {
            EngineState::Idle | EngineState::Ended | EngineState::Failed => {
                let reloaded = self.current_id().is_some_and(|id| self.play_track(&id));
                if reloaded {
                    Ok(())
                } else {
                    Err(PlaybackError::NothingLoaded)
                }
            }
            EngineState::Loading => {
                self.autoplay = !self.autoplay;
                Ok(())
            }
            _ => self.engine.toggle_play_pause(),
        }
    }

    pub fn toggle_shuffle(&mut self) -> bool {
        let current = self.current_id();
        self.sequencer
            .toggle_shuffle(current.as_deref(), &mut self.rng)
    }

    pub fn set_shuffle(&mut self, on: bool) {
        if self.sequencer.is_shuffled() != on {
            self.toggle_shuffle();
        }
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.sequencer.cycle_repeat()
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.sequencer.set_repeat(mode);
    }

    /// Queue an album's tracks in library order. Returns how many were queued.
    pub fn queue_album(&mut self, album_id: &str) -> usize {
        let ids: Vec<String> = self
            .store
            .tracks_for_album(album_id)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        self.queue_ids(ids)
    }

    /// Queue whatever the filter currently shows.
    pub fn queue_filtered(&mut self) -> usize {
        let ids = self.store.filtered_ids();
        self.queue_ids(ids)
    }

    fn queue_ids(&mut self, ids: Vec<String>) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let n = ids.len();
        let current = self.current_id();
        self.sequencer
            .set_queue(ids, current.as_deref(), &mut self.rng);
        info!(tracks = n, "queue replaced");
        n
    }

    /// Drop an explicit queue and follow the whole library again.
    pub fn reset_queue(&mut self) {
        let current = self.current_id();
        self.sequencer
            .reset_to_library(self.store.track_ids(), current.as_deref(), &mut self.rng);
    }

    pub fn seek_by(&mut self, delta: Duration, forward: bool) {
        let secs = delta.as_secs_f64();
        self.engine.seek_by(if forward { secs } else { -secs });
    }

    pub fn set_volume(&mut self, level: f32) {
        self.engine.set_volume(level);
    }

    pub fn adjust_volume(&mut self, delta: f32) -> f32 {
        let level = self.engine.volume() + delta;
        self.engine.set_volume(level);
        self.engine.volume()
    }

    pub fn shutdown(&mut self) {
        self.autoplay = false;
        self.engine.destroy();
    }
}
