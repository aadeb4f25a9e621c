//! The library store: tracks, albums, the filtered view and the playback
//! cursor. Every mutation publishes a notification on the shared bus.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::Sequencer;
use crate::bus::{Notice, NotificationBus};

use super::model::{Album, Manifest, Track, UNKNOWN_ARTIST};

pub const METADATA_LOADED: &str = "metadata-loaded";
pub const TRACKS_FILTERED: &str = "tracks-filtered";
pub const TRACK_CHANGED: &str = "track-changed";

pub struct LibraryStore {
    bus: Arc<NotificationBus>,
    albums: BTreeMap<String, Album>,
    tracks: Vec<Track>,
    /// Indices into `tracks`, in library order.
    filtered: Vec<usize>,
    query: String,
    current: Option<usize>,
}

impl LibraryStore {
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        Self {
            bus,
            albums: BTreeMap::new(),
            tracks: Vec::new(),
            filtered: Vec::new(),
            query: String::new(),
            current: None,
        }
    }

    /// Replace the whole library. The filter is cleared; the cursor survives
    /// only if its track id is still present. Tracks without an id, or whose
    /// id was already taken by an earlier track, are dropped.
    pub fn init(&mut self, manifest: Manifest) {
        let previous = self.current_track().map(|t| t.id.clone());

        self.albums = manifest.albums;
        self.tracks = unique_tracks(manifest.tracks);
        self.query.clear();
        self.filtered = (0..self.tracks.len()).collect();
        self.current = previous.and_then(|id| self.position_of(&id));

        info!(
            albums = self.albums.len(),
            tracks = self.tracks.len(),
            "library loaded"
        );
        self.bus.publish(METADATA_LOADED, &Notice::Empty);
    }

    /// Recompute the filtered view for `query`: a case-insensitive substring
    /// match on title, album name or album artist. Surrounding whitespace is
    /// ignored, so a blank query shows everything.
    pub fn filter(&mut self, query: &str) {
        self.query = query.to_string();
        self.filtered = if query.trim().is_empty() {
            (0..self.tracks.len()).collect()
        } else {
            let needle = query.trim().to_lowercase();
            self.tracks
                .iter()
                .enumerate()
                .filter(|(_, t)| self.matches(t, &needle))
                .map(|(i, _)| i)
                .collect()
        };

        debug!(query, matches = self.filtered.len(), "filter applied");
        self.bus.publish(TRACKS_FILTERED, &Notice::Empty);
    }

    fn matches(&self, track: &Track, needle: &str) -> bool {
        if track.title.to_lowercase().contains(needle) {
            return true;
        }
        match self.album_of(track) {
            Some(album) => {
                album.name.to_lowercase().contains(needle)
                    || album
                        .artist
                        .as_deref()
                        .is_some_and(|a| a.to_lowercase().contains(needle))
            }
            None => false,
        }
    }

    pub fn tracks_for_album(&self, album_id: &str) -> Vec<&Track> {
        self.tracks
            .iter()
            .filter(|t| t.album_id.as_deref() == Some(album_id))
            .collect()
    }

    /// Point the cursor at `track_id`. Unknown ids leave everything untouched
    /// and return false.
    pub fn set_current_track(&mut self, track_id: &str) -> bool {
        let Some(index) = self.position_of(track_id) else {
            debug!(track_id, "set_current_track: unknown id");
            return false;
        };

        self.current = Some(index);
        info!(track_id, title = %self.tracks[index].title, "current track changed");
        self.bus
            .publish(TRACK_CHANGED, &Notice::Track(track_id.to_string()));
        true
    }

    /// The track after the cursor in the sequencer's active order, or `None`
    /// at the end of it.
    pub fn next_track(&self, order: &Sequencer) -> Option<&Track> {
        let current = self.current_track().map(|t| t.id.as_str());
        order
            .peek_next(current)
            .and_then(|id| self.track(id))
    }

    pub fn track(&self, track_id: &str) -> Option<&Track> {
        self.position_of(track_id).map(|i| &self.tracks[i])
    }

    fn position_of(&self, track_id: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == track_id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_ids(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.id.clone()).collect()
    }

    pub fn filtered_tracks(&self) -> Vec<&Track> {
        self.filtered.iter().map(|&i| &self.tracks[i]).collect()
    }

    pub fn filtered_ids(&self) -> Vec<String> {
        self.filtered
            .iter()
            .map(|&i| self.tracks[i].id.clone())
            .collect()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn album(&self, album_id: &str) -> Option<&Album> {
        self.albums.get(album_id)
    }

    pub fn album_of(&self, track: &Track) -> Option<&Album> {
        track.album_id.as_deref().and_then(|id| self.albums.get(id))
    }

    pub fn artist_for(&self, track: &Track) -> &str {
        self.album_of(track)
            .map(Album::artist_or_unknown)
            .unwrap_or(UNKNOWN_ARTIST)
    }

    /// Albums ordered for browsing: by artist, then name.
    pub fn albums_sorted(&self) -> Vec<(&str, &Album)> {
        let mut albums: Vec<(&str, &Album)> =
            self.albums.iter().map(|(id, a)| (id.as_str(), a)).collect();
        albums.sort_by(|(_, a), (_, b)| {
            let key = |x: &Album| {
                (
                    x.artist_or_unknown().to_lowercase(),
                    x.name.to_lowercase(),
                )
            };
            key(a).cmp(&key(b))
        });
        albums
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.current.map(|i| &self.tracks[i])
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn is_current(&self, track_id: &str) -> bool {
        self.current_track().is_some_and(|t| t.id == track_id)
    }
}

/// Keep the first track for every non-empty id.
fn unique_tracks(tracks: Vec<Track>) -> Vec<Track> {
    let mut seen: HashSet<String> = HashSet::with_capacity(tracks.len());
    tracks
        .into_iter()
        .filter(|t| {
            if t.id.is_empty() {
                warn!(file_name = %t.file_name, "dropping track without an id");
                false
            } else if !seen.insert(t.id.clone()) {
                warn!(id = %t.id, file_name = %t.file_name, "dropping track with duplicate id");
                false
            } else {
                true
            }
        })
        .collect()
}
