//! The sequencing policy: which track plays after the current one.
//!
//! The sequencer keeps an explicit queue of track ids, separate from the
//! filtered view. By default it mirrors library order and is rebuilt on
//! every library load; once the user queues an album or the filtered view
//! it becomes explicit and survives reloads (minus ids that disappeared).
//!
//! Shuffle permutes the queue in place and keeps the pre-shuffle queue so
//! that turning shuffle off restores it verbatim.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::types::{AdvanceReason, RepeatMode};

#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    queue: Vec<String>,
    /// The queue as it was before shuffle was enabled. `Some` iff shuffled.
    unshuffled: Option<Vec<String>>,
    explicit: bool,
    repeat: RepeatMode,
}

impl Sequencer {
    /// Follow a freshly loaded library. An explicit queue is kept, minus ids
    /// the library no longer has; if nothing of it survives the queue falls
    /// back to library order.
    pub fn sync_library<R>(&mut self, ids: Vec<String>, current: Option<&str>, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        if self.explicit {
            retain_known(&mut self.queue, &ids);
            if let Some(orig) = self.unshuffled.as_mut() {
                retain_known(orig, &ids);
            }
            if !self.queue.is_empty() {
                debug!(len = self.queue.len(), "explicit queue kept across reload");
                return;
            }
        }
        self.replace(ids, current, rng);
        self.explicit = false;
    }

    /// Replace the queue with an explicit list, e.g. an album or the
    /// filtered view. Shuffle stays as it was.
    pub fn set_queue<R>(&mut self, ids: Vec<String>, current: Option<&str>, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.replace(ids, current, rng);
        self.explicit = true;
    }

    /// Drop an explicit queue and go back to library order.
    pub fn reset_to_library<R>(&mut self, ids: Vec<String>, current: Option<&str>, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        self.replace(ids, current, rng);
        self.explicit = false;
    }

    fn replace<R>(&mut self, ids: Vec<String>, current: Option<&str>, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        if self.unshuffled.is_some() {
            self.queue = ids.clone();
            shuffle_with_head(&mut self.queue, current, rng);
            self.unshuffled = Some(ids);
        } else {
            self.queue = ids;
        }
    }

    /// Flip shuffle. Returns the new shuffle state.
    pub fn toggle_shuffle<R>(&mut self, current: Option<&str>, rng: &mut R) -> bool
    where
        R: Rng + ?Sized,
    {
        match self.unshuffled.take() {
            Some(orig) => {
                self.queue = orig;
                false
            }
            None => {
                self.unshuffled = Some(self.queue.clone());
                shuffle_with_head(&mut self.queue, current, rng);
                true
            }
        }
    }

    /// The track to play after `current`.
    ///
    /// With no current track, or one that is not queued, the head of the
    /// queue comes next. Repeat-one only applies to a natural end.
    pub fn next(&self, current: Option<&str>, reason: AdvanceReason) -> Option<&str> {
        let Some(pos) = current.and_then(|id| self.position(id)) else {
            return self.queue.first().map(String::as_str);
        };

        if reason == AdvanceReason::Natural && self.repeat == RepeatMode::One {
            return Some(&self.queue[pos]);
        }

        match self.queue.get(pos + 1) {
            Some(id) => Some(id),
            None if self.repeat == RepeatMode::All => self.queue.first().map(String::as_str),
            None => None,
        }
    }

    /// `next` for a manual skip; what the library store calls "next track".
    pub fn peek_next(&self, current: Option<&str>) -> Option<&str> {
        self.next(current, AdvanceReason::Skip)
    }

    pub fn previous(&self, current: Option<&str>) -> Option<&str> {
        let pos = current.and_then(|id| self.position(id))?;
        if pos > 0 {
            return Some(&self.queue[pos - 1]);
        }
        match self.repeat {
            RepeatMode::All => self.queue.last().map(String::as_str),
            _ => None,
        }
    }

    pub fn position(&self, track_id: &str) -> Option<usize> {
        self.queue.iter().position(|id| id == track_id)
    }

    pub fn queue(&self) -> &[String] {
        &self.queue
    }

    pub fn is_shuffled(&self) -> bool {
        self.unshuffled.is_some()
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn cycle_repeat(&mut self) -> RepeatMode {
        self.repeat = self.repeat.cycle();
        self.repeat
    }
}

/// Drop queued ids that are not in `known`, keeping order.
fn retain_known(queue: &mut Vec<String>, known: &[String]) {
    let known: HashSet<&str> = known.iter().map(String::as_str).collect();
    queue.retain(|id| known.contains(id.as_str()));
}

/// Shuffle `queue` and move `current` (if queued) to the head.
fn shuffle_with_head<R>(queue: &mut [String], current: Option<&str>, rng: &mut R)
where
    R: Rng + ?Sized,
{
    queue.shuffle(rng);
    if let Some(pos) = current.and_then(|c| queue.iter().position(|id| id == c)) {
        queue[..=pos].rotate_right(1);
    }
}
