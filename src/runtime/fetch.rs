//! Fetch workers. Each request runs on its own short-lived thread and
//! reports back to the event loop over a channel.

use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use tracing::{debug, warn};

use crate::app::FetchDispatch;
use crate::audio::LoadTicket;
use crate::error::FetchError;
use crate::library::Manifest;
use crate::remote::{ArtSource, AudioSource, MetadataSource};

/// A finished fetch, applied by the event loop in arrival order.
#[derive(Debug)]
pub enum Completion {
    Metadata(Result<Manifest, FetchError>),
    Audio {
        token: u64,
        result: Result<Vec<u8>, FetchError>,
    },
    Art {
        album_id: String,
        bytes: Option<Vec<u8>>,
    },
}

pub struct ThreadFetcher<C> {
    source: Arc<C>,
    tx: Sender<Completion>,
}

impl<C> ThreadFetcher<C>
where
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    pub fn new(source: Arc<C>, tx: Sender<Completion>) -> Self {
        Self { source, tx }
    }

    pub fn request_metadata(&self) {
        self.spawn("metadata", |source| {
            Completion::Metadata(source.fetch_metadata())
        });
    }

    fn spawn<F>(&self, what: &str, job: F)
    where
        F: FnOnce(&C) -> Completion + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let spawned = thread::Builder::new()
            .name(format!("encore-fetch-{what}"))
            .spawn(move || {
                // The loop may already be gone during shutdown.
                let _ = tx.send(job(&source));
            });
        if let Err(e) = spawned {
            warn!(what, error = %e, "could not start fetch thread");
        }
    }
}

impl<C> FetchDispatch for ThreadFetcher<C>
where
    C: MetadataSource + AudioSource + ArtSource + Send + Sync + 'static,
{
    fn request_audio(&mut self, ticket: &LoadTicket) {
        let token = ticket.token;
        let file_name = ticket.file_name.clone();
        debug!(token, %file_name, "fetching audio");
        self.spawn("audio", move |source| Completion::Audio {
            token,
            result: source.fetch_audio_bytes(&file_name),
        });
    }

    fn request_art(&mut self, album_id: &str, file_name: &str) {
        let album_id = album_id.to_string();
        let file_name = file_name.to_string();
        self.spawn("art", move |source| Completion::Art {
            bytes: source.fetch_art_bytes(&file_name),
            album_id,
        });
    }
}
