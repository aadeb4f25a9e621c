//! The streamed resource: the in-memory audio bytes of the track that is
//! bound to the sink.
//!
//! A resource is created when a load completes and must be handed back with
//! [`StreamedResource::release`] before the next one is bound. Each resource
//! counts itself in a [`ResourceLedger`] owned by the engine so leaks are
//! observable.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ResourceLedger(Arc<AtomicUsize>);

impl ResourceLedger {
    pub fn live(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct StreamedResource {
    file_name: String,
    bytes: Arc<[u8]>,
    ledger: ResourceLedger,
    released: bool,
}

impl StreamedResource {
    pub fn acquire(ledger: &ResourceLedger, file_name: &str, bytes: Vec<u8>) -> Self {
        ledger.0.fetch_add(1, Ordering::SeqCst);
        debug!(file_name, len = bytes.len(), "streamed resource acquired");
        Self {
            file_name: file_name.to_string(),
            bytes: bytes.into(),
            ledger: ledger.clone(),
            released: false,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Shared view of the bytes for a decoder. The sink must drop it when it
    /// is detached.
    pub fn bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    pub fn release(mut self) {
        self.mark_released();
        debug!(file_name = %self.file_name, "streamed resource released");
    }

    fn mark_released(&mut self) {
        if !self.released {
            self.released = true;
            self.ledger.0.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for StreamedResource {
    fn drop(&mut self) {
        if !self.released {
            warn!(file_name = %self.file_name, "streamed resource dropped without release");
            self.mark_released();
        }
    }
}
