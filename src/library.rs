//! Library module: the manifest model, the library store, row formatting and
//! the directory scanner that builds manifests.

mod display;
mod model;
mod scan;
mod store;

pub use display::{format_duration, row_from_fields};
pub use model::{Album, Manifest, Track, UNKNOWN_ARTIST};
pub use scan::scan;
pub use store::{LibraryStore, METADATA_LOADED, TRACK_CHANGED, TRACKS_FILTERED};
