//! Client side of the library proxy: manifest, audio and art fetches, the
//! manifest upload, and the credential they all authenticate with.

mod client;
mod credentials;

pub use client::{ArtSource, AudioSource, MetadataSource, ProxyClient};
pub use credentials::{CredentialStore, SessionCredentials};
