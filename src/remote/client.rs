use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use ureq::Agent;
use ureq::http::Response;

use crate::error::{FetchError, UploadError};
use crate::library::Manifest;

use super::credentials::CredentialStore;

pub const AUTH_HEADER: &str = "X-Auth-Token";

pub trait MetadataSource {
    fn fetch_metadata(&self) -> Result<Manifest, FetchError>;
}

pub trait AudioSource {
    fn fetch_audio_bytes(&self, file_name: &str) -> Result<Vec<u8>, FetchError>;
}

/// Art is decorative: every failure collapses to `None`.
pub trait ArtSource {
    fn fetch_art_bytes(&self, file_name: &str) -> Option<Vec<u8>>;
}

/// Blocking client for the library proxy.
///
/// Routes: `GET /db.json`, `GET /music/<name>`, `GET /art/<name>` and
/// `PUT /db.json`. Every request carries the current token in `X-Auth-Token`.
#[derive(Clone)]
pub struct ProxyClient {
    agent: Agent,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl ProxyClient {
    pub fn new(base_url: &str, timeout: Duration, credentials: Arc<dyn CredentialStore>) -> Self {
        // Status handling is ours: 401 must clear the credential.
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        let agent: Agent = config.into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn token(&self) -> Result<String, FetchError> {
        self.credentials.get().ok_or(FetchError::Auth)
    }

    fn get_bytes(&self, path: &str, what: &str) -> Result<Vec<u8>, FetchError> {
        let token = self.token()?;
        debug!(path, "GET");
        let response = self
            .agent
            .get(&self.url(path))
            .header(AUTH_HEADER, &token)
            .call()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        self.read_body(response, what)
    }

    fn read_body(&self, response: Response<ureq::Body>, what: &str) -> Result<Vec<u8>, FetchError> {
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            if status == 401 {
                warn!(what, "proxy rejected the access token, clearing it");
                self.credentials.clear();
            }
            return Err(FetchError::from_status(status, what));
        }

        let (_parts, body) = response.into_parts();
        let mut bytes = Vec::new();
        body.into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| FetchError::Network(format!("reading {what}: {e}")))?;
        Ok(bytes)
    }

    /// Validate `text` as a manifest and replace `/db.json` with it.
    pub fn upload_metadata(&self, text: &str) -> Result<Manifest, UploadError> {
        let manifest = Manifest::parse_strict(text)?;
        let token = self.token()?;
        let body = serde_json::to_string(&manifest)
            .map_err(|e| FetchError::Network(format!("encoding manifest: {e}")))?;

        debug!(
            albums = manifest.albums.len(),
            tracks = manifest.tracks.len(),
            "PUT /db.json"
        );
        let response = self
            .agent
            .put(&self.url("/db.json"))
            .header(AUTH_HEADER, &token)
            .header("Content-Type", "application/json")
            .send(body)
            .map_err(|e| FetchError::Network(e.to_string()))?;
        self.read_body(response, "db.json")?;
        Ok(manifest)
    }
}

/// `/<prefix>/<percent-encoded name>`. The name is encoded as one path
/// segment, slashes included.
fn object_path(prefix: &str, file_name: &str) -> String {
    format!("/{prefix}/{}", urlencoding::encode(file_name))
}

impl MetadataSource for ProxyClient {
    fn fetch_metadata(&self) -> Result<Manifest, FetchError> {
        let bytes = self.get_bytes("/db.json", "db.json")?;
        serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::Network(format!("malformed db.json: {e}")))
    }
}

impl AudioSource for ProxyClient {
    fn fetch_audio_bytes(&self, file_name: &str) -> Result<Vec<u8>, FetchError> {
        if file_name.is_empty() {
            return Err(FetchError::NotFound("track has no file".to_string()));
        }
        self.get_bytes(&object_path("music", file_name), file_name)
    }
}

impl ArtSource for ProxyClient {
    fn fetch_art_bytes(&self, file_name: &str) -> Option<Vec<u8>> {
        if file_name.is_empty() {
            return None;
        }
        match self.get_bytes(&object_path("art", file_name), file_name) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(file_name, error = %e, "art unavailable");
                None
            }
        }
    }
}
