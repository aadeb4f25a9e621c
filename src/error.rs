//! Error types shared by the library store, the playback engine and the
//! proxy client.
//!
//! The core never panics across a notification boundary: every failure is
//! either one of these values or a `failed` notice on the bus.

use thiserror::Error;

/// Failure talking to the library proxy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Missing, invalid or expired credential. The caller must re-authenticate.
    #[error("not authorized: the access token is missing or was rejected")]
    Auth,

    /// The requested file reference does not resolve on the proxy.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure or unexpected HTTP status.
    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Map a non-success HTTP status to a fetch error.
    pub fn from_status(code: u16, what: &str) -> Self {
        match code {
            401 | 403 => Self::Auth,
            404 => Self::NotFound(what.to_string()),
            _ => Self::Network(format!("HTTP {code} for {what}")),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth)
    }
}

/// Loading a track into the playback engine failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("could not fetch audio: {0}")]
    Fetch(#[from] FetchError),

    #[error("could not decode audio: {0}")]
    Decode(String),

    #[error("the playback engine has been shut down")]
    Destroyed,
}

/// `play()` was refused. Distinct from [`LoadError`]: the loaded track is
/// still bound and the engine state is unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("nothing is loaded")]
    NothingLoaded,

    #[error("playback was rejected: {0}")]
    Rejected(String),

    #[error("the playback engine has been shut down")]
    Destroyed,
}

/// Errors reported by a media sink implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SinkError {
    #[error("{0}")]
    Decode(String),

    #[error("{0}")]
    Rejected(String),
}

/// A manifest was refused before it could replace library state.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest is not a JSON object")]
    NotAnObject,

    #[error("manifest has no `albums` mapping")]
    MissingAlbums,

    #[error("manifest has no `tracks` sequence")]
    MissingTracks,
}

/// Failure uploading a manifest.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// What the session reports back to the event loop after driving the
/// engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

impl SessionError {
    /// True when the proxy refused the credential and a new token is needed.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Load(LoadError::Fetch(e)) if e.is_auth())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_status_maps_auth_and_not_found() {
        assert_eq!(FetchError::from_status(401, "db.json"), FetchError::Auth);
        assert_eq!(FetchError::from_status(403, "db.json"), FetchError::Auth);
        assert_eq!(
            FetchError::from_status(404, "s1.mp3"),
            FetchError::NotFound("s1.mp3".to_string())
        );
        assert!(matches!(
            FetchError::from_status(502, "s1.mp3"),
            FetchError::Network(_)
        ));
    }

    #[test]
    fn load_error_wraps_fetch_error() {
        let err: LoadError = FetchError::Auth.into();
        assert_eq!(err, LoadError::Fetch(FetchError::Auth));
        assert!(err.to_string().contains("not authorized"));
    }

    #[test]
    fn session_error_detects_auth_failures() {
        let err: SessionError = LoadError::Fetch(FetchError::Auth).into();
        assert!(err.is_auth());
        let err: SessionError = PlaybackError::NothingLoaded.into();
        assert!(!err.is_auth());
    }
}
