use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Artist shown when a track has no resolvable album or the album has none.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_id: Option<String>,
    /// Seconds. Zero, negative, overlarge or missing means unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Object key under `music/` on the proxy.
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_name: String,
}

impl Track {
    pub fn duration(&self) -> Option<Duration> {
        self.duration
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Album {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<String>,
    /// Object key under `art/` on the proxy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub art: Option<String>,
}

impl Album {
    pub fn artist_or_unknown(&self) -> &str {
        self.artist
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(UNKNOWN_ARTIST)
    }
}

/// The library manifest served as `db.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub albums: BTreeMap<String, Album>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tracks: Vec<Track>,
}

impl Manifest {
    /// Parse a manifest that is about to replace the remote one. Unlike plain
    /// deserialization, both sections must be present.
    pub fn parse_strict(text: &str) -> Result<Self, ValidationError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Self::from_value_strict(value)
    }

    pub fn from_value_strict(value: serde_json::Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::NotAnObject)?;
        if !obj.get("albums").is_some_and(serde_json::Value::is_object) {
            return Err(ValidationError::MissingAlbums);
        }
        if !obj.get("tracks").is_some_and(serde_json::Value::is_array) {
            return Err(ValidationError::MissingTracks);
        }
        Ok(serde_json::from_value(value)?)
    }
}

// `year` shows up both as `2001` and `"2001"` in hand-written manifests.
fn string_or_number<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(de)? {
        None => None,
        Some(Raw::Str(s)) if s.trim().is_empty() => None,
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(f)) => Some(f.to_string()),
    })
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}
