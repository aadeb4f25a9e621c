use std::time::Duration;

use crate::config::RowField;

use super::model::{Album, Track, UNKNOWN_ARTIST};

/// Format seconds as `M:SS`. Unknown durations render as `0:00`.
pub fn format_duration(d: Option<Duration>) -> String {
    let secs = d.map_or(0, |d| d.as_secs());
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Build a list row for a track according to the provided `fields` and separator.
///
/// This composes metadata fields (title, artist, album, year, duration, file
/// name) in the configured order and falls back to the title, then the file
/// name, when no parts were produced.
pub fn row_from_fields(
    track: &Track,
    album: Option<&Album>,
    fields: &[RowField],
    sep: &str,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    for f in fields {
        match f {
            RowField::Title => {
                if !track.title.trim().is_empty() {
                    parts.push(track.title.trim().to_string());
                }
            }
            RowField::Artist => {
                parts.push(
                    album
                        .map(Album::artist_or_unknown)
                        .unwrap_or(UNKNOWN_ARTIST)
                        .to_string(),
                );
            }
            RowField::Album => {
                if let Some(a) = album.map(|a| a.name.trim()).filter(|s| !s.is_empty()) {
                    parts.push(a.to_string());
                }
            }
            RowField::Year => {
                if let Some(y) = album.and_then(|a| a.year.as_deref()) {
                    parts.push(y.to_string());
                }
            }
            RowField::Duration => {
                parts.push(format_duration(track.duration()));
            }
            RowField::Filename => {
                if !track.file_name.trim().is_empty() {
                    parts.push(track.file_name.clone());
                }
            }
        }
    }

    if !parts.is_empty() {
        parts.join(sep)
    } else if !track.title.trim().is_empty() {
        track.title.clone()
    } else {
        track.file_name.clone()
    }
}
