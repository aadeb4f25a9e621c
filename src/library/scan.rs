//! Build a library manifest from a directory of audio files.
//!
//! The produced `fileName`/`art` values are paths relative to the scanned
//! root, which is how the files are laid out under `music/` and `art/` in the
//! backing object store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lofty::prelude::{AudioFile, ItemKey, TaggedFileExt};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ScanSettings;

use super::model::{Album, Manifest, Track};

const ART_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

fn has_extension(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            exts.iter().any(|e| e == &ext)
        })
        .unwrap_or(false)
}

fn normalized_extensions(settings: &ScanSettings) -> Vec<String> {
    settings
        .extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

/// Relative path with `/` separators regardless of platform.
fn object_key(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// One audio file with the tags we care about.
#[derive(Debug, Default)]
struct ScannedFile {
    key: String,
    dir: PathBuf,
    title: String,
    artist: Option<String>,
    album_artist: Option<String>,
    album: Option<String>,
    year: Option<String>,
    track_number: Option<u32>,
    duration: Option<f64>,
}

fn non_empty(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn read_file(root: &Path, path: &Path) -> ScannedFile {
    let mut file = ScannedFile {
        key: object_key(root, path),
        dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        title: path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("UNKNOWN")
            .to_string(),
        ..ScannedFile::default()
    };

    match lofty::read_from_path(path) {
        Ok(tagged) => {
            let secs = tagged.properties().duration().as_secs_f64();
            if secs > 0.0 {
                file.duration = Some(secs);
            }

            if let Some(tag) = tagged.primary_tag().or_else(|| tagged.first_tag()) {
                if let Some(v) = non_empty(tag.get_string(&ItemKey::TrackTitle)) {
                    file.title = v;
                }
                file.artist = non_empty(tag.get_string(&ItemKey::TrackArtist));
                file.album_artist = non_empty(tag.get_string(&ItemKey::AlbumArtist));
                file.album = non_empty(tag.get_string(&ItemKey::AlbumTitle));
                file.year = non_empty(tag.get_string(&ItemKey::Year));
                file.track_number = tag
                    .get_string(&ItemKey::TrackNumber)
                    .and_then(|n| n.split('/').next())
                    .and_then(|n| n.trim().parse().ok());
            }
        }
        Err(e) => debug!(path = %path.display(), error = %e, "no readable tags"),
    }

    // Untagged files are grouped by the directory they live in.
    if file.album.is_none() && file.dir != root {
        file.album = file
            .dir
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string);
    }

    file
}

/// Look for a sidecar cover image next to the audio files of an album.
fn find_art(root: &Path, dir: &Path, settings: &ScanSettings) -> Option<String> {
    let entries = std::fs::read_dir(dir).ok()?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let stem_ok = p
                .file_stem()
                .and_then(|s| s.to_str())
                .map(|s| {
                    let s = s.to_ascii_lowercase();
                    settings.art_names.iter().any(|n| n.eq_ignore_ascii_case(&s))
                })
                .unwrap_or(false);
            let ext_ok = p
                .extension()
                .and_then(|s| s.to_str())
                .map(|e| ART_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            stem_ok && ext_ok
        })
        .collect();

    // Prefer the order the names are configured in.
    candidates.sort_by_key(|p| {
        let stem = p
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        settings
            .art_names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(&stem))
            .unwrap_or(usize::MAX)
    });
    candidates.first().map(|p| object_key(root, p))
}

fn collect_files(dir: &Path, settings: &ScanSettings) -> Vec<ScannedFile> {
    let exts = normalized_extensions(settings);
    let mut walker = WalkDir::new(dir).follow_links(settings.follow_links);

    // Non-recursive = only the root directory.
    let depth_cap = if settings.recursive {
        settings.max_depth
    } else {
        Some(1)
    };
    if let Some(d) = depth_cap {
        walker = walker.max_depth(d);
    }

    walker
        .into_iter()
        .filter_entry(|e| settings.include_hidden || e.depth() == 0 || !is_hidden(e.path()))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(err) => {
                warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|e| e.path().is_file() && has_extension(e.path(), &exts))
        .map(|e| read_file(dir, e.path()))
        .collect()
}

/// Scan `dir` and build a manifest. Albums are keyed by (album artist, album
/// title); ids are assigned in sorted order so rescanning an unchanged tree
/// yields the same manifest.
pub fn scan(dir: &Path, settings: &ScanSettings) -> Manifest {
    let mut files = collect_files(dir, settings);

    let album_key = |f: &ScannedFile| -> Option<(String, String)> {
        let album = f.album.as_deref()?;
        let artist = f
            .album_artist
            .as_deref()
            .or(f.artist.as_deref())
            .unwrap_or_default();
        Some((artist.to_lowercase(), album.to_lowercase()))
    };

    files.sort_by(|a, b| {
        album_key(a)
            .cmp(&album_key(b))
            .then(a.track_number.unwrap_or(u32::MAX).cmp(&b.track_number.unwrap_or(u32::MAX)))
            .then(a.key.to_lowercase().cmp(&b.key.to_lowercase()))
    });

    let mut albums: BTreeMap<String, Album> = BTreeMap::new();
    let mut album_ids: BTreeMap<(String, String), String> = BTreeMap::new();
    let mut tracks: Vec<Track> = Vec::with_capacity(files.len());

    for (i, f) in files.iter().enumerate() {
        let album_id = album_key(f).map(|key| {
            if let Some(id) = album_ids.get(&key) {
                return id.clone();
            }
            let id = format!("a{:04}", album_ids.len() + 1);
            albums.insert(
                id.clone(),
                Album {
                    name: f.album.clone().unwrap_or_default(),
                    artist: f.album_artist.clone().or_else(|| f.artist.clone()),
                    year: f.year.clone(),
                    art: find_art(dir, &f.dir, settings),
                },
            );
            album_ids.insert(key, id.clone());
            id
        });

        tracks.push(Track {
            id: format!("t{:05}", i + 1),
            title: f.title.clone(),
            album_id,
            duration: f.duration,
            file_name: f.key.clone(),
        });
    }

    Manifest { albums, tracks }
}
