use std::path::PathBuf;

use serde::Deserialize;

use crate::audio::RepeatMode;

/// Top-level application settings loaded from `config.toml`.
///
/// File format: TOML
/// Default path (Linux/XDG): `$XDG_CONFIG_HOME/encore/config.toml` or `~/.config/encore/config.toml`
///
/// Precedence (highest wins):
/// 1) Environment variables (prefix `ENCORE__`, `__` as nested separator)
/// 2) Config file (if present)
/// 3) Struct defaults
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub proxy: ProxySettings,
    pub playback: PlaybackSettings,
    pub controls: ControlsSettings,
    pub ui: UiSettings,
    pub scan: ScanSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Base URL of the library proxy, e.g. `https://music.example.org`.
    pub url: String,
    /// Access token to start the session with. When unset the UI asks for one.
    pub token: Option<String>,
    /// Per-request timeout in seconds. Audio files are fetched whole, so
    /// keep this generous.
    pub timeout_secs: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            token: None,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Whether shuffle starts enabled.
    pub shuffle: bool,
    /// Default repeat mode.
    pub repeat: RepeatSetting,
    /// Initial volume in `[0, 1]`.
    pub volume: f32,
    /// Play the next queued track when one ends.
    pub auto_advance: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            shuffle: false,
            repeat: RepeatSetting::Off,
            volume: 1.0,
            auto_advance: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepeatSetting {
    #[serde(alias = "none", alias = "no-repeat", alias = "no_loop", alias = "no-loop")]
    Off,
    #[serde(alias = "loop-all", alias = "loop_all", alias = "repeat-all")]
    All,
    #[serde(alias = "loop-one", alias = "loop_one", alias = "repeat-one")]
    One,
}

impl From<RepeatSetting> for RepeatMode {
    fn from(s: RepeatSetting) -> Self {
        match s {
            RepeatSetting::Off => RepeatMode::Off,
            RepeatSetting::All => RepeatMode::All,
            RepeatSetting::One => RepeatMode::One,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ControlsSettings {
    /// Number of seconds to scrub when pressing `H` / `L`.
    pub scrub_seconds: u64,
    /// Volume change per `+` / `-` press.
    pub volume_step: f32,
}

impl Default for ControlsSettings {
    fn default() -> Self {
        Self {
            scrub_seconds: 5,
            volume_step: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Whether the cursor starts in "follow playback" mode.
    pub follow_playback: bool,

    /// The text rendered inside the top header box.
    pub header_text: String,

    /// Which track fields make up a row in the tracks list, and in what order.
    ///
    /// Example: ["artist", "title", "duration"]
    pub row_fields: Vec<RowField>,

    /// Separator used to join `row_fields`.
    pub row_separator: String,

    /// Which time fields to show in the now-playing bar, and in what order.
    ///
    /// Example: ["elapsed", "total", "remaining"]
    pub time_fields: Vec<TimeField>,

    /// Separator used to join `time_fields`.
    pub time_separator: String,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            follow_playback: true,
            header_text: " ~ encore ~ ".to_string(),
            row_fields: vec![RowField::Artist, RowField::Title, RowField::Duration],
            row_separator: " - ".to_string(),
            time_fields: vec![TimeField::Elapsed, TimeField::Total],
            time_separator: " / ".to_string(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeField {
    Elapsed,
    Total,
    Remaining,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowField {
    Title,
    Artist,
    Album,
    Year,
    Duration,
    #[serde(alias = "file-name", alias = "file_name")]
    Filename,
}

/// Settings for `encore scan`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// File extensions to treat as audio (case-insensitive, without dot).
    pub extensions: Vec<String>,
    /// Whether to follow symlinks during scanning.
    pub follow_links: bool,
    /// Whether to include hidden files/directories (dotfiles).
    pub include_hidden: bool,
    /// Whether to recurse into subdirectories.
    pub recursive: bool,
    /// Optional cap on directory recursion depth.
    pub max_depth: Option<usize>,
    /// Sidecar image stems recognised as album art, in order of preference.
    pub art_names: Vec<String>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            extensions: vec![
                "mp3".into(),
                "flac".into(),
                "wav".into(),
                "ogg".into(),
                "m4a".into(),
                "opus".into(),
            ],
            follow_links: true,
            include_hidden: true,
            recursive: true,
            max_depth: None,
            art_names: vec![
                "cover".into(),
                "folder".into(),
                "front".into(),
                "album".into(),
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `ENCORE_LOG` / `RUST_LOG` are unset.
    pub level: String,
    /// Log file for the TUI. Defaults to `$XDG_STATE_HOME/encore/encore.log`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
