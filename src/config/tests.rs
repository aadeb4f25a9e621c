use super::load::{default_config_path, default_log_path, resolve_config_path};
use super::schema::*;
use crate::audio::RepeatMode;
use std::sync::{Mutex, OnceLock};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

struct EnvGuard {
    key: &'static str,
    old: Option<std::ffi::OsString>,
}

impl EnvGuard {
    fn set(key: &'static str, val: &str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::set_var(key, val);
        }
        Self { key, old }
    }

    fn remove(key: &'static str) -> Self {
        let old = std::env::var_os(key);
        unsafe {
            std::env::remove_var(key);
        }
        Self { key, old }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match self.old.take() {
            Some(v) => unsafe {
                std::env::set_var(self.key, v);
            },
            None => unsafe {
                std::env::remove_var(self.key);
            },
        }
    }
}

#[test]
fn resolve_config_path_prefers_encore_config_path() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", "/tmp/encore-test-config.toml");
    assert_eq!(
        resolve_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/encore-test-config.toml")
    );
}

#[test]
fn default_config_path_prefers_xdg_config_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_CONFIG_HOME", "/tmp/xdg-config-home");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-should-not-win");

    assert_eq!(
        default_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/xdg-config-home")
            .join("encore")
            .join("config.toml")
    );
}

#[test]
fn default_config_path_falls_back_to_home_dot_config() {
    let _lock = env_lock();
    let _g1 = EnvGuard::remove("XDG_CONFIG_HOME");
    let _g2 = EnvGuard::set("HOME", "/tmp/home-dir");

    assert_eq!(
        default_config_path().unwrap(),
        std::path::PathBuf::from("/tmp/home-dir")
            .join(".config")
            .join("encore")
            .join("config.toml")
    );
}

#[test]
fn default_log_path_uses_xdg_state_home() {
    let _lock = env_lock();
    let _g1 = EnvGuard::set("XDG_STATE_HOME", "/tmp/xdg-state");
    assert_eq!(
        default_log_path().unwrap(),
        std::path::PathBuf::from("/tmp/xdg-state/encore/encore.log")
    );

    let _g2 = EnvGuard::remove("XDG_STATE_HOME");
    let _g3 = EnvGuard::set("HOME", "/tmp/home-dir");
    assert_eq!(
        default_log_path().unwrap(),
        std::path::PathBuf::from("/tmp/home-dir/.local/state/encore/encore.log")
    );
}

#[test]
fn settings_load_from_config_file_and_parse_aliases() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[proxy]
url = "https://music.example.org"
token = "abc123"
timeout_secs = 15

[playback]
shuffle = true
repeat = "repeat-one"
volume = 0.5
auto_advance = false

[controls]
scrub_seconds = 9
volume_step = 0.1

[ui]
follow_playback = false
header_text = "hello"
row_fields = ["title", "file-name"]
row_separator = " • "
time_fields = ["elapsed", "remaining"]
time_separator = " | "

[scan]
extensions = ["mp3"]
recursive = false
include_hidden = false
follow_links = false
art_names = ["front"]

[logging]
level = "debug"
file = "/tmp/encore.log"
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::remove("ENCORE__PLAYBACK__VOLUME");

    let s = Settings::load().unwrap();
    assert_eq!(s.proxy.url, "https://music.example.org");
    assert_eq!(s.proxy.token.as_deref(), Some("abc123"));
    assert_eq!(s.proxy.timeout_secs, 15);
    assert!(s.playback.shuffle);
    assert_eq!(s.playback.repeat, RepeatSetting::One);
    assert_eq!(RepeatMode::from(s.playback.repeat), RepeatMode::One);
    assert_eq!(s.playback.volume, 0.5);
    assert!(!s.playback.auto_advance);
    assert_eq!(s.controls.scrub_seconds, 9);
    assert!(!s.ui.follow_playback);
    assert_eq!(s.ui.header_text, "hello");
    assert_eq!(s.ui.row_fields, vec![RowField::Title, RowField::Filename]);
    assert_eq!(s.ui.row_separator, " • ");
    assert_eq!(s.ui.time_fields, vec![TimeField::Elapsed, TimeField::Remaining]);
    assert_eq!(s.ui.time_separator, " | ");
    assert_eq!(s.scan.extensions, vec!["mp3".to_string()]);
    assert!(!s.scan.recursive);
    assert!(!s.scan.include_hidden);
    assert!(!s.scan.follow_links);
    assert_eq!(s.scan.art_names, vec!["front".to_string()]);
    assert_eq!(s.logging.level, "debug");
    assert_eq!(
        s.logging.file,
        Some(std::path::PathBuf::from("/tmp/encore.log"))
    );
    assert!(s.validate().is_ok());
}

#[test]
fn settings_env_overrides_config_file() {
    let _lock = env_lock();

    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("config.toml");
    std::fs::write(
        &cfg_path,
        r#"
[controls]
scrub_seconds = 5
"#,
    )
    .unwrap();

    let _g1 = EnvGuard::set("ENCORE_CONFIG_PATH", cfg_path.to_str().unwrap());
    let _g2 = EnvGuard::set("ENCORE__CONTROLS__SCRUB_SECONDS", "30");

    let s = Settings::load().unwrap();
    assert_eq!(s.controls.scrub_seconds, 30);
}

#[test]
fn missing_config_file_yields_defaults() {
    let _lock = env_lock();
    let dir = tempfile::tempdir().unwrap();
    let _g1 = EnvGuard::set(
        "ENCORE_CONFIG_PATH",
        dir.path().join("absent.toml").to_str().unwrap(),
    );

    let s = Settings::load().unwrap();
    assert_eq!(s.proxy.url, ProxySettings::default().url);
    assert_eq!(s.playback.repeat, RepeatSetting::Off);
    assert!(s.playback.auto_advance);
    assert!(s.validate().is_ok());
}

#[test]
fn validate_rejects_out_of_range_values() {
    let mut s = Settings::default();
    s.proxy.url = "  ".to_string();
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.playback.volume = 1.2;
    assert!(s.validate().is_err());

    let mut s = Settings::default();
    s.controls.volume_step = 0.0;
    assert!(s.validate().is_err());
}
