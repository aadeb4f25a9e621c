use tracing::warn;

use crate::config;

/// Load settings, falling back to defaults when the file is unreadable or
/// invalid. Runs before logging is set up, so problems are also reported
/// on stderr.
pub fn load_settings() -> config::Settings {
    match config::Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                eprintln!("encore: invalid config, using defaults: {msg}");
                warn!(%msg, "invalid config, using defaults");
                config::Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            // Config is optional; failures should not prevent the app from starting.
            eprintln!("encore: failed to load config, using defaults: {e}");
            warn!(error = %e, "failed to load config, using defaults");
            config::Settings::default()
        }
    }
}
