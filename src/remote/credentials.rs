use std::sync::{Arc, Mutex};

/// Where the proxy access token lives. Read immediately before every
/// request so a token entered mid-session applies to the next call.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<String>;
    fn set(&self, token: &str);
    fn clear(&self);
}

/// In-memory credential for the lifetime of one session. Clones share the
/// same slot.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials(Arc<Mutex<Option<String>>>);

impl SessionCredentials {
    pub fn new(initial: Option<String>) -> Self {
        let store = Self::default();
        if let Some(token) = initial {
            store.set(&token);
        }
        store
    }
}

impl CredentialStore for SessionCredentials {
    fn get(&self) -> Option<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Blank tokens are treated as no token at all.
    fn set(&self, token: &str) {
        let token = token.trim();
        let mut slot = self.0.lock().unwrap_or_else(|e| e.into_inner());
        *slot = (!token.is_empty()).then(|| token.to_string());
    }

    fn clear(&self) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
