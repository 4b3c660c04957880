use std::sync::{Arc, Mutex, MutexGuard};

/// A bearer token plus the user id it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub user_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &format_args!("[REDACTED; {} chars]", self.token.len()))
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Default)]
struct Slots {
    token: Option<String>,
    user_id: Option<String>,
}

/// Process-wide credential cache shared by the resolver and the traffic observer.
///
/// Each field is write-once: the first non-empty value offered sticks for the
/// lifetime of the store and later offers are ignored. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    slots: Arc<Mutex<Slots>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        // Slots are plain strings, so a panic while holding the lock cannot
        // leave them half-written.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Offer a token. Returns `true` if it was stored.
    pub fn offer_token(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        let mut slots = self.lock();
        if slots.token.is_some() {
            return false;
        }
        slots.token = Some(token.to_string());
        true
    }

    /// Offer a user id. Returns `true` if it was stored.
    pub fn offer_user_id(&self, user_id: &str) -> bool {
        if user_id.is_empty() {
            return false;
        }
        let mut slots = self.lock();
        if slots.user_id.is_some() {
            return false;
        }
        slots.user_id = Some(user_id.to_string());
        true
    }

    pub fn token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.lock().user_id.clone()
    }

    pub fn has_token(&self) -> bool {
        self.lock().token.is_some()
    }

    pub fn has_user_id(&self) -> bool {
        self.lock().user_id.is_some()
    }

    /// Both fields, if both are known.
    pub fn get(&self) -> Option<Credentials> {
        let slots = self.lock();
        match (&slots.token, &slots.user_id) {
            (Some(token), Some(user_id)) => Some(Credentials {
                token: token.clone(),
                user_id: user_id.clone(),
            }),
            _ => None,
        }
    }
}
