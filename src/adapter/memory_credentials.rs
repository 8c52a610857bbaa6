//! In-memory [`CredentialStore`].

use parking_lot::Mutex;

use crate::port::credentials::CredentialStore;

/// Credential store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    username: Mutex<Option<String>>,
    password: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_username(&self) -> Option<String> {
        self.username.lock().clone()
    }

    fn store_username(&self, username: &str) {
        *self.username.lock() = Some(username.to_string());
    }

    fn load_password(&self) -> Option<String> {
        self.password.lock().clone()
    }

    fn store_password(&self, password: &str) {
        *self.password.lock() = Some(password.to_string());
    }

    fn remove_password(&self) {
        *self.password.lock() = None;
    }
}
