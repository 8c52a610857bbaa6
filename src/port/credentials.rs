//! Credential storage port.
//!
//! The service keeps credentials in memory; a store is only consulted to
//! remember them across restarts and to pick up a password saved elsewhere.

/// Persistent store for the portal username and password.
pub trait CredentialStore: Send + Sync {
    fn load_username(&self) -> Option<String>;

    fn store_username(&self, username: &str);

    fn load_password(&self) -> Option<String>;

    fn store_password(&self, password: &str);

    /// Forget the stored password, e.g. after the server rejected it.
    fn remove_password(&self);
}
