// In-memory credential store
// The only place the short-lived token lives; never written to disk.

use std::sync::RwLock;

use super::types::{Credential, IdentitySnapshot};

/// Holds the current credential and identity snapshot in process memory.
///
/// Reads are synchronous and cheap: the pipeline consults the store on every
/// outbound call. Writes come only from the refresh coordinator and the
/// session lifecycle, which serialize among themselves, so a plain `RwLock`
/// with short critical sections is sufficient (never held across an await).
pub struct CredentialStore {
    credential: RwLock<Option<Credential>>,
    identity: RwLock<Option<IdentitySnapshot>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self {
            credential: RwLock::new(None),
            identity: RwLock::new(None),
        }
    }

    /// Current credential, if any. Absence is not an error: requests proceed
    /// unauthenticated and the server decides.
    pub fn get(&self) -> Option<Credential> {
        self.credential
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Identity of the signed-in administrator, if any.
    pub fn identity(&self) -> Option<IdentitySnapshot> {
        self.identity
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Commit a new credential and identity together.
    pub fn set(&self, credential: Credential, identity: IdentitySnapshot) {
        *self
            .credential
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(credential);
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = Some(identity);
    }

    /// Drop both the credential and the identity snapshot.
    pub fn clear(&self) {
        *self
            .credential
            .write()
            .unwrap_or_else(|e| e.into_inner()) = None;
        *self.identity.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
