// Authentication module
// Credential storage, identity warm-start cache, and single-flight refresh

mod identity_cache;
mod refresh;
mod store;
mod types;

pub use identity_cache::{default_cache_path, IdentityCache};
pub use refresh::{RefreshCoordinator, RefreshFailure};
pub use store::CredentialStore;
pub use types::{Credential, IdentitySnapshot, LoginRequest, SessionResponse};
