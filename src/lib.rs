// Storefront Admin Client - library root

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod session;

pub use auth::{Credential, IdentitySnapshot};
pub use client::{AdminClient, RequestDescriptor};
pub use config::ClientConfig;
pub use error::ApiError;
pub use session::{SessionLifecycle, SessionState};
