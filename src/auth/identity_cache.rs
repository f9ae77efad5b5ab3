// Durable warm-start cache for the identity snapshot
//
// Only the display profile is persisted; the credential itself never touches
// disk (persisting it would reopen the exposure window the in-memory design
// closes).

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::{CachedIdentity, IdentitySnapshot};

/// Default cache location under the platform data dir
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("storefront-admin/identity.json"))
}

/// File-backed cache of the last known identity snapshot.
pub struct IdentityCache {
    path: Option<PathBuf>,
}

impl IdentityCache {
    /// Cache at an explicit path, or disabled when `path` is `None`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Load the cached snapshot, if the cache is enabled and readable.
    /// A missing or corrupt file is treated as a cold start, not an error.
    pub fn load(&self) -> Option<IdentitySnapshot> {
        let path = self.path.as_deref()?;
        match read_cached(path) {
            Ok(cached) => {
                tracing::debug!(
                    email = %cached.admin.email,
                    cached_at = %cached.cached_at.to_rfc3339(),
                    "Loaded cached identity snapshot"
                );
                Some(cached.admin)
            }
            Err(e) => {
                if path.exists() {
                    tracing::warn!("Ignoring unreadable identity cache: {:#}", e);
                }
                None
            }
        }
    }

    /// Persist a fresh snapshot. Failure is logged and swallowed: the cache
    /// is an optimization, not session state.
    pub fn store(&self, identity: &IdentitySnapshot) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        if let Err(e) = write_cached(path, identity) {
            tracing::warn!("Failed to write identity cache: {:#}", e);
        }
    }

    /// Remove the cache file (logout, session loss).
    pub fn clear(&self) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                tracing::warn!("Failed to remove identity cache: {}", e);
            }
        }
    }
}

fn read_cached(path: &Path) -> Result<CachedIdentity> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read identity cache: {}", path.display()))?;
    serde_json::from_str(&raw).context("Failed to parse identity cache")
}

fn write_cached(path: &Path, identity: &IdentitySnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache dir: {}", parent.display()))?;
    }
    let cached = CachedIdentity {
        admin: identity.clone(),
        cached_at: Utc::now(),
    };
    let raw = serde_json::to_string_pretty(&cached).context("Failed to encode identity cache")?;
    fs::write(path, raw)
        .with_context(|| format!("Failed to write identity cache: {}", path.display()))?;
    Ok(())
}
