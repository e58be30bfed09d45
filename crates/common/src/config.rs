//! Hub configuration.
//!
//! Owned and injected by the embedding binary; the hub itself keeps no
//! process-wide state.

use serde::{Deserialize, Serialize};

/// Hard ceiling applied to uploads when the client declares no usable size.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Default capacity of the revocation timestamp cache.
pub const DEFAULT_AUTH_TIMESTAMP_CACHE_SIZE: u64 = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Name this hub answers to; pinned by token challenge and hub-URL claims.
    pub server_name: String,

    /// Additional hub URLs accepted by the token hub-URL claim.
    pub valid_hub_urls: Vec<String>,

    /// When set, tokens must carry a hub-URL claim matching this hub.
    pub require_correct_hub_url: bool,

    /// Public URL prefix returned to writers. When it differs from the
    /// driver's natural prefix, returned URLs are rewritten onto it.
    pub read_url: Option<String>,

    /// Upload ceiling, enforced against both the declared and the observed
    /// size.
    pub max_file_upload_size_bytes: u64,

    /// Capacity of the in-memory revocation timestamp cache.
    pub auth_timestamp_cache_size: u64,

    /// Optional writer allow-list. When present, membership is required for
    /// every mutating operation.
    pub whitelist: Option<Vec<String>>,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            server_name: "localhost:4000".to_string(),
            valid_hub_urls: Vec::new(),
            require_correct_hub_url: false,
            read_url: None,
            max_file_upload_size_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            auth_timestamp_cache_size: DEFAULT_AUTH_TIMESTAMP_CACHE_SIZE,
            whitelist: None,
        }
    }
}
