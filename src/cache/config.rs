//! Cache layer configuration.
//!
//! ```json
//! {
//!   "cache_prefix": "slm_cache_",
//!   "routes": {
//!     "blog.show": { "match_method": "GET" }
//!   },
//!   "cache": { "adapter": "memory", "options": { "ttl": 300 } },
//!   "use_compression": true
//! }
//! ```
//!
//! The section may also be nested under a top-level `"slm_cache"` key, which lets the
//! cache settings live inside a larger application config file.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::backend::BackendConfig;
use super::error::SetupError;
use super::key::DEFAULT_PREFIX;
use super::policy::{PolicyRegistry, RoutePolicy};

const SECTION: &str = "slm_cache";

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_prefix")]
    pub cache_prefix: String,

    #[serde(default)]
    pub routes: HashMap<String, RoutePolicy>,

    /// Unset means the layer cannot be built.
    #[serde(default)]
    pub cache: Option<BackendConfig>,

    #[serde(default)]
    pub use_compression: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_prefix: default_prefix(),
            routes: HashMap::new(),
            cache: None,
            use_compression: false,
        }
    }
}

impl CacheConfig {
    /// Parses either a bare section or a document containing an `slm_cache` section.
    pub fn from_json_str(json: &str) -> Result<Self, SetupError> {
        let section = match serde_json::from_str::<serde_json::Value>(json)? {
            serde_json::Value::Object(mut document) => document
                .remove(SECTION)
                .unwrap_or(serde_json::Value::Object(document)),
            other => other,
        };
        Ok(serde_json::from_value(section)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SetupError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// The route policies as a lookup registry.
    pub fn policy_registry(&self) -> PolicyRegistry {
        self.routes
            .iter()
            .map(|(route, policy)| (route.clone(), policy.clone()))
            .collect()
    }
}
