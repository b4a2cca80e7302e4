//! Cache backends and their resolution from configuration.
//!
//! The layer talks to storage only through [`CacheBackend`]. A backend is resolved
//! once, while the layer is built, from a [`BackendConfig`]:
//!
//! - a string names an instance previously put into a [`ServiceRegistry`];
//! - an object is an inline definition (`{"adapter": "memory", "options": {...}}`) built on
//!   the spot.
//!
//! Anything else (nothing configured, an unknown name, a registered service that is
//! not a backend, an unknown adapter) is a [`SetupError`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use moka::sync::Cache;
use serde::Deserialize;
use tracing::debug;

use super::error::{BackendError, SetupError};

/// Key/value storage for cached payloads.
///
/// Calls are synchronous from the layer's point of view. Expiry, timeouts, and retries
/// belong to the implementation.
pub trait CacheBackend: Send + Sync {
    /// `Ok(None)` when nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError>;

    fn set(&self, key: &str, payload: Bytes) -> Result<(), BackendError>;
}

/// Options accepted by the `memory` adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryOptions {
    #[serde(default = "MemoryOptions::default_capacity")]
    pub max_capacity: u64,
    /// Time-to-live in seconds.
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl MemoryOptions {
    fn default_capacity() -> u64 {
        10_000
    }
}

impl Default for MemoryOptions {
    fn default() -> Self {
        Self {
            max_capacity: Self::default_capacity(),
            ttl: None,
        }
    }
}

/// In-process backend over a bounded moka cache.
///
/// Cloning is cheap and shares the underlying storage.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Cache<String, Bytes>,
}

impl MemoryBackend {
    pub fn new(options: &MemoryOptions) -> Self {
        let mut builder = Cache::builder().max_capacity(options.max_capacity);
        if let Some(ttl) = options.ttl {
            builder = builder.time_to_live(Duration::from_secs(ttl));
        }
        Self {
            inner: builder.build(),
        }
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(&MemoryOptions::default())
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl CacheBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        Ok(self.inner.get(key))
    }

    fn set(&self, key: &str, payload: Bytes) -> Result<(), BackendError> {
        self.inner.insert(key.to_owned(), payload);
        Ok(())
    }
}

/// A backend that stores nothing, for disabling the cache without removing policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBackend;

impl CacheBackend for NullBackend {
    fn get(&self, _key: &str) -> Result<Option<Bytes>, BackendError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _payload: Bytes) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Named, type-erased services available to configuration.
///
/// Backends are registered as `Arc<dyn CacheBackend>`; resolving a name that holds some
/// other type fails with [`SetupError::NotABackend`].
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an arbitrary service under `name`, replacing any previous one.
    pub fn insert<T>(&mut self, name: impl Into<String>, service: T)
    where
        T: Any + Send + Sync,
    {
        self.services.insert(name.into(), Arc::new(service));
    }

    /// Registers `backend` under `name`.
    pub fn insert_backend(&mut self, name: impl Into<String>, backend: Arc<dyn CacheBackend>) {
        self.insert(name, backend);
    }

    /// Looks up `name` and checks it provides the backend capability.
    pub fn backend(&self, name: &str) -> Result<Arc<dyn CacheBackend>, SetupError> {
        let service = self
            .services
            .get(name)
            .ok_or_else(|| SetupError::UnknownService {
                name: name.to_owned(),
            })?;

        service
            .downcast_ref::<Arc<dyn CacheBackend>>()
            .cloned()
            .ok_or_else(|| SetupError::NotABackend {
                name: name.to_owned(),
            })
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An inline backend definition.
#[derive(Debug, Clone, Deserialize)]
pub struct InlineBackend {
    pub adapter: String,
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Where the backend comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BackendConfig {
    Named(String),
    Inline(InlineBackend),
}

impl BackendConfig {
    /// Produces the backend this config describes.
    pub fn resolve(&self, services: &ServiceRegistry) -> Result<Arc<dyn CacheBackend>, SetupError> {
        match self {
            Self::Named(name) => {
                debug!(service = %name, "resolving named cache backend");
                services.backend(name)
            }
            Self::Inline(inline) => inline.build(),
        }
    }
}

impl InlineBackend {
    fn build(&self) -> Result<Arc<dyn CacheBackend>, SetupError> {
        debug!(adapter = %self.adapter, "building inline cache backend");
        match self.adapter.as_str() {
            "memory" => {
                let options = if self.options.is_null() {
                    MemoryOptions::default()
                } else {
                    MemoryOptions::deserialize(&self.options).map_err(|source| {
                        SetupError::InvalidOptions {
                            adapter: self.adapter.clone(),
                            source,
                        }
                    })?
                };
                Ok(Arc::new(MemoryBackend::new(&options)))
            }
            "null" => Ok(Arc::new(NullBackend)),
            other => Err(SetupError::UnknownAdapter {
                adapter: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(json: &str) -> BackendConfig {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn memory_backend_round_trip() {
        let backend = MemoryBackend::default();
        assert!(backend.get("k").unwrap().is_none());
        backend.set("k", Bytes::from_static(b"v")).unwrap();
        assert_eq!(backend.get("k").unwrap(), Some(Bytes::from_static(b"v")));
        assert_eq!(backend.entry_count(), 1);
    }

    #[test]
    fn null_backend_never_returns_anything() {
        NullBackend.set("k", Bytes::from_static(b"v")).unwrap();
        assert!(NullBackend.get("k").unwrap().is_none());
    }

    #[test]
    fn named_backend_is_resolved_from_registry() {
        let shared = MemoryBackend::default();
        let mut services = ServiceRegistry::new();
        services.insert_backend("page-cache", Arc::new(shared.clone()));

        let backend = config(r#""page-cache""#).resolve(&services).unwrap();
        backend.set("k", Bytes::from_static(b"v")).unwrap();
        assert_eq!(shared.get("k").unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[test]
    fn unknown_name_fails() {
        let err = config(r#""missing""#)
            .resolve(&ServiceRegistry::new())
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::UnknownService { name } if name == "missing"));
    }

    #[test]
    fn non_backend_service_fails() {
        let mut services = ServiceRegistry::new();
        services.insert("Config", String::from("not a cache"));

        let err = config(r#""Config""#).resolve(&services).err().unwrap();
        assert!(matches!(err, SetupError::NotABackend { name } if name == "Config"));
    }

    #[test]
    fn inline_memory_backend_with_options() {
        let backend = config(r#"{ "adapter": "memory", "options": { "max_capacity": 10, "ttl": 60 } }"#)
            .resolve(&ServiceRegistry::new())
            .unwrap();
        backend.set("k", Bytes::from_static(b"v")).unwrap();
        assert!(backend.get("k").unwrap().is_some());
    }

    #[test]
    fn inline_memory_backend_without_options() {
        assert!(
            config(r#"{ "adapter": "memory" }"#)
                .resolve(&ServiceRegistry::new())
                .is_ok()
        );
    }

    #[test]
    fn inline_null_backend() {
        let backend = config(r#"{ "adapter": "null" }"#)
            .resolve(&ServiceRegistry::new())
            .unwrap();
        backend.set("k", Bytes::from_static(b"v")).unwrap();
        assert!(backend.get("k").unwrap().is_none());
    }

    #[test]
    fn unknown_adapter_fails() {
        let err = config(r#"{ "adapter": "filesystem" }"#)
            .resolve(&ServiceRegistry::new())
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::UnknownAdapter { adapter } if adapter == "filesystem"));
    }

    #[test]
    fn invalid_adapter_options_fail() {
        let err = config(r#"{ "adapter": "memory", "options": { "capacity": "lots" } }"#)
            .resolve(&ServiceRegistry::new())
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::InvalidOptions { .. }));
    }

    #[test]
    fn non_string_non_object_config_is_rejected() {
        assert!(serde_json::from_str::<BackendConfig>("42").is_err());
    }
}
