//! The lifecycle coordinator: decides hit, miss, and store for each request.
//!
//! [`CacheLayer`] exposes the two interception points as plain methods,
//! [`on_route_resolved`](CacheLayer::on_route_resolved) and
//! [`on_response_finalized`](CacheLayer::on_response_finalized), threaded together by a
//! caller-owned [`RequestState`]. Its [`Middleware`] implementation wires both into the
//! pipeline: the first runs before `next`, the second on the response coming back.
//!
//! Every decision is reported on the response through the `X-Slm-Cache` header:
//!
//! ```text
//! X-Slm-Cache: Fetch: Hit; route=blog.show
//! X-Slm-Cache: Fetch: Miss; route=blog.show
//! X-Slm-Cache: Storage: Success; route=blog.show
//! ```

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::context::Context;
use crate::middleware::{Middleware, Next};
use crate::router::RouteMatch;
use crate::{Method, Response, StatusCode};

use super::backend::{CacheBackend, ServiceRegistry};
use super::codec::Codec;
use super::config::CacheConfig;
use super::error::SetupError;
use super::key::KeyDeriver;
use super::matcher::{MatchResult, match_request};
use super::policy::PolicyRegistry;

/// Diagnostic header carrying fetch and storage outcomes.
pub const CACHE_HEADER: &str = "X-Slm-Cache";

fn fetch_hit(route: &str) -> String {
    format!("Fetch: Hit; route={route}")
}

fn fetch_miss(route: &str) -> String {
    format!("Fetch: Miss; route={route}")
}

fn storage_success(route: &str) -> String {
    format!("Storage: Success; route={route}")
}

/// Per-request cache state, created as [`RequestState::Init`] and advanced by
/// [`CacheLayer::on_route_resolved`].
///
/// A miss is recorded as `PassThrough`; its `Fetch: Miss` marker is written onto the
/// response the handler eventually produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestState {
    /// Route not evaluated yet, or evaluated without a policy match.
    #[default]
    Init,
    /// Matched, not in the cache; the finalized response will be stored under `key`.
    PassThrough { matched: MatchResult, key: String },
    /// Answered from the cache; nothing is stored at finalization.
    ServedFromCache { matched: MatchResult },
}

impl RequestState {
    pub fn matched(&self) -> Option<&MatchResult> {
        match self {
            Self::Init => None,
            Self::PassThrough { matched, .. } | Self::ServedFromCache { matched } => Some(matched),
        }
    }

    pub fn is_served_from_cache(&self) -> bool {
        matches!(self, Self::ServedFromCache { .. })
    }
}

/// What finalization did with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Skipped,
    Committed,
    /// Encoding or the backend write failed; the response is still delivered.
    Failed,
}

/// Decides whether a finalized response may be stored.
pub type StoreFilter = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

struct Inner {
    policies: PolicyRegistry,
    backend: Arc<dyn CacheBackend>,
    keys: KeyDeriver,
    codec: Codec,
    store_filter: Option<StoreFilter>,
}

/// Selective response cache. Cloning shares the same policies and backend.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rttp_cache::cache::{CacheConfig, CacheLayer, MemoryBackend, ServiceRegistry};
///
/// let mut services = ServiceRegistry::new();
/// services.insert_backend("page-cache", Arc::new(MemoryBackend::default()));
///
/// let config = CacheConfig::from_json_str(
///     r#"{ "routes": { "blog.show": { "match_method": "GET" } }, "cache": "page-cache" }"#,
/// )
/// .unwrap();
/// let layer = CacheLayer::from_config(&config, &services).unwrap();
/// # let _ = layer;
/// ```
#[derive(Clone)]
pub struct CacheLayer {
    inner: Arc<Inner>,
}

impl CacheLayer {
    pub fn new(
        policies: PolicyRegistry,
        backend: Arc<dyn CacheBackend>,
        keys: KeyDeriver,
        codec: Codec,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                policies,
                backend,
                keys,
                codec,
                store_filter: None,
            }),
        }
    }

    /// Builds the layer from configuration, resolving the backend exactly once.
    ///
    /// # Errors
    ///
    /// [`SetupError::Unconfigured`] when no backend is configured, or whatever
    /// [`BackendConfig::resolve`](super::BackendConfig::resolve) reports.
    pub fn from_config(config: &CacheConfig, services: &ServiceRegistry) -> Result<Self, SetupError> {
        let backend = config
            .cache
            .as_ref()
            .ok_or(SetupError::Unconfigured)?
            .resolve(services)?;

        let layer = Self::new(
            config.policy_registry(),
            backend,
            KeyDeriver::new(config.cache_prefix.clone()),
            Codec::from_flag(config.use_compression),
        );
        info!(
            routes = layer.inner.policies.len(),
            prefix = %config.cache_prefix,
            compression = config.use_compression,
            "response cache ready"
        );
        Ok(layer)
    }

    /// Restricts which finalized responses are stored. Without a filter every
    /// response to a matched request is stored, whatever its status.
    #[must_use]
    pub fn with_store_filter<F>(self, filter: F) -> Self
    where
        F: Fn(&Response) -> bool + Send + Sync + 'static,
    {
        let inner = match Arc::try_unwrap(self.inner) {
            Ok(inner) => inner,
            Err(shared) => Inner {
                policies: shared.policies.clone(),
                backend: Arc::clone(&shared.backend),
                keys: shared.keys.clone(),
                codec: shared.codec,
                store_filter: shared.store_filter.clone(),
            },
        };
        Self {
            inner: Arc::new(Inner {
                store_filter: Some(Arc::new(filter)),
                ..inner
            }),
        }
    }

    /// Route-resolved hook.
    ///
    /// Only evaluates from [`RequestState::Init`]; later calls for the same request
    /// return `None` without touching the backend. Returns the cached response on a hit,
    /// which the caller must send instead of running the handler.
    pub fn on_route_resolved(
        &self,
        route: &RouteMatch,
        method: &Method,
        state: &mut RequestState,
    ) -> Option<Response> {
        if *state != RequestState::Init {
            return None;
        }

        let matched = match_request(&self.inner.policies, route, method)?;
        let key = self.inner.keys.derive(&matched);

        let payload = match self.inner.backend.get(&key) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(route = matched.route_name(), %key, %error, "cache read failed, treating as miss");
                None
            }
        };

        let body = payload.and_then(|payload| match self.inner.codec.decode(payload) {
            Ok(body) => Some(body),
            Err(error) => {
                warn!(route = matched.route_name(), %key, %error, "cached payload unreadable, treating as miss");
                None
            }
        });

        match body {
            Some(body) => {
                debug!(route = matched.route_name(), %key, "cache hit");
                let response = Response::new(StatusCode::Ok)
                    .body_bytes(body)
                    .header(CACHE_HEADER, fetch_hit(matched.route_name()));
                *state = RequestState::ServedFromCache { matched };
                Some(response)
            }
            None => {
                debug!(route = matched.route_name(), %key, "cache miss");
                *state = RequestState::PassThrough { matched, key };
                None
            }
        }
    }

    /// Response-finalized hook.
    ///
    /// Stores the response body for a `PassThrough` request and marks the response.
    /// Requests that never matched, and requests answered from the cache, are left alone.
    pub fn on_response_finalized(&self, state: &RequestState, response: &mut Response) -> StoreOutcome {
        let RequestState::PassThrough { matched, key } = state else {
            return StoreOutcome::Skipped;
        };
        let route = matched.route_name();
        response.add_header(CACHE_HEADER, fetch_miss(route));

        if let Some(filter) = &self.inner.store_filter {
            if !filter(&*response) {
                debug!(route, status = response.status().as_u16(), "response excluded from cache");
                return StoreOutcome::Skipped;
            }
        }

        let payload = match self.inner.codec.encode(response.content()) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(route, %key, %error, "failed to encode response for cache");
                return StoreOutcome::Failed;
            }
        };

        match self.inner.backend.set(key, payload) {
            Ok(()) => {
                debug!(route, %key, "response stored");
                response.add_header(CACHE_HEADER, storage_success(route));
                StoreOutcome::Committed
            }
            Err(error) => {
                warn!(route, %key, %error, "cache write failed");
                StoreOutcome::Failed
            }
        }
    }
}

impl fmt::Debug for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLayer")
            .field("routes", &self.inner.policies.len())
            .field("prefix", &self.inner.keys.prefix())
            .field("codec", &self.inner.codec)
            .field("store_filter", &self.inner.store_filter.is_some())
            .finish()
    }
}

impl Middleware for CacheLayer {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        let layer = self.clone();

        Box::pin(async move {
            let mut state = RequestState::Init;

            if let Some(mut cached) =
                layer.on_route_resolved(ctx.route(), ctx.request().method(), &mut state)
            {
                layer.on_response_finalized(&state, &mut cached);
                return cached;
            }

            let mut response = next.run(ctx).await;
            layer.on_response_finalized(&state, &mut response);
            response
        })
    }
}
