//! Selective response caching.
//!
//! Routes opt in through policies keyed by route name. For a request whose resolved
//! route satisfies its policy, the [`CacheLayer`] looks the response up under a key
//! derived from the route name, policy, and route parameters; a hit is answered
//! directly, a miss runs the handler and stores what it returns.
//!
//! - [`policy`]: [`RoutePolicy`] and [`PolicyRegistry`].
//! - [`matcher`]: [`match_request`], producing a [`MatchResult`].
//! - [`key`]: [`KeyDeriver`].
//! - [`codec`]: optional zlib [`Codec`] for stored payloads.
//! - [`backend`]: the [`CacheBackend`] trait, built-in backends, and resolution.
//! - [`config`]: [`CacheConfig`] loading.
//! - [`layer`]: the [`CacheLayer`] coordinator and middleware.

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod layer;
pub mod matcher;
pub mod policy;

pub use backend::{
    BackendConfig, CacheBackend, InlineBackend, MemoryBackend, MemoryOptions, NullBackend,
    ServiceRegistry,
};
pub use codec::Codec;
pub use config::CacheConfig;
pub use error::{BackendError, CodecError, SetupError};
pub use key::{DEFAULT_PREFIX, KeyDeriver};
pub use layer::{CACHE_HEADER, CacheLayer, RequestState, StoreFilter, StoreOutcome};
pub use matcher::{MatchResult, match_request};
pub use policy::{ParamConstraint, PolicyRegistry, RoutePolicy};
