//! Error types for the caching layer.
//!
//! [`SetupError`] is fatal and only surfaces while the layer is being built.
//! [`BackendError`] and [`CodecError`] happen per request and are absorbed by the
//! coordinator: a failed read or decode is a miss, a failed write is logged.

use thiserror::Error;

/// Configuration-time failures. Any of these aborts construction of the layer.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cache must be configured")]
    Unconfigured,

    #[error("no service named `{name}` is registered")]
    UnknownService { name: String },

    #[error("service `{name}` is not a cache backend")]
    NotABackend { name: String },

    #[error("unknown cache adapter `{adapter}`")]
    UnknownAdapter { adapter: String },

    #[error("invalid options for cache adapter `{adapter}`: {source}")]
    InvalidOptions {
        adapter: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read cache configuration from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cache configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// A backend read or write failed.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("cache backend rejected write for key {key}")]
    Rejected { key: String },
}

/// A payload could not be transformed.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to compress payload: {0}")]
    Encode(#[source] std::io::Error),

    #[error("cannot decode cached payload: {0}")]
    Decode(#[source] std::io::Error),
}
