//! # rttp-cache
//!
//! Selective, policy-driven response caching for an async HTTP/1.1 server.
//!
//! Routes are named; a cache policy per route name decides which requests may be
//! answered from the cache. The [`cache::CacheLayer`] sits in the middleware pipeline,
//! serving hits before the handler runs and storing the handler's response on a miss.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use rttp_cache::cache::{CacheConfig, CacheLayer, ServiceRegistry};
//! use rttp_cache::router::Router;
//! use rttp_cache::{App, Response, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CacheConfig::from_json_str(r#"{
//!         "routes": { "blog.show": { "match_method": "GET" } },
//!         "cache": { "adapter": "memory", "options": { "ttl": 300 } }
//!     }"#)?;
//!     let cache = CacheLayer::from_config(&config, &ServiceRegistry::new())?;
//!
//!     let mut router = Router::new();
//!     router.get("blog.show", "/blog/:id", |ctx| async move {
//!         let id = ctx.params().get("id").unwrap_or_default().to_owned();
//!         Response::new(StatusCode::Ok).body(format!("post {id}"))
//!     });
//!
//!     let app = App::new(router).with(Arc::new(cache));
//!     Server::bind("127.0.0.1:8080").await?.serve(Arc::new(app)).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod cache;
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

pub use app::App;
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use server::{Server, ServerError};
