//! End-to-end behavior of the cache layer inside an `App` pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use rttp_cache::cache::{
    BackendError, CACHE_HEADER, CacheBackend, CacheConfig, CacheLayer, MemoryBackend,
    ServiceRegistry, SetupError,
};
use rttp_cache::context::Context;
use rttp_cache::middleware::LoggerMiddleware;
use rttp_cache::router::Router;
use rttp_cache::{App, Request, Response, StatusCode};

/// Memory backend that counts reads and writes.
#[derive(Default)]
struct CountingBackend {
    store: MemoryBackend,
    gets: AtomicUsize,
    sets: AtomicUsize,
    last_key: Mutex<Option<String>>,
}

impl CacheBackend for CountingBackend {
    fn get(&self, key: &str) -> Result<Option<Bytes>, BackendError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.store.get(key)
    }

    fn set(&self, key: &str, payload: Bytes) -> Result<(), BackendError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        *self.last_key.lock().unwrap() = Some(key.to_owned());
        self.store.set(key, payload)
    }
}

struct Fixture {
    app: App,
    backend: Arc<CountingBackend>,
    handler_calls: Arc<AtomicUsize>,
}

fn fixture(config_json: &str) -> Fixture {
    let backend = Arc::new(CountingBackend::default());
    let mut services = ServiceRegistry::new();
    services.insert_backend("page-cache", backend.clone());

    let config = CacheConfig::from_json_str(config_json).unwrap();
    let cache = CacheLayer::from_config(&config, &services).unwrap();

    let handler_calls = Arc::new(AtomicUsize::new(0));
    let calls = Arc::clone(&handler_calls);

    let mut router = Router::new();
    router.get("blog.show", "/blog/:lang/:id", move |ctx: Context| {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            let lang = ctx.params().get("lang").unwrap_or_default().to_owned();
            let id = ctx.params().get("id").unwrap_or_default().to_owned();
            Response::new(StatusCode::Ok).body(format!("post {id} ({lang}) render #{n}"))
        }
    });
    router.post("blog.update", "/blog/:lang/:id", |_ctx: Context| async {
        Response::new(StatusCode::Accepted).body("updated")
    });
    router.get("home", "/", |_ctx: Context| async {
        Response::new(StatusCode::Ok).body("home")
    });

    let app = App::new(router)
        .with(Arc::new(LoggerMiddleware))
        .with(Arc::new(cache));

    Fixture {
        app,
        backend,
        handler_calls,
    }
}

const BLOG_CONFIG: &str = r#"{
    "routes": { "blog.show": { "match_method": "GET" } },
    "cache": "page-cache"
}"#;

fn request(method: &str, path: &str) -> Request {
    let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
    Request::parse(raw.as_bytes()).unwrap().0
}

fn cache_headers(response: &Response) -> Vec<&str> {
    response.headers().get_all(CACHE_HEADER).collect()
}

#[tokio::test]
async fn miss_stores_then_hit_serves_identical_body() {
    let f = fixture(BLOG_CONFIG);

    let first = f.app.handle(request("GET", "/blog/en/5")).await;
    assert_eq!(first.status(), StatusCode::Ok);
    assert_eq!(
        cache_headers(&first),
        vec![
            "Fetch: Miss; route=blog.show",
            "Storage: Success; route=blog.show"
        ]
    );
    assert_eq!(f.backend.sets.load(Ordering::SeqCst), 1);

    let second = f.app.handle(request("GET", "/blog/en/5")).await;
    assert_eq!(cache_headers(&second), vec!["Fetch: Hit; route=blog.show"]);
    assert_eq!(second.content(), first.content());
    assert_eq!(f.handler_calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.backend.sets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_parameters_are_cached_separately() {
    let f = fixture(BLOG_CONFIG);

    f.app.handle(request("GET", "/blog/en/5")).await;
    let other = f.app.handle(request("GET", "/blog/en/6")).await;

    assert_eq!(cache_headers(&other)[0], "Fetch: Miss; route=blog.show");
    assert_eq!(f.handler_calls.load(Ordering::SeqCst), 2);
    assert_eq!(f.backend.sets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn routes_without_policy_bypass_cache() {
    let f = fixture(BLOG_CONFIG);

    let home = f.app.handle(request("GET", "/")).await;
    assert_eq!(home.content().as_ref(), b"home");
    assert!(cache_headers(&home).is_empty());

    let update = f.app.handle(request("POST", "/blog/en/5")).await;
    assert_eq!(update.status(), StatusCode::Accepted);
    assert!(cache_headers(&update).is_empty());

    assert_eq!(f.backend.gets.load(Ordering::SeqCst), 0);
    assert_eq!(f.backend.sets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn param_constraints_select_cacheable_requests() {
    let f = fixture(
        r#"{
            "routes": { "blog.show": { "match_route_params": { "lang": ["en", "fr"] } } },
            "cache": "page-cache"
        }"#,
    );

    let german = f.app.handle(request("GET", "/blog/de/5")).await;
    assert!(cache_headers(&german).is_empty());

    let french = f.app.handle(request("GET", "/blog/fr/5")).await;
    assert_eq!(cache_headers(&french)[0], "Fetch: Miss; route=blog.show");
}

#[tokio::test]
async fn compressed_entries_serve_uncompressed_body() {
    let f = fixture(
        r#"{
            "routes": { "blog.show": {} },
            "cache": "page-cache",
            "use_compression": true
        }"#,
    );

    let first = f.app.handle(request("GET", "/blog/en/7")).await;
    let second = f.app.handle(request("GET", "/blog/en/7")).await;

    assert_eq!(cache_headers(&second), vec!["Fetch: Hit; route=blog.show"]);
    assert_eq!(second.content(), first.content());
}

#[tokio::test]
async fn corrupt_entry_falls_back_to_handler() {
    let f = fixture(
        r#"{
            "routes": { "blog.show": {} },
            "cache": "page-cache",
            "use_compression": true
        }"#,
    );

    f.app.handle(request("GET", "/blog/en/8")).await;
    // Replace the stored entry with something that is not a zlib stream.
    let key = f.backend.last_key.lock().unwrap().clone().unwrap();
    f.backend
        .store
        .set(&key, Bytes::from_static(b"garbage"))
        .unwrap();

    let response = f.app.handle(request("GET", "/blog/en/8")).await;
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(cache_headers(&response)[0], "Fetch: Miss; route=blog.show");
    assert_eq!(f.handler_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn setup_fails_without_backend() {
    let config = CacheConfig::from_json_str(r#"{ "routes": { "home": {} } }"#).unwrap();
    let err = CacheLayer::from_config(&config, &ServiceRegistry::new()).unwrap_err();
    assert!(matches!(err, SetupError::Unconfigured));
}

#[test]
fn setup_fails_for_non_backend_service() {
    let mut services = ServiceRegistry::new();
    services.insert("page-cache", 42_u32);
    let config = CacheConfig::from_json_str(r#"{ "cache": "page-cache" }"#).unwrap();

    let err = CacheLayer::from_config(&config, &services).unwrap_err();
    assert!(matches!(err, SetupError::NotABackend { .. }));
}
