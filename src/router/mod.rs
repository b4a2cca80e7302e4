//! Named-route resolution.
//!
//! Every route registered with a [`Router`] carries a name (e.g. `"blog.show"`). Resolving
//! a request yields a [`RouteMatch`]: the route name plus the parameters captured from the
//! path. That match is what cache policies are keyed on, so two patterns may share a
//! handler while keeping distinct cache behavior.
//!
//! | Pattern              | Example match              | Captured params                  |
//! |----------------------|----------------------------|----------------------------------|
//! | `/blog`              | `/blog`                    | *(none)*                         |
//! | `/blog/:lang/:id`    | `/blog/en/5`               | `id → "5"`, `lang → "en"`        |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "/docs/readme.txt"`  |
//!
//! Trailing slashes are normalized on both patterns and paths. Routes are tried in
//! registration order; the first whose method and pattern match wins.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, Parameters};
use crate::{Method, Response};

/// Type-erased async route handler.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// The outcome of route resolution: which named route matched, with what parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    name: String,
    params: Parameters,
}

impl RouteMatch {
    pub fn new(name: impl Into<String>, params: Parameters) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
    // Prefix before the trailing `/*`.
    Wildcard(String),
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Pattern {
    /// Compiles a pattern string: `/*` suffix ⇒ wildcard, any `:` ⇒ parameterized,
    /// otherwise an exact path.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return Pattern::Wildcard(prefix.to_string());
        }

        if pattern.contains(':') {
            let segments = pattern
                .split('/')
                .filter(|s| !s.is_empty())
                .map(|s| match s.strip_prefix(':') {
                    Some(name) => Segment::Parameter(name.to_string()),
                    None => Segment::Static(s.to_string()),
                })
                .collect();
            return Pattern::Parameterized { segments };
        }

        Pattern::Exact(pattern.to_string())
    }

    fn matches(&self, path: &str) -> Option<Parameters> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(Parameters::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = Parameters::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => params.insert(name.as_str(), path_seg),
                    }
                }
                Some(params)
            }
            Pattern::Wildcard(prefix) => path
                .strip_prefix(prefix.as_str())
                // The prefix must end on a segment boundary.
                .filter(|suffix| suffix.is_empty() || suffix.starts_with('/'))
                .map(|suffix| {
                    let mut params = Parameters::new();
                    params.insert("wildcard", suffix);
                    params
                }),
        }
    }
}

struct Route {
    name: String,
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// A resolved route together with the handler that serves it.
pub struct Resolved {
    pub route: RouteMatch,
    pub handler: Handler,
}

/// Ordered table of named routes.
///
/// # Examples
///
/// ```rust
/// use rttp_cache::{Method, Response, StatusCode, router::Router};
///
/// let mut router = Router::new();
/// router.get("blog.show", "/blog/:id", |ctx| async move {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
///
/// let resolved = router.resolve(&Method::Get, "/blog/5").unwrap();
/// assert_eq!(resolved.route.name(), "blog.show");
/// assert_eq!(resolved.route.params().get("id"), Some("5"));
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name` for `method` requests matching `pattern`.
    pub fn route<H, F>(
        &mut self,
        method: Method,
        name: impl Into<String>,
        pattern: &str,
        handler: H,
    ) where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler: Handler = Arc::new(
            move |ctx: Context| -> Pin<Box<dyn Future<Output = Response> + Send>> {
                Box::pin(handler(ctx))
            },
        );
        self.routes.push(Route {
            name: name.into(),
            method,
            pattern: Pattern::parse(pattern),
            handler,
        });
    }

    pub fn get<H, F>(&mut self, name: impl Into<String>, pattern: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Get, name, pattern, handler);
    }

    pub fn post<H, F>(&mut self, name: impl Into<String>, pattern: &str, handler: H)
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.route(Method::Post, name, pattern, handler);
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Finds the first route matching `method` and `path`.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<Resolved> {
        self.routes
            .iter()
            .filter(|route| &route.method == method)
            .find_map(|route| {
                route.pattern.matches(path).map(|params| Resolved {
                    route: RouteMatch::new(route.name.clone(), params),
                    handler: Arc::clone(&route.handler),
                })
            })
    }
}
