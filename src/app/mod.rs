//! Application assembly: router plus middleware stack.
//!
//! [`App::handle`] is the request lifecycle. The router resolves the request first
//! (unresolved requests get `404` without entering the pipeline), then the resolved
//! [`Context`] flows through every middleware in registration order, ending at the
//! route's handler. Whatever comes back up the chain is the finalized response.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::router::{Handler, Router};
use crate::{Request, Response, StatusCode};

/// A router with an ordered middleware stack in front of it.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use rttp_cache::{App, Response, StatusCode, middleware::LoggerMiddleware, router::Router};
///
/// let mut router = Router::new();
/// router.get("home", "/", |_ctx| async { Response::new(StatusCode::Ok).body("hi") });
///
/// let app = App::new(router).with(Arc::new(LoggerMiddleware));
/// # let _ = app;
/// ```
pub struct App {
    router: Router,
    middlewares: Vec<MiddlewareHandler>,
}

impl App {
    pub fn new(router: Router) -> Self {
        Self {
            router,
            middlewares: Vec::new(),
        }
    }

    /// Appends a middleware; earlier middleware wraps later ones.
    #[must_use]
    pub fn with<M>(mut self, middleware: Arc<M>) -> Self
    where
        M: Middleware + 'static,
    {
        self.middlewares.push(from_middleware(middleware));
        self
    }

    /// Runs one request through resolution, the middleware stack, and its handler.
    pub async fn handle(&self, request: Request) -> Response {
        let Some(resolved) = self.router.resolve(request.method(), request.path()) else {
            tracing::debug!(method = %request.method(), path = %request.path(), "no route");
            return Response::new(StatusCode::NotFound);
        };

        let mut chain = self.middlewares.clone();
        chain.push(terminal(resolved.handler));

        let ctx = Context::new(request, resolved.route);
        Next::new(chain).run(ctx).await
    }
}

// Adapts a route handler into the innermost pipeline stage.
fn terminal(handler: Handler) -> MiddlewareHandler {
    Arc::new(
        move |ctx: Context, _next: Next| -> Pin<Box<dyn Future<Output = Response> + Send>> {
            handler(ctx)
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(raw: &str) -> Request {
        Request::parse(raw.as_bytes()).unwrap().0
    }

    #[tokio::test]
    async fn unresolved_request_is_404() {
        let app = App::new(Router::new());
        let res = app.handle(request("GET / HTTP/1.1\r\nHost: a\r\n\r\n")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn handler_sees_route_params() {
        let mut router = Router::new();
        router.get("blog.show", "/blog/:id", |ctx: Context| async move {
            let body = format!("{}:{}", ctx.route().name(), ctx.params().get("id").unwrap_or(""));
            Response::new(StatusCode::Ok).body(body)
        });
        let app = App::new(router);

        let res = app
            .handle(request("GET /blog/5 HTTP/1.1\r\nHost: a\r\n\r\n"))
            .await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.content().as_ref(), b"blog.show:5");
    }
}
