//! Per-request context handed through the middleware pipeline.
//!
//! A [`Context`] is created once the router has resolved a request, so every
//! middleware sees the matched route name and its parameters alongside the request.

use std::collections::BTreeMap;

use crate::Request;
use crate::router::RouteMatch;

/// Route parameters captured by the router, ordered by name.
///
/// The ordering is part of the contract: cache keys are derived by walking the
/// parameters, and two requests with the same captures must walk them identically.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    map: BTreeMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites a parameter.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// `(name, value)` pairs in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Parameters
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A request together with the route it resolved to.
pub struct Context {
    request: Request,
    route: RouteMatch,
}

impl Context {
    pub fn new(request: Request, route: RouteMatch) -> Self {
        Self { request, route }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn route(&self) -> &RouteMatch {
        &self.route
    }

    /// Shorthand for `ctx.route().params()`.
    pub fn params(&self) -> &Parameters {
        self.route.params()
    }

    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_slice(self.request.body())
    }
}
