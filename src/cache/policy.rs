//! Route cache policies and the registry that holds them.
//!
//! A [`RoutePolicy`] says which requests to a named route may be cached: optionally
//! only some HTTP methods, optionally only some values of given route parameters.
//! Policies deserialize from the `routes` section of the cache configuration:
//!
//! ```json
//! {
//!   "blog.show": { "match_method": ["GET", "HEAD"], "match_route_params": { "lang": ["en", "fr"] } },
//!   "home": {}
//! }
//! ```
//!
//! Both `match_method` and each `match_route_params` value accept a single string or a
//! list of strings.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

/// A required value for one route parameter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ParamConstraint {
    /// The parameter must equal this literal.
    Exact(String),
    /// The parameter must be one of these values.
    AnyOf(BTreeSet<String>),
}

impl ParamConstraint {
    /// Missing parameters satisfy no constraint.
    pub fn admits(&self, value: Option<&str>) -> bool {
        match (self, value) {
            (Self::Exact(expected), Some(value)) => expected == value,
            (Self::AnyOf(allowed), Some(value)) => allowed.contains(value),
            (_, None) => false,
        }
    }
}

/// Cache eligibility rules for one route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RoutePolicy {
    #[serde(
        default,
        rename = "match_method",
        deserialize_with = "deserialize_methods"
    )]
    allowed_methods: Option<BTreeSet<String>>,

    #[serde(default, rename = "match_route_params")]
    required_params: Option<BTreeMap<String, ParamConstraint>>,
}

impl RoutePolicy {
    /// A policy that caches every request to its route.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts caching to the given methods, compared verbatim against the request.
    #[must_use]
    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_methods = Some(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Requires route parameter `name` to satisfy `constraint`.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, constraint: ParamConstraint) -> Self {
        self.required_params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), constraint);
        self
    }

    pub fn allowed_methods(&self) -> Option<&BTreeSet<String>> {
        self.allowed_methods.as_ref()
    }

    pub fn required_params(&self) -> Option<&BTreeMap<String, ParamConstraint>> {
        self.required_params.as_ref()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(BTreeSet<String>),
}

fn deserialize_methods<'de, D>(deserializer: D) -> Result<Option<BTreeSet<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|methods| match methods {
            OneOrMany::One(method) => BTreeSet::from([method]),
            OneOrMany::Many(methods) => methods,
        }),
    )
}

/// Policies keyed by route name. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Arc<RoutePolicy>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>, policy: RoutePolicy) -> Self {
        self.policies.insert(route.into(), Arc::new(policy));
        self
    }

    pub fn get(&self, route: &str) -> Option<&Arc<RoutePolicy>> {
        self.policies.get(route)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl FromIterator<(String, RoutePolicy)> for PolicyRegistry {
    fn from_iter<I: IntoIterator<Item = (String, RoutePolicy)>>(iter: I) -> Self {
        Self {
            policies: iter
                .into_iter()
                .map(|(route, policy)| (route, Arc::new(policy)))
                .collect(),
        }
    }
}
