//! Evaluates a resolved route against the policy registry.

use std::sync::Arc;

use crate::Method;
use crate::context::Parameters;
use crate::router::RouteMatch;

use super::policy::{PolicyRegistry, RoutePolicy};

/// A request that is eligible for caching under its route's policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    route_name: String,
    policy: Arc<RoutePolicy>,
    parameters: Parameters,
}

impl MatchResult {
    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }
}

/// Returns `Some` when `route` has a policy and the request satisfies it.
///
/// Pure: consults only its arguments.
pub fn match_request(
    registry: &PolicyRegistry,
    route: &RouteMatch,
    method: &Method,
) -> Option<MatchResult> {
    let policy = registry.get(route.name())?;

    if let Some(methods) = policy.allowed_methods() {
        if !methods.contains(method.as_str()) {
            return None;
        }
    }

    if let Some(required) = policy.required_params() {
        let params = route.params();
        if !required
            .iter()
            .all(|(name, constraint)| constraint.admits(params.get(name)))
        {
            return None;
        }
    }

    Some(MatchResult {
        route_name: route.name().to_owned(),
        policy: Arc::clone(policy),
        parameters: route.params().clone(),
    })
}
