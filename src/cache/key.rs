//! Cache key derivation.
//!
//! A [`MatchResult`] is first written into a canonical byte string, then hashed with
//! SHA-256 and prefixed with the configured namespace. The canonical form (`v1`) is:
//!
//! ```text
//! "rttp-cache/v1"
//! 'r' <route name>
//! 'm' <method>*              (only when the policy restricts methods, sorted)
//! 'c' <name> ('=' <value> | '{' <value>* '}')*   (only when params are constrained, sorted)
//! 'p' (<name> <value>)*      (route parameters, sorted by name)
//! ```
//!
//! where every string is written as `<decimal length> ':' <bytes>`. Length prefixes
//! keep distinct inputs from colliding on the same bytes.

use sha2::{Digest, Sha256};

use super::matcher::MatchResult;
use super::policy::{ParamConstraint, RoutePolicy};

/// Namespace prepended to every key unless configured otherwise.
pub const DEFAULT_PREFIX: &str = "slm_cache_";

const CANONICAL_VERSION: &[u8] = b"rttp-cache/v1";

/// Turns match results into backend keys.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
    prefix: String,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl KeyDeriver {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `prefix` followed by the lowercase hex SHA-256 of the canonical encoding.
    pub fn derive(&self, matched: &MatchResult) -> String {
        let digest = Sha256::digest(canonical_bytes(matched));
        format!("{}{}", self.prefix, hex::encode(digest))
    }
}

fn put_str(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.len().to_string().as_bytes());
    buf.push(b':');
    buf.extend_from_slice(value.as_bytes());
}

fn put_policy(buf: &mut Vec<u8>, policy: &RoutePolicy) {
    if let Some(methods) = policy.allowed_methods() {
        buf.push(b'm');
        put_str(buf, &methods.len().to_string());
        for method in methods {
            put_str(buf, method);
        }
    }

    if let Some(required) = policy.required_params() {
        buf.push(b'c');
        put_str(buf, &required.len().to_string());
        for (name, constraint) in required {
            put_str(buf, name);
            match constraint {
                ParamConstraint::Exact(value) => {
                    buf.push(b'=');
                    put_str(buf, value);
                }
                ParamConstraint::AnyOf(values) => {
                    buf.push(b'{');
                    for value in values {
                        put_str(buf, value);
                    }
                    buf.push(b'}');
                }
            }
        }
    }
}

/// The versioned canonical encoding hashed by [`KeyDeriver::derive`].
///
/// Sets and maps are `BTreeSet`/`BTreeMap`, so walking them is already sorted.
pub fn canonical_bytes(matched: &MatchResult) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    buf.extend_from_slice(CANONICAL_VERSION);

    buf.push(b'r');
    put_str(&mut buf, matched.route_name());

    put_policy(&mut buf, matched.policy());

    buf.push(b'p');
    put_str(&mut buf, &matched.parameters().len().to_string());
    for (name, value) in matched.parameters().iter() {
        put_str(&mut buf, name);
        put_str(&mut buf, value);
    }

    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;
    use crate::cache::matcher::match_request;
    use crate::cache::policy::PolicyRegistry;
    use crate::context::Parameters;
    use crate::router::RouteMatch;

    fn matched(registry: &PolicyRegistry, name: &str, params: Parameters) -> MatchResult {
        match_request(registry, &RouteMatch::new(name, params), &Method::Get).unwrap()
    }

    fn registry() -> PolicyRegistry {
        PolicyRegistry::new()
            .with_route("blog.show", RoutePolicy::new().methods(["GET"]))
            .with_route("blog.list", RoutePolicy::new().methods(["GET"]))
    }

    #[test]
    fn key_is_prefixed_sha256_hex() {
        let registry = registry();
        let key = KeyDeriver::default().derive(&matched(
            &registry,
            "blog.show",
            [("id", "5")].into_iter().collect(),
        ));

        let digest = key.strip_prefix(DEFAULT_PREFIX).unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn derivation_is_deterministic_and_order_independent() {
        let registry = registry();
        let deriver = KeyDeriver::new("app_");
        let a = matched(
            &registry,
            "blog.show",
            [("id", "5"), ("lang", "en")].into_iter().collect(),
        );
        let b = matched(
            &registry,
            "blog.show",
            [("lang", "en"), ("id", "5")].into_iter().collect(),
        );

        assert_eq!(deriver.derive(&a), deriver.derive(&a));
        assert_eq!(deriver.derive(&a), deriver.derive(&b));
        assert!(deriver.derive(&a).starts_with("app_"));
    }

    #[test]
    fn distinct_inputs_give_distinct_keys() {
        let registry = registry();
        let deriver = KeyDeriver::default();
        let five = matched(&registry, "blog.show", [("id", "5")].into_iter().collect());
        let six = matched(&registry, "blog.show", [("id", "6")].into_iter().collect());
        let list = matched(&registry, "blog.list", [("id", "5")].into_iter().collect());

        assert_ne!(deriver.derive(&five), deriver.derive(&six));
        assert_ne!(deriver.derive(&five), deriver.derive(&list));
    }

    #[test]
    fn length_prefixes_prevent_boundary_collisions() {
        let registry = registry();
        let split_a = matched(
            &registry,
            "blog.show",
            [("a", "bc")].into_iter().collect(),
        );
        let split_b = matched(
            &registry,
            "blog.show",
            [("ab", "c")].into_iter().collect(),
        );
        assert_ne!(canonical_bytes(&split_a), canonical_bytes(&split_b));
    }

    #[test]
    fn policy_contributes_to_key() {
        let params: Parameters = [("id", "5")].into_iter().collect();
        let get_only = PolicyRegistry::new().with_route("r", RoutePolicy::new().methods(["GET"]));
        let open = PolicyRegistry::new().with_route("r", RoutePolicy::new());

        let deriver = KeyDeriver::default();
        assert_ne!(
            deriver.derive(&matched(&get_only, "r", params.clone())),
            deriver.derive(&matched(&open, "r", params))
        );
    }
}
