//! HTTP route match rules
//!
//! A route is a path/method/header match. The method constraint is an
//! explicit three-way choice: the sampled policy data does not distinguish
//! "match any method" from "match no method" for an absent list, so callers
//! must state which they mean.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Method constraint on a route
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MethodMatch {
    /// Match every HTTP method
    Any,
    /// Match no method; the route is inert
    None,
    /// Match exactly the listed methods, in order
    Explicit(Vec<String>),
}

impl MethodMatch {
    /// Union of two constraints. Explicit lists are appended with duplicates
    /// removed, preserving first-seen order.
    pub fn union(self, other: MethodMatch) -> MethodMatch {
        match (self, other) {
            (MethodMatch::Any, _) | (_, MethodMatch::Any) => MethodMatch::Any,
            (MethodMatch::None, other) => other,
            (this, MethodMatch::None) => this,
            (MethodMatch::Explicit(mut a), MethodMatch::Explicit(b)) => {
                for m in b {
                    if !a.contains(&m) {
                        a.push(m);
                    }
                }
                MethodMatch::Explicit(a)
            }
        }
    }
}

/// An HTTP path/method/header match rule
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HttpRouteMatch {
    /// Regular expression the request path must match
    pub path_regex: String,
    /// Method constraint
    pub methods: MethodMatch,
    /// Header name to match value; the `host` pseudo-header carries the
    /// host constraint
    pub headers: BTreeMap<String, String>,
}

impl HttpRouteMatch {
    /// The zero-value route attached to a policy edge that carries no
    /// route-group reference: matches any path, any method, no header
    /// constraints.
    pub fn allow_any() -> Self {
        Self {
            path_regex: String::new(),
            methods: MethodMatch::Any,
            headers: BTreeMap::new(),
        }
    }

    pub fn new(path_regex: impl Into<String>, methods: MethodMatch) -> Self {
        Self {
            path_regex: path_regex.into(),
            methods,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_any_is_zero_value() {
        let route = HttpRouteMatch::allow_any();
        assert_eq!(route.path_regex, "");
        assert_eq!(route.methods, MethodMatch::Any);
        assert!(route.headers.is_empty());
    }

    #[test]
    fn test_union_any_dominates() {
        let got = MethodMatch::Explicit(vec!["GET".into()]).union(MethodMatch::Any);
        assert_eq!(got, MethodMatch::Any);
    }

    #[test]
    fn test_union_none_is_neutral() {
        let got = MethodMatch::None.union(MethodMatch::Explicit(vec!["PUT".into()]));
        assert_eq!(got, MethodMatch::Explicit(vec!["PUT".to_string()]));
        assert_eq!(MethodMatch::None.union(MethodMatch::None), MethodMatch::None);
    }

    #[test]
    fn test_union_explicit_dedupes_preserving_order() {
        let a = MethodMatch::Explicit(vec!["GET".into(), "POST".into()]);
        let b = MethodMatch::Explicit(vec!["POST".into(), "DELETE".into()]);
        assert_eq!(
            a.union(b),
            MethodMatch::Explicit(vec![
                "GET".to_string(),
                "POST".to_string(),
                "DELETE".to_string()
            ])
        );
    }
}
