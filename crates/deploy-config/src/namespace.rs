use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A `role_name -> account_name` binding plus an optional compile-time profile, as declared
/// for a single namespace segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceRoles {
    #[serde(default)]
    pub roles: BTreeMap<String, String>,
    #[serde(default)]
    pub profile: Option<String>,
}

/// A named deployment environment (`default`, `production`, `production.ntt`, ...).
///
/// Dot-separated segments form a hierarchy: `production.ntt` inherits from `production`,
/// which inherits from `default`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// This namespace's ancestry, from `default` to `self` inclusive, in resolution order.
    ///
    /// `production.ntt` -> `["default", "production", "production.ntt"]`.
    pub fn ancestry(&self) -> Vec<String> {
        if self.0 == "default" {
            return vec!["default".to_string()];
        }

        let mut out = vec!["default".to_string()];
        let mut acc = String::new();
        for segment in self.0.split('.') {
            if !acc.is_empty() {
                acc.push('.');
            }
            acc.push_str(segment);
            out.push(acc.clone());
        }
        out
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestry_of_default_is_itself() {
        assert_eq!(Namespace::new("default").ancestry(), vec!["default"]);
    }

    #[test]
    fn ancestry_walks_each_dotted_segment() {
        assert_eq!(
            Namespace::new("production.ntt").ancestry(),
            vec!["default", "production", "production.ntt"]
        );
    }

    #[test]
    fn ancestry_of_single_segment() {
        assert_eq!(Namespace::new("staging").ancestry(), vec!["default", "staging"]);
    }
}
