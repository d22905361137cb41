use std::collections::{BTreeMap, HashMap, HashSet};

use thiserror::Error;
use tracing::trace;

use crate::account::Account;
use crate::namespace::{Namespace, NamespaceRoles};

/// Errors surfaced while resolving namespace/account/role bindings. Resolution happens before
/// any child process is spawned, so these errors are always fail-fast with no partial effects.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("namespace `{0}` does not bind role `{1}`")]
    UnboundRole(String, String),
    #[error("role `{0}` is bound to unknown account `{1}`")]
    UnknownAccount(String, String),
    #[error("account reference cycle detected starting at `{0}`")]
    ReferenceCycle(String),
    #[error("account `{0}` references unknown account `{1}`")]
    DanglingReference(String, String),
}

/// Roles bound to accounts for one namespace, along with the inherited compile-time profile.
#[derive(Debug)]
pub struct ResolvedAccounts<'a> {
    pub roles: BTreeMap<String, &'a Account>,
    pub profile: Option<String>,
}

/// Resolves namespace role bindings against an in-memory account map.
///
/// Holds borrowed references rather than owning the maps: the caller loads namespace/account
/// configuration (an external collaborator) and hands both to the resolver for the lifetime of
/// one planning pass.
pub struct Resolver<'a> {
    namespaces: &'a HashMap<String, NamespaceRoles>,
    accounts: &'a HashMap<String, Account>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        namespaces: &'a HashMap<String, NamespaceRoles>,
        accounts: &'a HashMap<String, Account>,
    ) -> Self {
        Self { namespaces, accounts }
    }

    /// Validates that every `AccountRef` resolves to a defined account and that no reference
    /// cycle exists. Intended to run once, at configuration load time.
    pub fn validate_accounts(&self) -> Result<(), ConfigError> {
        for name in self.accounts.keys() {
            self.walk_refs(name, &mut HashSet::new())?;
        }
        Ok(())
    }

    fn walk_refs(&self, name: &str, seen: &mut HashSet<String>) -> Result<(), ConfigError> {
        if !seen.insert(name.to_string()) {
            return Err(ConfigError::ReferenceCycle(name.to_string()));
        }
        if let Some(account) = self.accounts.get(name) {
            if let Some(dep) = account.dependency() {
                if !self.accounts.contains_key(dep) {
                    return Err(ConfigError::DanglingReference(name.to_string(), dep.clone()));
                }
                self.walk_refs(dep, seen)?;
            }
        }
        Ok(())
    }

    /// Role -> account-name bindings in scope for `namespace`, walking `default -> ... ->
    /// namespace` with child entries overriding parent entries key-by-key. The profile
    /// propagates down the chain until a descendant overrides it.
    pub fn resolve_roles(&self, namespace: &Namespace) -> (BTreeMap<String, String>, Option<String>) {
        let mut roles = BTreeMap::new();
        let mut profile = None;
        for ancestor in namespace.ancestry() {
            let Some(ns) = self.namespaces.get(&ancestor) else { continue };
            for (role, account) in &ns.roles {
                roles.insert(role.clone(), account.clone());
            }
            if ns.profile.is_some() {
                profile = ns.profile.clone();
            }
        }
        trace!(target: "deploy_config", namespace = %namespace, roles = roles.len(), "resolved namespace roles");
        (roles, profile)
    }

    /// Looks up an account by name, independent of any namespace/role binding. Used by callers
    /// that need to walk reference chains (Safe signers, governor proposers) by account name
    /// rather than by role.
    pub fn account(&self, name: &str) -> Option<&'a Account> {
        self.accounts.get(name)
    }

    /// Materializes the given roles against `namespace`'s bindings, failing if any role is
    /// unbound or points at an unknown account.
    pub fn resolve<'b>(
        &'a self,
        namespace: &Namespace,
        roles_needed: impl IntoIterator<Item = &'b str>,
    ) -> Result<ResolvedAccounts<'a>, ConfigError> {
        let (bound, profile) = self.resolve_roles(namespace);
        let mut roles = BTreeMap::new();
        for role in roles_needed {
            let account_name = bound
                .get(role)
                .ok_or_else(|| ConfigError::UnboundRole(namespace.as_str().to_string(), role.to_string()))?;
            let account = self.accounts.get(account_name).ok_or_else(|| {
                ConfigError::UnknownAccount(role.to_string(), account_name.clone())
            })?;
            roles.insert(role.to_string(), account);
        }
        Ok(ResolvedAccounts { roles, profile })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;

    fn namespaces() -> HashMap<String, NamespaceRoles> {
        HashMap::from([
            (
                "default".to_string(),
                NamespaceRoles {
                    roles: BTreeMap::from([("deployer".to_string(), "dev-key".to_string())]),
                    profile: Some("default".to_string()),
                },
            ),
            (
                "production".to_string(),
                NamespaceRoles {
                    roles: BTreeMap::from([("deployer".to_string(), "prod-safe".to_string())]),
                    profile: Some("release".to_string()),
                },
            ),
        ])
    }

    fn accounts() -> HashMap<String, Account> {
        HashMap::from([
            (
                "dev-key".to_string(),
                Account::PrivateKey { secret: "0x01".to_string() },
            ),
            (
                "prod-safe".to_string(),
                Account::Safe {
                    safe_address: Default::default(),
                    signer: "dev-key".to_string(),
                },
            ),
        ])
    }

    #[test]
    fn child_namespace_overrides_parent_role() {
        let namespaces = namespaces();
        let accounts = accounts();
        let resolver = Resolver::new(&namespaces, &accounts);
        let (roles, profile) = resolver.resolve_roles(&Namespace::new("production"));
        assert_eq!(roles.get("deployer"), Some(&"prod-safe".to_string()));
        assert_eq!(profile, Some("release".to_string()));
    }

    #[test]
    fn unrelated_namespace_falls_back_to_default() {
        let namespaces = namespaces();
        let accounts = accounts();
        let resolver = Resolver::new(&namespaces, &accounts);
        let (roles, profile) = resolver.resolve_roles(&Namespace::new("staging"));
        assert_eq!(roles.get("deployer"), Some(&"dev-key".to_string()));
        assert_eq!(profile, Some("default".to_string()));
    }

    #[test]
    fn unbound_role_is_an_error() {
        let namespaces = namespaces();
        let accounts = accounts();
        let resolver = Resolver::new(&namespaces, &accounts);
        let err = resolver.resolve(&Namespace::new("default"), ["admin"]).unwrap_err();
        assert_eq!(err, ConfigError::UnboundRole("default".to_string(), "admin".to_string()));
    }

    #[test]
    fn cycle_is_rejected() {
        let accounts = HashMap::from([
            ("a".to_string(), Account::Safe { safe_address: Default::default(), signer: "b".to_string() }),
            ("b".to_string(), Account::Safe { safe_address: Default::default(), signer: "a".to_string() }),
        ]);
        let namespaces = HashMap::new();
        let resolver = Resolver::new(&namespaces, &accounts);
        assert!(resolver.validate_accounts().is_err());
    }

    #[test]
    fn dangling_reference_is_rejected() {
        let accounts = HashMap::from([(
            "a".to_string(),
            Account::Safe { safe_address: Default::default(), signer: "ghost".to_string() },
        )]);
        let namespaces = HashMap::new();
        let resolver = Resolver::new(&namespaces, &accounts);
        assert_eq!(
            resolver.validate_accounts(),
            Err(ConfigError::DanglingReference("a".to_string(), "ghost".to_string()))
        );
    }
}
