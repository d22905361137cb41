use std::collections::BTreeMap;

use alloy_primitives::Address;
use deploy_config::{Account, ConfigError, Namespace, Resolver};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::{identity, magic, sender};
use crate::sender::SenderInitConfig;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("hardware wallet policy conflict: {0}")]
    HwConflict(String),
    #[error("invalid sender name `{0}`: must match [A-Za-z_][A-Za-z0-9_]*")]
    InvalidSenderName(String),
    #[error("invalid private key for account `{0}`: {1}")]
    InvalidPrivateKey(String, #[source] identity::KeyError),
    #[error(transparent)]
    Abi(#[from] sender::AbiError),
}

/// Flags the [`crate::Planner`] derives for the engine's own CLI invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionFlags {
    pub use_ledger: bool,
    pub use_trezor: bool,
    pub derivation_paths: Vec<String>,
}

/// The resolved, ABI-encodable execution plan for one script run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderPlan {
    pub configs: Vec<SenderInitConfig>,
    pub flags: ExecutionFlags,
}

fn sender_name_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Parses the comma-separated `@custom:senders` devdoc tag into role identifiers. An
/// empty or missing tag yields an empty plan.
pub fn parse_custom_senders(devdoc_tag: Option<&str>) -> Result<Vec<String>, PlanError> {
    let Some(tag) = devdoc_tag else { return Ok(Vec::new()) };
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    trimmed
        .split(',')
        .map(|s| s.trim().to_string())
        .map(|s| {
            if sender_name_pattern().is_match(&s) {
                Ok(s)
            } else {
                Err(PlanError::InvalidSenderName(s))
            }
        })
        .collect()
}

/// Resolves a script's declared signer roles into an ABI-encodable [`SenderPlan`].
pub struct Planner<'a> {
    resolver: &'a Resolver<'a>,
}

impl<'a> Planner<'a> {
    pub fn new(resolver: &'a Resolver<'a>) -> Self {
        Self { resolver }
    }

    /// Builds the plan for `namespace` from the script's declared `senders` role list.
    pub fn plan(&self, namespace: &Namespace, senders: &[String]) -> Result<SenderPlan, PlanError> {
        if senders.is_empty() {
            debug!(target: "deploy_wallets", "no senders declared, emitting empty plan");
            return Ok(SenderPlan::default());
        }

        let (bound, _profile) = self.resolver.resolve_roles(namespace);
        let mut direct: BTreeMap<String, &Account> = BTreeMap::new();
        for role in senders {
            let account_name = bound
                .get(role)
                .ok_or_else(|| ConfigError::UnboundRole(namespace.as_str().to_string(), role.clone()))?;
            let account = self.resolver.account(account_name).ok_or_else(|| {
                ConfigError::UnknownAccount(role.clone(), account_name.clone())
            })?;
            direct.insert(account_name.clone(), account);
        }

        let referenced = self.transitive_referenced(&direct);

        self.check_hw_policy(&direct, &referenced)?;

        // Safe/Governor-referenced accounts are encoded first (sorted), then direct senders
        // (sorted), deduplicated across both sets.
        let mut ordered_names: Vec<String> = referenced.keys().cloned().collect();
        ordered_names.sort();
        let mut direct_names: Vec<String> = direct.keys().cloned().collect();
        direct_names.sort();
        for name in direct_names {
            if !ordered_names.contains(&name) {
                ordered_names.push(name);
            }
        }

        let mut all_accounts: BTreeMap<String, &Account> = referenced;
        all_accounts.extend(direct.iter().map(|(k, v)| (k.clone(), *v)));

        let mut configs = Vec::with_capacity(ordered_names.len());
        let mut derivation_paths = Vec::new();
        let mut use_ledger = false;
        let mut use_trezor = false;

        for name in &ordered_names {
            let account = all_accounts.get(name).expect("name came from all_accounts keys");
            let config = self.encode_account(name, account)?;
            if account.is_ledger() {
                use_ledger = true;
            }
            if account.is_trezor() {
                use_trezor = true;
            }
            if let Account::Ledger { derivation_path, .. } | Account::Trezor { derivation_path, .. } = account {
                derivation_paths.push(derivation_path.clone());
            }
            configs.push(config);
        }

        Ok(SenderPlan {
            configs,
            flags: ExecutionFlags { use_ledger, use_trezor, derivation_paths },
        })
    }

    /// Collects Safe signers and governor proposers transitively reachable from the direct
    /// sender set. Reference cycles are assumed to have already been rejected by
    /// `Resolver::validate_accounts` at configuration load time.
    fn transitive_referenced(&self, direct: &BTreeMap<String, &Account>) -> BTreeMap<String, &'a Account> {
        let mut referenced: BTreeMap<String, &Account> = BTreeMap::new();
        let mut frontier: Vec<&Account> = direct.values().copied().collect();
        while let Some(account) = frontier.pop() {
            if let Some(dep_name) = account.dependency() {
                if referenced.contains_key(dep_name) {
                    continue;
                }
                if let Some(dep_account) = self.resolver.account(dep_name) {
                    referenced.insert(dep_name.clone(), dep_account);
                    frontier.push(dep_account);
                }
            }
        }
        referenced
    }

    fn check_hw_policy(
        &self,
        direct: &BTreeMap<String, &Account>,
        referenced: &BTreeMap<String, &Account>,
    ) -> Result<(), PlanError> {
        let direct_ledger = direct.values().any(|a| a.is_ledger());
        let direct_trezor = direct.values().any(|a| a.is_trezor());
        if direct_ledger && direct_trezor {
            return Err(PlanError::HwConflict(
                "both a Ledger and a Trezor are used as direct senders".to_string(),
            ));
        }

        let referenced_ledger = referenced.values().any(|a| a.is_ledger());
        let referenced_trezor = referenced.values().any(|a| a.is_trezor());
        if direct_ledger && referenced_ledger {
            return Err(PlanError::HwConflict(
                "a Ledger is used both as a direct sender and as a Safe/Governor signer".to_string(),
            ));
        }
        if direct_trezor && referenced_trezor {
            return Err(PlanError::HwConflict(
                "a Trezor is used both as a direct sender and as a Safe/Governor signer".to_string(),
            ));
        }
        Ok(())
    }

    fn encode_account(&self, name: &str, account: &Account) -> Result<SenderInitConfig, PlanError> {
        let sender_type = magic::tag_for(account);
        let (account_address, config, can_broadcast) = match account {
            Account::PrivateKey { secret } => {
                let address = identity::derive_address(secret)
                    .map_err(|e| PlanError::InvalidPrivateKey(name.to_string(), e))?;
                let scalar = identity::secret_to_scalar(secret)
                    .map_err(|e| PlanError::InvalidPrivateKey(name.to_string(), e))?;
                (address, sender::encode_u256(scalar), true)
            }
            Account::Safe { safe_address, signer } => {
                (*safe_address, sender::encode_string(signer), false)
            }
            Account::Ledger { address, derivation_path } | Account::Trezor { address, derivation_path } => {
                (*address, sender::encode_string(derivation_path), true)
            }
            Account::OzGovernor { governor_address, timelock_address, proposer } => {
                let timelock = timelock_address.unwrap_or(Address::ZERO);
                (
                    timelock_address.unwrap_or(*governor_address),
                    sender::encode_governor(*governor_address, timelock, proposer),
                    false,
                )
            }
        };

        Ok(SenderInitConfig {
            name: name.to_string(),
            account: account_address,
            sender_type,
            can_broadcast,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn namespaces() -> HashMap<String, deploy_config::NamespaceRoles> {
        HashMap::from([(
            "default".to_string(),
            deploy_config::NamespaceRoles {
                roles: BTreeMap::from([("deployer".to_string(), "dev-key".to_string())]),
                profile: None,
            },
        )])
    }

    fn accounts() -> HashMap<String, Account> {
        HashMap::from([(
            "dev-key".to_string(),
            Account::PrivateKey {
                secret: "0x0000000000000000000000000000000000000000000000000000000000000001".to_string(),
            },
        )])
    }

    #[test]
    fn missing_senders_tag_yields_empty_plan() {
        assert!(parse_custom_senders(None).unwrap().is_empty());
        assert!(parse_custom_senders(Some("")).unwrap().is_empty());
    }

    #[test]
    fn rejects_malformed_sender_name() {
        assert!(parse_custom_senders(Some("deployer, 1bad")).is_err());
    }

    #[test]
    fn parses_comma_separated_senders() {
        assert_eq!(
            parse_custom_senders(Some("deployer, admin")).unwrap(),
            vec!["deployer".to_string(), "admin".to_string()]
        );
    }

    #[test]
    fn empty_senders_list_short_circuits() {
        let namespaces = namespaces();
        let accounts = accounts();
        let resolver = Resolver::new(&namespaces, &accounts);
        let planner = Planner::new(&resolver);
        let plan = planner.plan(&Namespace::new("default"), &[]).unwrap();
        assert!(plan.configs.is_empty());
    }

    #[test]
    fn single_private_key_sender_is_broadcastable() {
        let namespaces = namespaces();
        let accounts = accounts();
        let resolver = Resolver::new(&namespaces, &accounts);
        let planner = Planner::new(&resolver);
        let plan = planner
            .plan(&Namespace::new("default"), &["deployer".to_string()])
            .unwrap();
        assert_eq!(plan.configs.len(), 1);
        assert!(plan.configs[0].can_broadcast);
        assert!(!plan.flags.use_ledger);
        assert!(!plan.flags.use_trezor);
    }

    #[test]
    fn conflicting_direct_hardware_wallets_are_rejected() {
        let namespaces = HashMap::from([(
            "default".to_string(),
            deploy_config::NamespaceRoles {
                roles: BTreeMap::from([
                    ("admin".to_string(), "ledger-acct".to_string()),
                    ("deployer".to_string(), "trezor-acct".to_string()),
                ]),
                profile: None,
            },
        )]);
        let accounts = HashMap::from([
            (
                "ledger-acct".to_string(),
                Account::Ledger { address: Address::repeat_byte(1), derivation_path: "m/44'/60'/0'/0/0".into() },
            ),
            (
                "trezor-acct".to_string(),
                Account::Trezor { address: Address::repeat_byte(2), derivation_path: "m/44'/60'/0'/0/0".into() },
            ),
        ]);
        let resolver = Resolver::new(&namespaces, &accounts);
        let planner = Planner::new(&resolver);
        let err = planner
            .plan(&Namespace::new("default"), &["admin".to_string(), "deployer".to_string()])
            .unwrap_err();
        assert!(matches!(err, PlanError::HwConflict(_)));
    }
}
