use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// A named reference to another [`Account`] within the same resolved set.
pub type AccountRef = String;

/// A signing identity.
///
/// Hardware wallets carry their address explicitly since it cannot be derived without the
/// physical device being present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Account {
    PrivateKey {
        /// 32-byte secret, hex-encoded with a `0x` prefix.
        secret: String,
    },
    Safe {
        safe_address: Address,
        signer: AccountRef,
    },
    Ledger {
        address: Address,
        derivation_path: String,
    },
    Trezor {
        address: Address,
        derivation_path: String,
    },
    #[serde(rename = "oz-governor")]
    OzGovernor {
        governor_address: Address,
        #[serde(default)]
        timelock_address: Option<Address>,
        proposer: AccountRef,
    },
}

impl Account {
    /// The direct [`AccountRef`] this account depends on, if any (Safe signer, Governor
    /// proposer). Used to validate that every reference resolves and contains no cycles.
    pub fn dependency(&self) -> Option<&AccountRef> {
        match self {
            Self::Safe { signer, .. } => Some(signer),
            Self::OzGovernor { proposer, .. } => Some(proposer),
            Self::PrivateKey { .. } | Self::Ledger { .. } | Self::Trezor { .. } => None,
        }
    }

    /// The account address as seen by the execution engine. For a governor, that's the
    /// timelock when present, else the governor itself.
    pub fn effective_address(&self) -> Option<Address> {
        match self {
            Self::Safe { safe_address, .. } => Some(*safe_address),
            Self::Ledger { address, .. } | Self::Trezor { address, .. } => Some(*address),
            Self::OzGovernor { governor_address, timelock_address, .. } => {
                Some(timelock_address.unwrap_or(*governor_address))
            }
            // A private key's address is derived from its secret; that derivation lives in
            // `deploy-wallets`, which owns the secp256k1 dependency.
            Self::PrivateKey { .. } => None,
        }
    }

    pub fn is_ledger(&self) -> bool {
        matches!(self, Self::Ledger { .. })
    }

    pub fn is_trezor(&self) -> bool {
        matches!(self, Self::Trezor { .. })
    }
}
