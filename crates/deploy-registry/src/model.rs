use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, B256};
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployType {
    Singleton,
    Proxy,
    Library,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProxyType {
    UUPS,
    Transparent,
    Beacon,
}

/// `Queued` and `PendingSafe` both mean the transaction went through a Safe multisig rather than
/// being broadcast directly; `Queued` has enough confirmations to be next up for execution,
/// `PendingSafe` is still gathering signer confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainInfoStatus {
    Executed,
    Queued,
    PendingSafe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStatus {
    pub status: String,
}

impl Default for VerificationStatus {
    fn default() -> Self {
        Self { status: "unverified".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainInfo {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub block_number: Option<u64>,
    pub broadcast_file_ref: String,
    pub timestamp: u64,
    pub status: ChainInfoStatus,
    pub deployer: Address,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub safe_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub safe_tx_hash: Option<B256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub source_commit: Option<String>,
    #[serde(default)]
    pub compiler: String,
    #[serde(default)]
    pub source_hash: String,
    #[serde(default)]
    pub contract_path: String,
    #[serde(default)]
    pub script_path: String,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Accepts either a `0x`-prefixed hex string (the current encoding) or a JSON array of byte
/// values (the legacy encoding), normalizing both to a hex string. `Registry::load` scans the
/// raw document separately to report whether any legacy arrays were seen.
pub(crate) fn deserialize_hex_or_bytes<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct HexOrBytes;

    impl<'de> Visitor<'de> for HexOrBytes {
        type Value = String;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "a 0x-prefixed hex string or an array of byte values")
        }

        fn visit_str<E>(self, v: &str) -> Result<String, E>
        where
            E: de::Error,
        {
            Ok(v.to_string())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<String, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut bytes = Vec::new();
            while let Some(byte) = seq.next_element::<u8>()? {
                bytes.push(byte);
            }
            Ok(format!("0x{}", hex::encode(bytes)))
        }
    }

    deserializer.deserialize_any(HexOrBytes)
}

fn is_unspecified_hex(value: &str) -> bool {
    let stripped = value.trim_start_matches("0x");
    stripped.is_empty() || stripped.chars().all(|c| c == '0')
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub address: Address,
    pub contract_name: String,
    pub namespace: String,
    pub deploy_type: DeployType,
    #[serde(deserialize_with = "deserialize_hex_or_bytes")]
    pub salt: String,
    #[serde(deserialize_with = "deserialize_hex_or_bytes")]
    pub init_code_hash: String,
    #[serde(default)]
    pub constructor_args: Bytes,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub verification: VerificationStatus,
    pub chain_info: ChainInfo,
    pub metadata: Metadata,
    /// Proxy deployments carry `implementation`/`proxy_type`/`beacon`/`admin` here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Deployment {
    /// Both `salt` and `init_code_hash` are empty or all-zero, making this entry eligible for
    /// `CleanInvalidEntries` once its broadcast file is also gone.
    pub fn has_unspecified_identity(&self) -> bool {
        is_unspecified_hex(&self.salt) && is_unspecified_hex(&self.init_code_hash)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub name: String,
    #[serde(default)]
    pub deployments: BTreeMap<String, Deployment>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkEntry>,
    #[serde(default)]
    pub libraries: BTreeMap<String, Deployment>,
}
