//! Correlates `ContractDeployed` events with the on-chain transaction hash and block number
//! recorded in the engine's broadcast artifact.

use std::path::Path;

use alloy_primitives::{Address, B256};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// The well-known CreateX factory address used to recognize factory-deployed contracts when no
/// direct transaction match exists. This crate never decodes factory calldata.
pub const CREATEX_FACTORY: Address = Address::new([
    0xba, 0x5e, 0xd0, 0x99, 0x63, 0x3d, 0x3b, 0x31, 0x3e, 0x4d, 0x5f, 0x7b, 0xdc, 0x13, 0x05,
    0xd3, 0xc2, 0x8b, 0xa5, 0xed,
]);

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to read broadcast artifact {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse broadcast artifact JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct InnerTransaction {
    from: Option<Address>,
    to: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdditionalContract {
    transaction_type: String,
    address: Address,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastTransaction {
    hash: Option<B256>,
    transaction: InnerTransaction,
    contract_address: Option<Address>,
    #[serde(default)]
    additional_contracts: Vec<AdditionalContract>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Receipt {
    block_number: Option<String>,
    contract_address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawArtifact {
    #[serde(default)]
    transactions: Vec<BroadcastTransaction>,
    #[serde(default)]
    receipts: Vec<Receipt>,
}

/// The result of correlating one deployment address against the broadcast artifact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Correlation {
    pub tx_hash: Option<B256>,
    pub block_number: Option<u64>,
    /// Set when neither pass found a match; the registry records this as a diagnostic rather
    /// than an error.
    pub missing_tx_hash: bool,
}

struct Row {
    address: Option<Address>,
    hash: Option<B256>,
    block_number: Option<u64>,
    from: Option<Address>,
    to: Option<Address>,
}

fn parse_hex_block(s: &str) -> Option<u64> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16).ok()
}

/// Correlates deployment events against one parsed broadcast artifact.
pub struct Correlator {
    rows: Vec<Row>,
}

impl Correlator {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BroadcastError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| BroadcastError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, BroadcastError> {
        let raw: RawArtifact = serde_json::from_slice(bytes)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawArtifact) -> Self {
        let mut rows = Vec::with_capacity(raw.transactions.len());
        for (i, tx) in raw.transactions.iter().enumerate() {
            let receipt = raw.receipts.get(i);
            let block_number = receipt.and_then(|r| r.block_number.as_deref()).and_then(parse_hex_block);
            // Receipt contract_address == zero means "use the transaction's field".
            let address = receipt
                .and_then(|r| r.contract_address)
                .filter(|a| !a.is_zero())
                .or(tx.contract_address);

            rows.push(Row {
                address,
                hash: tx.hash,
                block_number,
                from: tx.transaction.from,
                to: tx.transaction.to,
            });

            for extra in &tx.additional_contracts {
                let kind = extra.transaction_type.to_ascii_uppercase();
                if kind != "CREATE" && kind != "CREATE2" {
                    continue;
                }
                rows.push(Row {
                    address: Some(extra.address),
                    hash: tx.hash,
                    block_number,
                    from: tx.transaction.from,
                    to: tx.transaction.to,
                });
            }
        }
        Self { rows }
    }

    /// Correlates a deployment at `address` deployed by `deployer`.
    pub fn correlate(&self, address: Address, deployer: Address) -> Correlation {
        if let Some(row) = self.rows.iter().find(|r| r.address == Some(address)) {
            return Correlation { tx_hash: row.hash, block_number: row.block_number, missing_tx_hash: false };
        }

        if let Some(row) =
            self.rows.iter().find(|r| r.to == Some(CREATEX_FACTORY) && r.from == Some(deployer))
        {
            return Correlation { tx_hash: row.hash, block_number: row.block_number, missing_tx_hash: false };
        }

        debug!(target: "deploy_broadcast", %address, "no transaction correlated with deployment");
        Correlation { tx_hash: None, block_number: None, missing_tx_hash: true }
    }
}
