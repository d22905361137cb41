use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid hex in private key: {0}")]
    InvalidHex(String),
    #[error("invalid secp256k1 scalar: {0}")]
    InvalidScalar(String),
}

/// Derives the address of a [`deploy_config::Account::PrivateKey`] from its hex-encoded
/// secret, the same way `foundry-wallets` turns a raw key into a signer.
pub fn derive_address(secret_hex: &str) -> Result<Address, KeyError> {
    let bytes = hex::decode(secret_hex.trim_start_matches("0x"))
        .map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(KeyError::InvalidScalar(format!("expected 32 bytes, got {}", bytes.len())));
    }
    let word = B256::from_slice(&bytes);
    let signer =
        PrivateKeySigner::from_bytes(&word).map_err(|e| KeyError::InvalidScalar(e.to_string()))?;
    Ok(signer.address())
}

/// Parses a hex-encoded 32-byte secret into the `uint256` scalar the engine expects for a
/// [`deploy_config::Account::PrivateKey`] payload.
pub fn secret_to_scalar(secret_hex: &str) -> Result<U256, KeyError> {
    let bytes = hex::decode(secret_hex.trim_start_matches("0x"))
        .map_err(|e| KeyError::InvalidHex(e.to_string()))?;
    if bytes.len() != 32 {
        return Err(KeyError::InvalidScalar(format!("expected 32 bytes, got {}", bytes.len())));
    }
    Ok(U256::from_be_slice(&bytes))
}
