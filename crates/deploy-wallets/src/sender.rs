use alloy_dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::{Address, Bytes, U256};
use thiserror::Error;

use crate::magic::SenderTypeTag;

/// The wire-format tuple `(string name, address account, bytes8 sender_type, bool
/// can_broadcast, bytes config)` the engine expects in `SENDER_CONFIGS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderInitConfig {
    pub name: String,
    pub account: Address,
    pub sender_type: SenderTypeTag,
    pub can_broadcast: bool,
    pub config: Bytes,
}

#[derive(Debug, Error)]
pub enum AbiError {
    #[error("failed to parse sender config ABI type: {0}")]
    TypeParse(String),
    #[error("failed to ABI-decode sender configs: {0}")]
    Decode(String),
    #[error("decoded value did not match the expected sender config shape")]
    Shape,
}

const SENDER_CONFIG_TYPE: &str = "tuple(string,address,bytes8,bool,bytes)[]";

impl SenderInitConfig {
    fn to_dyn_value(&self) -> DynSolValue {
        DynSolValue::Tuple(vec![
            DynSolValue::String(self.name.clone()),
            DynSolValue::Address(self.account),
            DynSolValue::FixedBytes(alloy_primitives::B256::right_padding_from(self.sender_type.as_slice()), 8),
            DynSolValue::Bool(self.can_broadcast),
            DynSolValue::Bytes(self.config.to_vec()),
        ])
    }

    fn from_dyn_value(value: &DynSolValue) -> Result<Self, AbiError> {
        let DynSolValue::Tuple(fields) = value else { return Err(AbiError::Shape) };
        let [name, account, sender_type, can_broadcast, config] = fields.as_slice() else {
            return Err(AbiError::Shape);
        };
        let DynSolValue::String(name) = name else { return Err(AbiError::Shape) };
        let DynSolValue::Address(account) = account else { return Err(AbiError::Shape) };
        let DynSolValue::FixedBytes(word, 8) = sender_type else { return Err(AbiError::Shape) };
        let DynSolValue::Bool(can_broadcast) = can_broadcast else { return Err(AbiError::Shape) };
        let DynSolValue::Bytes(config) = config else { return Err(AbiError::Shape) };
        Ok(Self {
            name: name.clone(),
            account: *account,
            sender_type: SenderTypeTag::from_slice(&word[0..8]),
            can_broadcast: *can_broadcast,
            config: Bytes::from(config.clone()),
        })
    }
}

/// ABI-encodes the `SenderInitConfig[]` array the way `abi.encode(SenderInitConfig[])` would
/// in Solidity, ready to be hex-prefixed into the `SENDER_CONFIGS` environment variable.
pub fn encode_sender_configs(configs: &[SenderInitConfig]) -> Result<Vec<u8>, AbiError> {
    let array = DynSolValue::Array(configs.iter().map(SenderInitConfig::to_dyn_value).collect());
    // `abi.encode(x)` for a single argument is the same encoding as a one-field tuple
    // containing `x`; wrapping keeps us byte-compatible with the engine's Solidity decoder.
    Ok(DynSolValue::Tuple(vec![array]).abi_encode())
}

/// The inverse of [`encode_sender_configs`]; used by the round-trip property test in §8.
pub fn decode_sender_configs(data: &[u8]) -> Result<Vec<SenderInitConfig>, AbiError> {
    let ty: DynSolType = format!("tuple({SENDER_CONFIG_TYPE})")
        .parse()
        .map_err(|e: alloy_dyn_abi::Error| AbiError::TypeParse(e.to_string()))?;
    let decoded = ty.abi_decode(data).map_err(|e| AbiError::Decode(e.to_string()))?;
    let DynSolValue::Tuple(mut fields) = decoded else { return Err(AbiError::Shape) };
    let Some(DynSolValue::Array(items)) = fields.pop() else { return Err(AbiError::Shape) };
    items.iter().map(SenderInitConfig::from_dyn_value).collect()
}

/// Encodes a `uint256` scalar, used for [`deploy_config::Account::PrivateKey`] payloads.
pub fn encode_u256(value: U256) -> Bytes {
    Bytes::from(DynSolValue::Uint(value, 256).abi_encode())
}

/// Encodes a bare `string`, used for Safe-signer and hardware-wallet derivation-path payloads.
pub fn encode_string(value: &str) -> Bytes {
    Bytes::from(DynSolValue::String(value.to_string()).abi_encode())
}

/// Encodes `(address governor, address timelock, string proposer_name)`, the
/// [`deploy_config::Account::OzGovernor`] payload.
pub fn encode_governor(governor: Address, timelock: Address, proposer_name: &str) -> Bytes {
    let tuple = DynSolValue::Tuple(vec![
        DynSolValue::Address(governor),
        DynSolValue::Address(timelock),
        DynSolValue::String(proposer_name.to_string()),
    ]);
    Bytes::from(tuple.abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magic;

    #[test]
    fn round_trip_is_identity() {
        let configs = vec![
            SenderInitConfig {
                name: "deployer".to_string(),
                account: Address::repeat_byte(0xAB),
                sender_type: magic::in_memory(),
                can_broadcast: true,
                config: encode_u256(U256::from(42u64)),
            },
            SenderInitConfig {
                name: "prod-safe".to_string(),
                account: Address::repeat_byte(0xCD),
                sender_type: magic::gnosis_safe(),
                can_broadcast: false,
                config: encode_string("deployer"),
            },
        ];

        let encoded = encode_sender_configs(&configs).unwrap();
        let decoded = decode_sender_configs(&encoded).unwrap();
        assert_eq!(decoded, configs);
    }

    #[test]
    fn empty_plan_round_trips() {
        let encoded = encode_sender_configs(&[]).unwrap();
        let decoded = decode_sender_configs(&encoded).unwrap();
        assert!(decoded.is_empty());
    }
}
