//! Decodes the execution engine's raw event logs into a closed, typed event union.
//!
//! The engine's event surface is finite and known at build time, so it is modeled as a tagged
//! union with one variant per ABI event plus one for unknown topics, rather than as dynamic
//! dispatch over an ABI description read at runtime.

use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::{sol, SolEvent};
use thiserror::Error;

sol! {
    #![sol(all_derives = true)]
    event DeployingContract(string what, string label, bytes32 transactionId);

    struct ContractDeployment {
        string artifact;
        string label;
        string entropy;
        bytes32 salt;
        bytes32 bytecodeHash;
        bytes32 initCodeHash;
        bytes constructorArgs;
        string createStrategy;
    }

    event ContractDeployed(
        address indexed deployer,
        address indexed location,
        bytes32 indexed transactionId,
        ContractDeployment deployment
    );

    event TransactionSimulated(
        bytes32 indexed transactionId,
        address indexed sender,
        address indexed to,
        uint256 value,
        bytes data,
        string label,
        bytes returnData
    );

    event TransactionBroadcast(
        bytes32 indexed transactionId,
        address indexed sender,
        address indexed to,
        uint256 value,
        bytes data,
        string label,
        bytes returnData
    );

    event TransactionFailed(
        bytes32 indexed transactionId,
        address indexed sender,
        address indexed to,
        uint256 value,
        bytes data,
        string error
    );

    struct SimpleCall {
        string label;
        address to;
        bytes data;
        uint256 value;
    }

    struct RichTransaction {
        SimpleCall tx;
        bytes32 transactionId;
        bytes32 safeTxHash;
        uint8 status;
        bytes signature;
        bytes extra;
    }

    event SafeTransactionQueued(
        bytes32 indexed safeTxHash,
        address indexed safe,
        address indexed proposer,
        RichTransaction[] transactions
    );

    event BroadcastStarted();

    event Upgraded(address indexed implementation);
    event AdminChanged(address previousAdmin, address newAdmin);
    event BeaconUpgraded(address indexed beacon);
}

/// A raw, undecoded event log as emitted by the engine's child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// A topic this crate has no decoder for. Never treated as an error: the pipeline tolerates
/// event types it doesn't recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownEvent {
    pub topic: B256,
}

/// The decoded, closed event union.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    DeployingContract(DeployingContract),
    ContractDeployed(ContractDeployed),
    TransactionSimulated(TransactionSimulated),
    TransactionBroadcast(TransactionBroadcast),
    TransactionFailed(TransactionFailed),
    SafeTransactionQueued(SafeTransactionQueued),
    BroadcastStarted(BroadcastStarted),
    Upgraded(Upgraded),
    AdminChanged(AdminChanged),
    BeaconUpgraded(BeaconUpgraded),
    Unknown(UnknownEvent),
}

impl Event {
    /// The 32-byte id grouping every event produced by a single script-level transaction.
    /// Proxy events and unknown topics carry no such id.
    pub fn transaction_id(&self) -> Option<B256> {
        match self {
            Self::DeployingContract(e) => Some(e.transactionId),
            Self::ContractDeployed(e) => Some(e.transactionId),
            Self::TransactionSimulated(e) => Some(e.transactionId),
            Self::TransactionBroadcast(e) => Some(e.transactionId),
            Self::TransactionFailed(e) => Some(e.transactionId),
            Self::SafeTransactionQueued(e) => Some(e.safeTxHash),
            Self::BroadcastStarted(_)
            | Self::Upgraded(_)
            | Self::AdminChanged(_)
            | Self::BeaconUpgraded(_)
            | Self::Unknown(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("known topic {topic} failed to decode: {source}")]
    KnownTopicDecodeFailed { topic: B256, #[source] source: alloy_sol_types::Error },
}

fn decode_known<E: SolEvent>(log: &EventLog) -> Result<E, DecodeError> {
    E::decode_raw_log(log.topics.iter().copied(), log.data.as_ref()).map_err(|source| {
        DecodeError::KnownTopicDecodeFailed {
            topic: log.topics.first().copied().unwrap_or_default(),
            source,
        }
    })
}

/// Decodes one raw log into a typed [`Event`]. Returns `Ok(Event::Unknown(..))` for a topic0
/// this crate has no decoder for; returns `Err` only when a *known* topic fails to decode
/// against its own ABI.
pub fn decode_log(log: &EventLog) -> Result<Event, DecodeError> {
    let Some(topic0) = log.topics.first().copied() else {
        return Ok(Event::Unknown(UnknownEvent { topic: B256::ZERO }));
    };

    match topic0 {
        t if t == DeployingContract::SIGNATURE_HASH => decode_known(log).map(Event::DeployingContract),
        t if t == ContractDeployed::SIGNATURE_HASH => decode_known(log).map(Event::ContractDeployed),
        t if t == TransactionSimulated::SIGNATURE_HASH => decode_known(log).map(Event::TransactionSimulated),
        t if t == TransactionBroadcast::SIGNATURE_HASH => decode_known(log).map(Event::TransactionBroadcast),
        t if t == TransactionFailed::SIGNATURE_HASH => decode_known(log).map(Event::TransactionFailed),
        t if t == SafeTransactionQueued::SIGNATURE_HASH => decode_known(log).map(Event::SafeTransactionQueued),
        t if t == BroadcastStarted::SIGNATURE_HASH => decode_known(log).map(Event::BroadcastStarted),
        t if t == Upgraded::SIGNATURE_HASH => decode_known(log).map(Event::Upgraded),
        t if t == AdminChanged::SIGNATURE_HASH => decode_known(log).map(Event::AdminChanged),
        t if t == BeaconUpgraded::SIGNATURE_HASH => decode_known(log).map(Event::BeaconUpgraded),
        other => Ok(Event::Unknown(UnknownEvent { topic: other })),
    }
}
