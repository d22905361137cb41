//! Resolves a script's declared signer roles into the ABI-encoded sender configuration the
//! execution engine expects, including the wire-level "magic tag" contract and private-key
//! identity derivation.

pub mod identity;
pub mod magic;
pub mod planner;
pub mod sender;

pub use identity::KeyError;
pub use planner::{parse_custom_senders, ExecutionFlags, PlanError, Planner, SenderPlan};
pub use sender::{AbiError, SenderInitConfig};
