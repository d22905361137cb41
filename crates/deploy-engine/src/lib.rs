//! Runs a script under a PTY-backed subprocess and classifies its interleaved text/JSON output
//! into a typed stream without ever buffering the whole run in memory.
//!
//! The line-classification core ([`entity::classify`], [`stage::ExecutionStage`]) is pure and
//! synchronous; [`runner::process_lines`] drives it from any `AsyncRead`, which is what lets
//! tests exercise the full classification cascade against in-memory fixtures instead of a real
//! `forge` process.

pub mod command;
pub mod entity;
pub mod pty_bridge;
pub mod runner;
pub mod stage;

pub use command::ScriptInvocation;
pub use entity::Entity;
pub use runner::{process_lines, run, RunnerError, RunnerOptions, ScriptResult};
pub use stage::ExecutionStage;
