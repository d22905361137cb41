use serde_json::Value;

use crate::stage::ExecutionStage;

/// The closed union the line classifier emits, one per non-empty line of engine output.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    ScriptOutput(Value),
    GasEstimate(Value),
    BroadcastStatus(Value),
    ExecutionTrace(Value),
    TransactionReceipt(Value),
    ConsoleLogLine(String),
    UnrecognizedJson(Value),
    TextLine(String),
}

impl Entity {
    /// Whether a `BroadcastStatus{status="success"}` entity, the one case that promotes the
    /// stage on its own (independent of line-content stage detection).
    pub fn promotes_to_broadcasting(&self) -> bool {
        matches!(
            self,
            Self::BroadcastStatus(v) if v.get("status").and_then(Value::as_str) == Some("success")
        )
    }

    /// Whether this is a `ScriptOutput` entity, which promotes `Initializing`/`Compiling` to
    /// `Simulating`.
    pub fn is_script_output(&self) -> bool {
        matches!(self, Self::ScriptOutput(_))
    }

    /// Lines that produced no entity worth keeping in the main stream: ignored-line files are
    /// written for these.
    pub fn is_ignored(&self) -> bool {
        matches!(self, Self::UnrecognizedJson(_))
    }
}

/// Strips a conservative set of ANSI SGR (`ESC [ ... m`) escape sequences, leaving other escape
/// sequences untouched. The original line is retained separately for archival.
pub fn strip_ansi_sgr(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

fn try_script_output(v: &Value) -> bool {
    v.get("raw_logs").is_some_and(|x| !x.is_null())
}

fn try_gas_estimate(v: &Value) -> bool {
    match v.get("chain") {
        Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn try_broadcast_status(v: &Value) -> bool {
    v.get("status").and_then(Value::as_str).is_some_and(|s| !s.is_empty())
}

fn try_execution_trace(v: &Value) -> bool {
    v.get("arena").is_some()
}

fn try_transaction_receipt(v: &Value) -> bool {
    v.get("tx_hash").is_some()
}

/// Classifies one already ANSI-stripped, non-empty line per the documented cascade: JSON lines
/// try typed shapes in a fixed priority order before falling back to `UnrecognizedJson`; non-JSON
/// lines become `ConsoleLogLine` or `TextLine`.
pub fn classify(stripped: &str) -> Entity {
    let trimmed = stripped.trim_start();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
            if try_script_output(&value) {
                return Entity::ScriptOutput(value);
            }
            if try_gas_estimate(&value) {
                return Entity::GasEstimate(value);
            }
            if try_broadcast_status(&value) {
                return Entity::BroadcastStatus(value);
            }
            if try_execution_trace(&value) {
                return Entity::ExecutionTrace(value);
            }
            if try_transaction_receipt(&value) {
                return Entity::TransactionReceipt(value);
            }
            return Entity::UnrecognizedJson(value);
        }
    }

    if trimmed.contains("console.log") || trimmed.starts_with("Logs:") {
        return Entity::ConsoleLogLine(stripped.to_string());
    }

    Entity::TextLine(stripped.to_string())
}

/// Applies the stage-promotion rule that depends on the *classified entity* rather than raw line
/// content (`ExecutionStage::from_line_content` handles the content-based promotions).
pub fn promote_stage_from_entity(stage: &mut ExecutionStage, entity: &Entity) {
    if entity.is_script_output() {
        if *stage == ExecutionStage::Initializing || *stage == ExecutionStage::Compiling {
            stage.advance_to(ExecutionStage::Simulating);
        }
    } else if entity.promotes_to_broadcasting() {
        stage.advance_to(ExecutionStage::Broadcasting);
    }
}
