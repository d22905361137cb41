use alloy_primitives::{Address, Bytes, B256};
use deploy_events::{decode_log, Event, EventLog};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct RawLog {
    address: Address,
    topics: Vec<B256>,
    data: Bytes,
}

/// Pulls `raw_logs` out of one `ScriptOutput` entity's JSON and decodes each entry. A log this
/// crate has no decoder for becomes `Event::Unknown`, never an error; a malformed log entry
/// (the wrong shape entirely) is skipped with a warning rather than aborting the whole entity,
/// matching the decoder's "known-topic failures are recoverable" policy.
pub fn events_from_script_output(script_output: &Value) -> Vec<(Address, Event)> {
    let Some(raw_logs) = script_output.get("raw_logs").and_then(Value::as_array) else {
        return Vec::new();
    };

    raw_logs
        .iter()
        .filter_map(|entry| match serde_json::from_value::<RawLog>(entry.clone()) {
            Ok(raw) => {
                let log = EventLog { address: raw.address, topics: raw.topics, data: raw.data };
                match decode_log(&log) {
                    Ok(event) => Some((raw.address, event)),
                    Err(e) => {
                        warn!(target: "deploy_core", error = %e, "known-topic log failed to decode, skipping");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(target: "deploy_core", error = %e, "malformed raw log entry, skipping");
                None
            }
        })
        .collect()
}

/// Decodes every `ScriptOutput` entity produced by one run, in emission order.
pub fn events_from_script_outputs(script_outputs: &[Value]) -> Vec<(Address, Event)> {
    script_outputs.iter().flat_map(events_from_script_output).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolEvent;
    use deploy_events::Upgraded;

    #[test]
    fn decodes_raw_logs_from_script_output() {
        let implementation = Address::repeat_byte(0x42);
        let topic0 = Upgraded::SIGNATURE_HASH;
        let topic1 = implementation.into_word();
        let script_output = serde_json::json!({
            "raw_logs": [{
                "address": "0x1111111111111111111111111111111111111111",
                "topics": [topic0.to_string(), topic1.to_string()],
                "data": "0x",
            }]
        });
        let events = events_from_script_output(&script_output);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1, Event::Upgraded(Upgraded { implementation }));
    }

    #[test]
    fn missing_raw_logs_yields_empty_vec() {
        let script_output = serde_json::json!({"status": "ok"});
        assert!(events_from_script_output(&script_output).is_empty());
    }

    #[test]
    fn malformed_entry_is_skipped_not_fatal() {
        let script_output = serde_json::json!({"raw_logs": [{"address": "not-an-address"}]});
        assert!(events_from_script_output(&script_output).is_empty());
    }
}
