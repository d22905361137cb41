use std::path::Path;

use serde_json::Value;

use crate::apply::RegistryError;
use crate::model::Registry;

fn deployment_has_legacy_arrays(deployment: &Value) -> bool {
    matches!(deployment.get("salt"), Some(Value::Array(_)))
        || matches!(deployment.get("init_code_hash"), Some(Value::Array(_)))
}

fn contains_legacy_byte_arrays(raw: &Value) -> bool {
    let in_networks = raw
        .get("networks")
        .and_then(Value::as_object)
        .is_some_and(|networks| {
            networks.values().any(|network| {
                network
                    .get("deployments")
                    .and_then(Value::as_object)
                    .is_some_and(|deployments| deployments.values().any(deployment_has_legacy_arrays))
            })
        });
    let in_libraries = raw
        .get("libraries")
        .and_then(Value::as_object)
        .is_some_and(|libraries| libraries.values().any(deployment_has_legacy_arrays));
    in_networks || in_libraries
}

impl Registry {
    /// Loads a registry document from disk, transparently migrating legacy byte-array
    /// `salt`/`init_code_hash` encodings to hex strings. Returns whether a migration occurred
    /// so the caller can decide whether to eagerly rewrite the file or let the next `apply` do
    /// it. A missing file loads as an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, bool), RegistryError> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok((Self::default(), false));
            }
            Err(source) => {
                return Err(RegistryError::Io { path: path.display().to_string(), source });
            }
        };
        let raw: Value = serde_json::from_slice(&bytes)?;
        let migrated = contains_legacy_byte_arrays(&raw);
        let registry: Self = serde_json::from_value(raw)?;
        Ok((registry, migrated))
    }

    /// Serializes the whole registry as pretty-printed JSON and writes it via a
    /// create-temp-then-rename so a reader never observes a partially written file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RegistryError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json).map_err(|source| RegistryError::Io {
            path: tmp_path.display().to_string(),
            source,
        })?;
        std::fs::rename(&tmp_path, path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}
