//! Shreds a compiled script artifact's JSON for the handful of fields the orchestrator needs:
//! the `run()` method's `@custom:senders` devdoc tag, bytecode hashes, linked-library
//! references, and whether the artifact is a Solidity `library`.
//!
//! This is deliberately not a full compiler-output model (that's `foundry-compilers`' job) —
//! just the JSON subset this crate reads.

use std::collections::BTreeSet;
use std::path::Path;

use alloy_primitives::{keccak256, B256};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("failed to parse artifact JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("artifact bytecode object is not valid hex: {0}")]
    BadHex(#[from] hex::FromHexError),
}

/// A single `{start, length}` linked-library slot in the bytecode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkSlot {
    pub start: u64,
    pub length: u64,
}

/// A `path:name` reference to an unlinked library, deduplicated across the creation and
/// deployed bytecode sections.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LinkReference {
    pub path: String,
    pub name: String,
}

/// The subset of a compiled script artifact this crate reads.
#[derive(Debug, Clone)]
pub struct ScriptArtifact {
    raw: Value,
}

impl ScriptArtifact {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_slice(&bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let raw: Value = serde_json::from_slice(bytes)?;
        Ok(Self { raw })
    }

    /// The `@custom:senders` devdoc tag on `run()`, if present.
    pub fn custom_senders_tag(&self) -> Option<&str> {
        self.raw
            .pointer("/metadata/output/devdoc/methods/run()/custom:senders")
            .and_then(Value::as_str)
    }

    /// The exact Solidity compiler version string, e.g. `0.8.23+commit.f704f362`.
    pub fn compiler_version(&self) -> Option<&str> {
        self.raw.pointer("/metadata/compiler/version").and_then(Value::as_str)
    }

    /// The `{sourcePath: contractName}` pair the artifact was compiled as its target for.
    pub fn compilation_target(&self) -> Option<(&str, &str)> {
        let target = self.raw.pointer("/metadata/settings/compilationTarget")?.as_object()?;
        let (path, name) = target.iter().next()?;
        Some((path.as_str(), name.as_str()?))
    }

    /// Whether the compiled contract is a Solidity `library` rather than a `contract`.
    pub fn is_library(&self) -> bool {
        let Some((_, target_name)) = self.compilation_target() else { return false };
        let Some(nodes) = self.raw.pointer("/ast/nodes").and_then(Value::as_array) else {
            return false;
        };
        nodes.iter().any(|node| {
            node.get("nodeType").and_then(Value::as_str) == Some("ContractDefinition")
                && node.get("name").and_then(Value::as_str) == Some(target_name)
                && node.get("contractKind").and_then(Value::as_str) == Some("library")
        })
    }

    fn bytecode_object(&self, field: &str) -> Option<&str> {
        self.raw.pointer(&format!("/{field}/object")).and_then(Value::as_str)
    }

    /// `keccak256` of the hex-decoded creation bytecode, computed on demand.
    pub fn creation_code_hash(&self) -> Result<Option<B256>, ArtifactError> {
        let Some(object) = self.bytecode_object("bytecode") else { return Ok(None) };
        let bytes = hex::decode(object.trim_start_matches("0x"))?;
        Ok(Some(keccak256(bytes)))
    }

    /// `keccak256` of the hex-decoded deployed (runtime) bytecode, computed on demand.
    pub fn deployed_code_hash(&self) -> Result<Option<B256>, ArtifactError> {
        let Some(object) = self.bytecode_object("deployedBytecode") else { return Ok(None) };
        let bytes = hex::decode(object.trim_start_matches("0x"))?;
        Ok(Some(keccak256(bytes)))
    }

    /// Unlinked library references from both bytecode sections, deduplicated.
    pub fn link_references(&self) -> BTreeSet<LinkReference> {
        let mut refs = BTreeSet::new();
        for field in ["bytecode", "deployedBytecode"] {
            let Some(by_path) = self
                .raw
                .pointer(&format!("/{field}/linkReferences"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            for (path, by_name) in by_path {
                let Some(by_name) = by_name.as_object() else { continue };
                for name in by_name.keys() {
                    refs.insert(LinkReference { path: path.clone(), name: name.clone() });
                }
            }
        }
        refs
    }
}
