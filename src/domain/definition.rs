//! The declarative configuration of a domain and its document codec.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("failed to parse domain definition")]
    Parse(#[source] serde_json::Error),
    #[error("failed to serialize domain definition")]
    Serialize(#[source] serde_json::Error),
    #[error("domain definition has no name")]
    MissingName,
}

fn default_id() -> i32 {
    -1
}

/// User-specified configuration of a container domain.
///
/// `id` is a runtime field: the host pid of the namespaced init while the
/// domain runs, -1 otherwise. It is written out when a running domain is
/// persisted and reset to -1 when definitions are loaded at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainDefinition {
    pub name: String,
    pub uuid: Uuid,
    #[serde(default = "default_id")]
    pub id: i32,
    /// Advisory memory ceiling in KiB; not enforced by this driver.
    #[serde(default)]
    pub max_memory: u64,
    /// Host path of a pre-existing pty device. Empty means a fresh pair
    /// is allocated on start and no forwarder is spawned.
    #[serde(default)]
    pub tty: String,
    /// Root filesystem and mount setup. Opaque to the driver; consumed
    /// by the container entry routine.
    #[serde(default)]
    pub rootfs: serde_json::Value,
}

impl DomainDefinition {
    /// Parse a definition document.
    pub fn parse(doc: &str) -> Result<Self, DefinitionError> {
        let def: DomainDefinition = serde_json::from_str(doc).map_err(DefinitionError::Parse)?;
        if def.name.is_empty() {
            return Err(DefinitionError::MissingName);
        }
        Ok(def)
    }

    /// Re-serialize the in-memory definition into a freshly owned string.
    pub fn dump(&self) -> Result<String, DefinitionError> {
        serde_json::to_string_pretty(self).map_err(DefinitionError::Serialize)
    }
}


#[cfg(test)]
pub(crate) use tests::minimal_doc;
