//! On-disk persistence of domain definitions: one file per defined
//! domain under the configured directory.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::domain::DomainDefinition;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create config directory {config_dir:?}")]
    CreateDir {
        config_dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write definition file {path:?}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to serialize definition for {name}")]
    Serialize {
        name: String,
        source: serde_json::Error,
    },
    #[error("failed to remove definition file {path:?}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read config directory {config_dir:?}")]
    ReadDir {
        config_dir: PathBuf,
        source: std::io::Error,
    },
}

fn definition_path(config_dir: &Path, name: &str) -> PathBuf {
    config_dir.join(format!("{name}.json"))
}

/// Persist a definition and return the path it was written to.
#[instrument(level = "trace", skip(def), fields(name = %def.name))]
pub fn save_definition(config_dir: &Path, def: &DomainDefinition) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(config_dir).map_err(|err| StoreError::CreateDir {
        config_dir: config_dir.to_owned(),
        source: err,
    })?;

    let path = definition_path(config_dir, &def.name);
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&path)
        .map_err(|err| StoreError::WriteFile {
            path: path.clone(),
            source: err,
        })?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, def).map_err(|err| StoreError::Serialize {
        name: def.name.clone(),
        source: err,
    })?;
    writer.flush().map_err(|err| StoreError::WriteFile {
        path: path.clone(),
        source: err,
    })?;

    Ok(path)
}

/// Remove the persisted definition of an undefined domain.
pub fn delete_definition(path: &Path, name: &str) -> Result<(), StoreError> {
    tracing::debug!(name, ?path, "removing domain definition");
    fs::remove_file(path).map_err(|err| StoreError::RemoveFile {
        path: path.to_owned(),
        source: err,
    })
}

/// Load every definition file in the config directory. Files that do
/// not parse are logged and skipped; stale runtime ids are reset.
pub fn load_definitions(
    config_dir: &Path,
) -> Result<Vec<(DomainDefinition, PathBuf)>, StoreError> {
    let mut loaded = vec![];

    if !config_dir.exists() {
        return Ok(loaded);
    }

    let entries = fs::read_dir(config_dir).map_err(|err| StoreError::ReadDir {
        config_dir: config_dir.to_owned(),
        source: err,
    })?;

    for entry in entries {
        let entry = entry.map_err(|err| StoreError::ReadDir {
            config_dir: config_dir.to_owned(),
            source: err,
        })?;
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }

        let doc = match fs::read_to_string(&path) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(?path, %err, "skipping unreadable definition file");
                continue;
            }
        };
        match DomainDefinition::parse(&doc) {
            Ok(mut def) => {
                def.id = -1;
                loaded.push((def, path));
            }
            Err(err) => {
                tracing::warn!(?path, %err, "skipping unparsable definition file");
            }
        }
    }

    Ok(loaded)
}
