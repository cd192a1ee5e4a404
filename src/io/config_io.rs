use std::fs;
use std::path::{Path, PathBuf};

use crate::io::recovery::atomic_write;
use crate::model::config::{AppConfig, StorageBackend};

/// Error type for reading and editing config.toml
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("could not edit {path}: {source}")]
    Edit {
        path: PathBuf,
        source: toml_edit::TomlError,
    },
    #[error("could not write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// `$XDG_CONFIG_HOME/zentrack/config.toml`
pub fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    config_dir.join("zentrack").join("config.toml")
}

/// `$XDG_DATA_HOME/zentrack`, the default local store directory
pub fn data_home() -> PathBuf {
    let data_dir = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local").join("share"));
    data_dir.join("zentrack")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

/// Read config from `path`; a missing file yields defaults.
pub fn read_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let Some(text) = read_optional(path)? else {
        return Ok(AppConfig::default());
    };
    toml::from_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn read_config() -> Result<AppConfig, ConfigError> {
    read_config_from(&config_path())
}

/// Load the raw document for format-preserving edits.
pub fn read_config_doc(path: &Path) -> Result<toml_edit::DocumentMut, ConfigError> {
    let text = read_optional(path)?.unwrap_or_default();
    text.parse().map_err(|e| ConfigError::Edit {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Write the config document back to disk, preserving formatting.
pub fn write_config_doc(path: &Path, doc: &toml_edit::DocumentMut) -> Result<(), ConfigError> {
    let write_err = |e| ConfigError::Write {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }
    atomic_write(path, doc.to_string().as_bytes()).map_err(write_err)
}

/// Pin the storage backend in the config document
pub fn set_backend(doc: &mut toml_edit::DocumentMut, backend: StorageBackend) {
    if !doc.contains_key("storage") {
        doc["storage"] = toml_edit::Item::Table(toml_edit::Table::new());
    }
    doc["storage"]["backend"] = toml_edit::value(backend.as_str());
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
