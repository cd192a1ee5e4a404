use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration from config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

/// Which persistence backend holds the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Per-user store under the XDG data directory
    Local,
    /// `data/` folder next to the executable
    Portable,
}

impl StorageBackend {
    pub fn parse_backend(s: &str) -> Option<Self> {
        match s {
            "local" => Some(StorageBackend::Local),
            "portable" => Some(StorageBackend::Portable),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Local => "local",
            StorageBackend::Portable => "portable",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Absent = auto-detect (portable when a `data/` dir sits next to the binary)
    #[serde(default)]
    pub backend: Option<StorageBackend>,
    /// Overrides the backend's default directory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: None,
            data_dir: None,
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for FilesConfig {
    fn default() -> Self {
        FilesConfig {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    1000
}

/// 10 MiB
fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}
