// Application settings
// Loaded from ~/.config/gridhub/settings.json

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::kv::KvStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Override for the durable store location. None = platform data dir.
    #[serde(rename = "store.path")]
    pub store_path: Option<PathBuf>,

    /// Directory exports are written into. None = current directory.
    #[serde(rename = "export.dir")]
    pub export_dir: Option<PathBuf>,
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("gridhub").join("settings.json"))
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// malformed.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                tracing::warn!("ignoring malformed settings file: {err}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Get the effective durable store path (user-specified or default).
    pub fn effective_store_path(&self) -> PathBuf {
        self.store_path.clone().unwrap_or_else(KvStore::default_path)
    }

    /// Get the effective export directory (user-specified or cwd).
    pub fn effective_export_dir(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
