//! Tool settings from `graphctl.toml`
//!
//! Two files are merged key by key: the user config directory first, then the
//! working root, so a project can override personal defaults.

use crate::error::{GraphCtlError, Result};
use crate::graph::auth::MICROSOFT_AUTHORITY;
use crate::graph::GRAPH_API_BASE;
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE_NAME: &str = "graphctl.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub use_key_vault: bool,

    pub key_vault_url: Option<String>,

    /// `tracing` filter directive used when `--debug` is absent
    pub log_level: Option<String>,

    pub authority_url: String,

    pub graph_url: String,

    /// Output directory for generated modules, relative to the root
    pub modules_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_key_vault: false,
            key_vault_url: None,
            log_level: None,
            authority_url: MICROSOFT_AUTHORITY.to_string(),
            graph_url: GRAPH_API_BASE.to_string(),
            modules_dir: "api_modules".to_string(),
        }
    }
}

impl Settings {
    /// Load user-level then root-level settings files
    pub fn load(root: &Path) -> Result<Self> {
        let mut files = Vec::new();
        if let Some(dirs) = ProjectDirs::from("com", "graphctl", "graphctl") {
            files.push(dirs.config_dir().join(SETTINGS_FILE_NAME));
        }
        files.push(root.join(SETTINGS_FILE_NAME));

        Self::load_files(&files)
    }

    /// Merge the given files in order; missing files are skipped
    pub fn load_files(files: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();

        for path in files {
            if !path.exists() {
                continue;
            }

            let contents = fs::read_to_string(path)?;
            let table: toml::Table = toml::from_str(&contents).map_err(|e| {
                GraphCtlError::ConfigError(format!("Invalid TOML in {}: {}", path.display(), e))
            })?;
            for (key, value) in table {
                merged.insert(key, value);
            }
        }

        toml::Value::Table(merged)
            .try_into()
            .map_err(|e| GraphCtlError::ConfigError(format!("Invalid settings: {}", e)))
    }
}
