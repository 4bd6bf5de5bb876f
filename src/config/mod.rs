pub mod settings;

pub use settings::Settings;

use crate::error::{GraphCtlError, Result};
use crate::messages::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_FILE_NAME: &str = "GraphAPI_config.json";

/// Local record of an app registration created by graphctl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppRegistration {
    /// Display name, always `Automation-<slug>`
    pub name: String,

    /// Directory object id of the application
    pub id: String,

    pub client_id: String,

    #[serde(default)]
    pub description: String,

    pub created: DateTime<Utc>,

    #[serde(default)]
    pub permissions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_expiry: Option<DateTime<Utc>>,
}

impl AppRegistration {
    /// Slug the registration was created from (`Automation-reports` -> `reports`)
    pub fn slug(&self) -> &str {
        self.name
            .strip_prefix(crate::apps::DISPLAY_NAME_PREFIX)
            .unwrap_or(&self.name)
    }
}

/// Master app details written by `--setup`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterApp {
    pub client_id: String,
    pub configured: DateTime<Utc>,
}

/// Contents of `GraphAPI_config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub tenant_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_app: Option<MasterApp>,

    #[serde(default)]
    pub app_registrations: Vec<AppRegistration>,
}

impl OrchestratorConfig {
    pub fn find(&self, display_name: &str) -> Option<&AppRegistration> {
        self.app_registrations
            .iter()
            .find(|app| app.name == display_name)
    }

    pub fn find_mut(&mut self, display_name: &str) -> Option<&mut AppRegistration> {
        self.app_registrations
            .iter_mut()
            .find(|app| app.name == display_name)
    }
}

/// Reads and writes the registration file under an explicit root directory
#[derive(Debug, Clone)]
pub struct ConfigManager {
    root: PathBuf,
}

impl ConfigManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// Load the registration file, starting empty when it does not exist yet
    pub fn load_config(&self) -> Result<OrchestratorConfig> {
        let config_path = self.config_file();

        if !config_path.exists() {
            info!(path = %config_path.display(), "{}", Message::ConfigCreated);
            return Ok(OrchestratorConfig::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: OrchestratorConfig = serde_json::from_str(&contents).map_err(|e| {
            GraphCtlError::ConfigError(format!(
                "Invalid JSON in {}: {}",
                config_path.display(),
                e
            ))
        })?;

        info!(
            path = %config_path.display(),
            apps = config.app_registrations.len(),
            "{}",
            Message::ConfigLoaded
        );
        Ok(config)
    }

    /// Rewrite the whole registration file
    pub fn save_config(&self, config: &OrchestratorConfig) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }

        let config_path = self.config_file();
        let contents = serde_json::to_string_pretty(config)?;
        fs::write(&config_path, contents)?;

        info!(path = %config_path.display(), "{}", Message::ConfigSaved);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registration() -> AppRegistration {
        AppRegistration {
            name: "Automation-reports".into(),
            id: "obj-1".into(),
            client_id: "client-1".into(),
            description: "Weekly reports".into(),
            created: Utc::now(),
            permissions: vec!["User.Read.All".into()],
            secret_expiry: None,
        }
    }

    #[test]
    fn test_missing_file_loads_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::new(dir.path());
        let config = manager.load_config().unwrap();
        assert!(config.app_registrations.is_empty());
        assert!(config.tenant_id.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::new(dir.path());
        let config = OrchestratorConfig {
            tenant_id: "tenant-1".into(),
            master_app: None,
            app_registrations: vec![sample_registration()],
        };
        manager.save_config(&config).unwrap();

        let reloaded = manager.load_config().unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_file_layout_uses_snake_case_keys() {
        let config = OrchestratorConfig {
            tenant_id: "tenant-1".into(),
            master_app: None,
            app_registrations: vec![sample_registration()],
        };
        let json = serde_json::to_value(&config).unwrap();
        let app = &json["app_registrations"][0];
        assert_eq!(app["client_id"], "client-1");
        assert_eq!(app["permissions"][0], "User.Read.All");
        assert!(app.get("secret_expiry").is_none());
        assert!(json.get("master_app").is_none());
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();
        let manager = ConfigManager::new(dir.path());
        match manager.load_config() {
            Err(GraphCtlError::ConfigError(msg)) => assert!(msg.contains("Invalid JSON")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_find_by_display_name_and_slug() {
        let config = OrchestratorConfig {
            app_registrations: vec![sample_registration()],
            ..Default::default()
        };
        let app = config.find("Automation-reports").unwrap();
        assert_eq!(app.slug(), "reports");
        assert!(config.find("reports").is_none());
    }
}
