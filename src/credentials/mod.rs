//! Master and per-app credential persistence
//!
//! Credentials are written to `KEY=VALUE` files under the root directory and,
//! when a vault is configured, mirrored to it. Reads prefer the vault and fall
//! back to the local file, so a vault outage never blocks an operation.

pub mod vault;

pub use vault::{InMemoryVault, KeyVaultClient, SecretVault};

use crate::error::{GraphCtlError, Result};
use crate::messages::Message;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const MASTER_FILE_NAME: &str = ".env.master";
const GITIGNORE_HEADER: &str = "# GraphAPI secret files";

const MASTER_TENANT_KEY: &str = "MASTER_TENANT_ID";
const MASTER_CLIENT_KEY: &str = "MASTER_CLIENT_ID";
const MASTER_SECRET_KEY: &str = "MASTER_CLIENT_SECRET";
const APP_TENANT_KEY: &str = "TENANT_ID";

const VAULT_MASTER_TENANT: &str = "master-tenant-id";
const VAULT_MASTER_CLIENT: &str = "master-client-id";
const VAULT_MASTER_SECRET: &str = "master-client-secret";
const VAULT_APP_TENANT: &str = "tenant-id";

/// Client-credentials identity for the master app or a generated app
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            expiry: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.tenant_id.trim().is_empty()
            && !self.client_id.trim().is_empty()
            && !self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Environment-variable prefix for an app slug (`example-sharepoint` -> `EXAMPLE_SHAREPOINT`)
pub fn env_prefix(name: &str) -> String {
    name.replace('-', "_").to_uppercase()
}

/// Vault-safe secret name prefix for an app slug (vault names forbid `_`)
pub fn vault_prefix(name: &str) -> String {
    name.replace('_', "-")
}

pub fn app_file_name(name: &str) -> String {
    format!(".env.{}.secret", name)
}

pub struct CredentialStore {
    root: PathBuf,
    vault: Option<Arc<dyn SecretVault>>,
}

impl CredentialStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            vault: None,
        }
    }

    pub fn with_vault(mut self, vault: Arc<dyn SecretVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn has_vault(&self) -> bool {
        self.vault.is_some()
    }

    pub fn master_file(&self) -> PathBuf {
        self.root.join(MASTER_FILE_NAME)
    }

    pub fn app_file(&self, name: &str) -> PathBuf {
        self.root.join(app_file_name(name))
    }

    pub async fn save_master_credential(
        &self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<()> {
        self.write_env_file(
            MASTER_FILE_NAME,
            &[
                (MASTER_TENANT_KEY, tenant_id),
                (MASTER_CLIENT_KEY, client_id),
                (MASTER_SECRET_KEY, client_secret),
            ],
        )?;

        self.save_to_vault(&[
            (VAULT_MASTER_TENANT.to_string(), tenant_id),
            (VAULT_MASTER_CLIENT.to_string(), client_id),
            (VAULT_MASTER_SECRET.to_string(), client_secret),
        ])
        .await;

        Ok(())
    }

    pub async fn get_master_credential(&self) -> Result<Credential> {
        if let Some([tenant_id, client_id, secret]) = self
            .read_from_vault([VAULT_MASTER_TENANT, VAULT_MASTER_CLIENT, VAULT_MASTER_SECRET])
            .await
        {
            info!(source = "key vault", "{} (master)", Message::SecretsLoaded);
            return Ok(Credential::new(tenant_id, client_id, secret));
        }

        let path = self.master_file();
        let vars = read_env_file(&path)
            .ok_or_else(|| GraphCtlError::MissingCredentials("master app".into()))?;

        let credential = Credential::new(
            vars.get(MASTER_TENANT_KEY).cloned().unwrap_or_default(),
            vars.get(MASTER_CLIENT_KEY).cloned().unwrap_or_default(),
            vars.get(MASTER_SECRET_KEY).cloned().unwrap_or_default(),
        );

        if !credential.is_complete() {
            warn!(path = %path.display(), "{} (master, incomplete)", Message::SecretsMissing);
            return Err(GraphCtlError::MissingCredentials(format!(
                "master app ({} is incomplete)",
                MASTER_FILE_NAME
            )));
        }

        info!(path = %path.display(), "{} (master)", Message::SecretsLoaded);
        Ok(credential)
    }

    pub async fn save_app_credential(
        &self,
        name: &str,
        client_id: &str,
        client_secret: &str,
        tenant_id: &str,
    ) -> Result<()> {
        let prefix = env_prefix(name);
        let client_key = format!("{}_CLIENT_ID", prefix);
        let secret_key = format!("{}_CLIENT_SECRET", prefix);

        self.write_env_file(
            &app_file_name(name),
            &[
                (client_key.as_str(), client_id),
                (secret_key.as_str(), client_secret),
                (APP_TENANT_KEY, tenant_id),
            ],
        )?;

        let vault_name = vault_prefix(name);
        self.save_to_vault(&[
            (format!("{}-client-id", vault_name), client_id),
            (format!("{}-client-secret", vault_name), client_secret),
            (VAULT_APP_TENANT.to_string(), tenant_id),
        ])
        .await;

        Ok(())
    }

    pub async fn get_app_credential(&self, name: &str) -> Result<Credential> {
        let vault_name = vault_prefix(name);
        let client_name = format!("{}-client-id", vault_name);
        let secret_name = format!("{}-client-secret", vault_name);

        if let Some([client_id, secret, tenant_id]) = self
            .read_from_vault([client_name.as_str(), secret_name.as_str(), VAULT_APP_TENANT])
            .await
        {
            info!(app = name, source = "key vault", "{}", Message::SecretsLoaded);
            return Ok(Credential::new(tenant_id, client_id, secret));
        }

        let path = self.app_file(name);
        let vars = read_env_file(&path)
            .ok_or_else(|| GraphCtlError::MissingCredentials(format!("app '{}'", name)))?;

        let prefix = env_prefix(name);
        let credential = Credential::new(
            vars.get(APP_TENANT_KEY).cloned().unwrap_or_default(),
            vars.get(&format!("{}_CLIENT_ID", prefix))
                .cloned()
                .unwrap_or_default(),
            vars.get(&format!("{}_CLIENT_SECRET", prefix))
                .cloned()
                .unwrap_or_default(),
        );

        if !credential.is_complete() {
            warn!(app = name, path = %path.display(), "{} (incomplete)", Message::SecretsMissing);
            return Err(GraphCtlError::MissingCredentials(format!(
                "app '{}' ({} is incomplete)",
                name,
                app_file_name(name)
            )));
        }

        info!(app = name, path = %path.display(), "{}", Message::SecretsLoaded);
        Ok(credential)
    }

    fn write_env_file(&self, file_name: &str, entries: &[(&str, &str)]) -> Result<()> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
        }

        let mut content = format!("# Generated: {}\n", Utc::now().to_rfc3339());
        content.push_str("# DO NOT COMMIT THIS FILE\n\n");
        for (key, value) in entries {
            content.push_str(&format!("{}={}\n", key, value));
        }

        let path = self.root.join(file_name);
        let mut file = open_private(&path)?;
        file.write_all(content.as_bytes())?;

        info!(path = %path.display(), "{}", Message::SecretsSaved);
        self.update_gitignore(file_name)
    }

    /// Append the file name to `.gitignore` unless it is already listed
    fn update_gitignore(&self, file_name: &str) -> Result<()> {
        let gitignore = self.root.join(".gitignore");

        if gitignore.exists() {
            let content = fs::read_to_string(&gitignore)?;
            if content.lines().any(|line| line.trim() == file_name) {
                return Ok(());
            }
            let mut file = fs::OpenOptions::new().append(true).open(&gitignore)?;
            let separator = if content.is_empty() || content.ends_with('\n') {
                ""
            } else {
                "\n"
            };
            write!(file, "{}\n{}\n{}\n", separator, GITIGNORE_HEADER, file_name)?;
        } else {
            fs::write(&gitignore, format!("{}\n{}\n", GITIGNORE_HEADER, file_name))?;
        }

        Ok(())
    }

    async fn save_to_vault(&self, entries: &[(String, &str)]) {
        let Some(vault) = &self.vault else {
            return;
        };

        for (name, value) in entries {
            match vault.set_secret(name, value).await {
                Ok(()) => info!(secret = %name, "{} (key vault)", Message::SecretsSaved),
                Err(e) => warn!(secret = %name, error = %e, "{}", Message::VaultWriteFailed),
            }
        }
    }

    async fn read_from_vault(&self, names: [&str; 3]) -> Option<[String; 3]> {
        let vault = self.vault.as_ref()?;

        let mut values: [String; 3] = Default::default();
        for (slot, name) in values.iter_mut().zip(names) {
            match vault.get_secret(name).await {
                Ok(value) if !value.trim().is_empty() => *slot = value,
                Ok(_) => {
                    warn!(secret = name, "{} (empty value)", Message::VaultReadFailed);
                    return None;
                }
                Err(e) => {
                    warn!(secret = name, error = %e, "{}", Message::VaultReadFailed);
                    return None;
                }
            }
        }

        Some(values)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Read a secrets file, returning `None` when it is missing or unreadable
fn read_env_file(path: &Path) -> Option<HashMap<String, String>> {
    if !path.exists() {
        warn!(path = %path.display(), "{}", Message::SecretsMissing);
        return None;
    }

    match fs::read_to_string(path) {
        Ok(contents) => Some(parse_env_file(&contents)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "{}", Message::SecretsMissing);
            None
        }
    }
}

/// Parse simple .env file format
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();

            let value = if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                &value[1..value.len() - 1]
            } else {
                value
            };

            vars.insert(key.trim().to_string(), value.to_string());
        }
    }

    vars
}
