//! Secret vault backends

use crate::credentials::Credential;
use crate::error::{GraphCtlError, Result};
use crate::graph::auth::GraphAuth;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const KEY_VAULT_SCOPE: &str = "https://vault.azure.net/.default";
const KEY_VAULT_API_VERSION: &str = "7.4";

#[async_trait]
pub trait SecretVault: Send + Sync {
    async fn set_secret(&self, name: &str, value: &str) -> Result<()>;

    /// Fetch a secret value; a missing secret is an error
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Azure Key Vault secrets API, authenticated as a service principal
pub struct KeyVaultClient {
    client: Client,
    vault_url: String,
    credential: Credential,
    auth: Arc<GraphAuth>,
}

#[derive(Serialize)]
struct SetSecretRequest<'a> {
    value: &'a str,
}

#[derive(Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

impl KeyVaultClient {
    pub fn new(vault_url: &str, credential: Credential, auth: Arc<GraphAuth>) -> Self {
        Self {
            client: Client::new(),
            vault_url: vault_url.trim_end_matches('/').to_string(),
            credential,
            auth,
        }
    }

    fn secret_url(&self, name: &str) -> String {
        format!(
            "{}/secrets/{}?api-version={}",
            self.vault_url, name, KEY_VAULT_API_VERSION
        )
    }

    async fn access_token(&self) -> Result<String> {
        let token = self
            .auth
            .get_token(&self.credential, &[KEY_VAULT_SCOPE.to_string()], false)
            .await?;
        Ok(token.value)
    }
}

#[async_trait]
impl SecretVault for KeyVaultClient {
    async fn set_secret(&self, name: &str, value: &str) -> Result<()> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .put(self.secret_url(name))
            .bearer_auth(token)
            .json(&SetSecretRequest { value })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphCtlError::VaultError(format!(
                "set '{}' failed with HTTP {}: {}",
                name, status, body
            )));
        }

        Ok(())
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        let token = self.access_token().await?;
        let resp = self
            .client
            .get(self.secret_url(name))
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GraphCtlError::VaultError(format!(
                "get '{}' failed with HTTP {}: {}",
                name, status, body
            )));
        }

        let bundle: SecretBundle = resp.json().await?;
        bundle
            .value
            .ok_or_else(|| GraphCtlError::VaultError(format!("secret '{}' has no value", name)))
    }
}

/// Process-local vault used in dry runs and tests
#[derive(Default)]
pub struct InMemoryVault {
    secrets: Mutex<HashMap<String, String>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.secrets.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(name)
    }
}

#[async_trait]
impl SecretVault for InMemoryVault {
    async fn set_secret(&self, name: &str, value: &str) -> Result<()> {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| GraphCtlError::VaultError(format!("secret '{}' not found", name)))
    }
}
