use crate::credentials::{Credential, CredentialStore};
use crate::error::{GraphCtlError, Result};
use crate::messages::Message;
use chrono::{DateTime, Utc};
use oauth2::{
    basic::BasicClient, reqwest::async_http_client, AuthType, AuthUrl, ClientId, ClientSecret,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, error, info};

pub const MICROSOFT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
pub const DRY_RUN_TOKEN: &str = "dry-run-token-123456789";
pub const DRY_RUN_TENANT: &str = "dry-run-tenant";

/// Lifetime assumed when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

/// Short-lived access token, never persisted
#[derive(Clone)]
pub struct BearerToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Client-credentials token acquisition with an in-memory cache
pub struct GraphAuth {
    authority: String,
    dry_run: bool,
    cache: Mutex<HashMap<String, BearerToken>>,
}

impl GraphAuth {
    pub fn new(authority: &str) -> Self {
        Self {
            authority: authority.trim_end_matches('/').to_string(),
            dry_run: false,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Token exchange that never leaves the process
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::new(MICROSOFT_AUTHORITY)
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn token_url(&self, tenant_id: &str) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, tenant_id)
    }

    /// Get a token for `credential`, reusing the cached one until it expires
    pub async fn get_token(
        &self,
        credential: &Credential,
        scopes: &[String],
        force_refresh: bool,
    ) -> Result<BearerToken> {
        if !credential.is_complete() {
            error!("{}: incomplete credential", Message::TokenFailure);
            return Err(GraphCtlError::AuthError {
                code: "missing_credentials".into(),
                description: "tenant id, client id and client secret are all required".into(),
            });
        }

        let scopes: Vec<String> = if scopes.is_empty() {
            vec![GRAPH_SCOPE.to_string()]
        } else {
            scopes.to_vec()
        };
        let cache_key = format!("{}|{}|{}", credential.tenant_id, credential.client_id, scopes.join(" "));

        if !force_refresh {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(token) = cache.get(&cache_key).filter(|t| !t.is_expired()) {
                debug!(client_id = %credential.client_id, "{}", Message::TokenCached);
                return Ok(token.clone());
            }
        }

        let token = if self.dry_run {
            info!(client_id = %credential.client_id, "{} token request", Message::DryRunCall);
            BearerToken {
                value: DRY_RUN_TOKEN.to_string(),
                expires_at: Utc::now() + chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
            }
        } else {
            self.exchange_client_credentials(credential, &scopes).await?
        };

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cache_key, token.clone());

        Ok(token)
    }

    /// Token for the master app registration
    pub async fn get_master_token(&self, store: &CredentialStore) -> Result<BearerToken> {
        if self.dry_run {
            let placeholder = Credential::new(DRY_RUN_TENANT, "dry-run-master", "dry-run-secret");
            return self.get_token(&placeholder, &[], false).await;
        }

        let credential = store.get_master_credential().await?;
        self.get_token(&credential, &[], false).await
    }

    /// Token for an app created by graphctl
    pub async fn get_app_token(
        &self,
        store: &CredentialStore,
        name: &str,
        scopes: &[String],
    ) -> Result<BearerToken> {
        let credential = store.get_app_credential(name).await?;
        self.get_token(&credential, scopes, false).await
    }

    async fn exchange_client_credentials(
        &self,
        credential: &Credential,
        scopes: &[String],
    ) -> Result<BearerToken> {
        let tenant_id = &credential.tenant_id;
        let client_id = ClientId::new(credential.client_id.clone());
        let client_secret = ClientSecret::new(credential.client_secret.clone());

        let auth_url = AuthUrl::new(format!(
            "{}/{}/oauth2/v2.0/authorize",
            self.authority, tenant_id
        ))
        .map_err(|e| GraphCtlError::ConfigError(format!("Invalid auth URL: {}", e)))?;

        let token_url = TokenUrl::new(self.token_url(tenant_id))
            .map_err(|e| GraphCtlError::ConfigError(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(client_id, Some(client_secret), auth_url, Some(token_url))
            .set_auth_type(AuthType::RequestBody);

        let mut request = client.exchange_client_credentials();
        for scope in scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let token = request
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                let err = match e {
                    RequestTokenError::ServerResponse(resp) => GraphCtlError::AuthError {
                        code: resp.error().to_string(),
                        description: resp.error_description().cloned().unwrap_or_default(),
                    },
                    other => GraphCtlError::AuthError {
                        code: "token_request_failed".into(),
                        description: other.to_string(),
                    },
                };
                error!(client_id = %credential.client_id, error = %err, "{}", Message::TokenFailure);
                err
            })?;

        let lifetime = token
            .expires_in()
            .and_then(|d| chrono::Duration::from_std(d).ok())
            .unwrap_or_else(|| chrono::Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS));

        info!(client_id = %credential.client_id, "{}", Message::TokenAcquired);

        Ok(BearerToken {
            value: token.access_token().secret().clone(),
            expires_at: Utc::now() + lifetime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dry_run_token_is_fixed() {
        let auth = GraphAuth::dry_run();
        let credential = Credential::new("tid", "cid", "secret");
        let token = auth.get_token(&credential, &[], false).await.unwrap();
        assert_eq!(token.value, DRY_RUN_TOKEN);
        assert!(!token.is_expired());
    }

    #[tokio::test]
    async fn test_incomplete_credential_is_auth_error() {
        let auth = GraphAuth::dry_run();
        let credential = Credential::new("tid", "", "secret");
        match auth.get_token(&credential, &[], false).await {
            Err(GraphCtlError::AuthError { code, .. }) => assert_eq!(code, "missing_credentials"),
            other => panic!("expected auth error, got {:?}", other),
        }
    }

    #[test]
    fn test_token_url() {
        let auth = GraphAuth::new("https://login.microsoftonline.com/");
        assert_eq!(
            auth.token_url("contoso"),
            "https://login.microsoftonline.com/contoso/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_expired_token() {
        let token = BearerToken {
            value: "t".into(),
            expires_at: Utc::now() - chrono::Duration::seconds(1),
        };
        assert!(token.is_expired());
        assert!(!format!("{:?}", token).contains("\"t\""));
    }
}
