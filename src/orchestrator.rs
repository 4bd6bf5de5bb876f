//! Wires configuration, credentials, auth and transport for one run
//!
//! Everything is built from [`OrchestratorOptions`]; nothing is global, so a
//! test can run several orchestrators side by side against different roots.

use crate::apps::{AppManager, CreateOutcome, RotationOutcome};
use crate::config::{AppRegistration, ConfigManager, MasterApp, Settings};
use crate::credentials::{Credential, CredentialStore, InMemoryVault, KeyVaultClient, SecretVault};
use crate::error::Result;
use crate::generator::{GeneratedModule, ModuleGenerator};
use crate::graph::auth::GraphAuth;
use crate::graph::{DryRunTransport, GraphTransport, HttpTransport};
use crate::messages::Message;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub root: PathBuf,
    pub settings: Settings,
    pub dry_run: bool,
    /// Identity used to reach Key Vault when `settings.use_key_vault` is set
    pub vault_credential: Option<Credential>,
}

impl OrchestratorOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            settings: Settings::default(),
            dry_run: false,
            vault_credential: None,
        }
    }
}

pub struct Orchestrator {
    root: PathBuf,
    dry_run: bool,
    config_manager: ConfigManager,
    auth: Arc<GraphAuth>,
    store: Arc<CredentialStore>,
    apps: AppManager,
    generator: ModuleGenerator,
}

impl Orchestrator {
    /// Build with the vault implied by `options`
    pub fn new(options: OrchestratorOptions) -> Result<Self> {
        let auth = Arc::new(auth_for(&options));
        let vault = select_vault(
            &options.settings,
            options.dry_run,
            options.vault_credential.clone(),
            &auth,
        );
        Self::assemble(options, auth, vault)
    }

    /// Build with an explicit vault backend, or none
    pub fn with_vault(
        options: OrchestratorOptions,
        vault: Option<Arc<dyn SecretVault>>,
    ) -> Result<Self> {
        let auth = Arc::new(auth_for(&options));
        Self::assemble(options, auth, vault)
    }

    fn assemble(
        options: OrchestratorOptions,
        auth: Arc<GraphAuth>,
        vault: Option<Arc<dyn SecretVault>>,
    ) -> Result<Self> {
        let OrchestratorOptions {
            root,
            settings,
            dry_run,
            ..
        } = options;

        let transport: Arc<dyn GraphTransport> = if dry_run {
            Arc::new(DryRunTransport::new())
        } else {
            Arc::new(HttpTransport::new(&settings.graph_url))
        };

        let mut store = CredentialStore::new(&root);
        if let Some(vault) = vault {
            store = store.with_vault(vault);
        }
        let store = Arc::new(store);

        let config_manager = ConfigManager::new(&root);
        let config = config_manager.load_config()?;

        let generator = ModuleGenerator::new(root.join(&settings.modules_dir), store.has_vault())
            .with_authority(&settings.authority_url);

        let apps = AppManager::new(config, Arc::clone(&auth), Arc::clone(&store), transport);

        Ok(Self {
            root,
            dry_run,
            config_manager,
            auth,
            store,
            apps,
            generator,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn uses_vault(&self) -> bool {
        self.store.has_vault()
    }

    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    /// Verify and persist the master app credential
    pub async fn setup_master(
        &mut self,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
    ) -> Result<()> {
        info!(tenant_id, client_id, "{}", Message::MasterSetupStart);

        if self.dry_run {
            info!("{}", Message::MasterVerifySkipped);
        } else {
            let credential = Credential::new(tenant_id, client_id, client_secret);
            self.auth.get_token(&credential, &[], true).await?;
        }

        self.store
            .save_master_credential(tenant_id, client_id, client_secret)
            .await?;

        let config = self.apps.config_mut();
        config.tenant_id = tenant_id.to_string();
        config.master_app = Some(MasterApp {
            client_id: client_id.to_string(),
            configured: Utc::now(),
        });
        self.config_manager.save_config(self.apps.config())?;

        info!("{}", Message::MasterSetupSuccess);
        Ok(())
    }

    pub async fn create_app(
        &mut self,
        name: &str,
        description: Option<&str>,
        permissions: &[String],
    ) -> Result<CreateOutcome> {
        let outcome = self
            .apps
            .create_app_registration(name, description, permissions)
            .await?;

        if let CreateOutcome::Created { .. } = outcome {
            self.config_manager.save_config(self.apps.config())?;
        }
        Ok(outcome)
    }

    pub fn list_apps(&self) -> &[AppRegistration] {
        self.apps.list_app_registrations()
    }

    pub async fn rotate_secret(&mut self, name: &str) -> Result<RotationOutcome> {
        let outcome = self.apps.rotate_client_secret(name).await?;
        self.config_manager.save_config(self.apps.config())?;
        Ok(outcome)
    }

    pub fn generate_module(&self, name: &str, scopes: &[String]) -> Result<GeneratedModule> {
        self.generator
            .generate_module(self.apps.list_app_registrations(), name, scopes)
    }
}

fn auth_for(options: &OrchestratorOptions) -> GraphAuth {
    if options.dry_run {
        GraphAuth::dry_run()
    } else {
        GraphAuth::new(&options.settings.authority_url)
    }
}

fn select_vault(
    settings: &Settings,
    dry_run: bool,
    credential: Option<Credential>,
    auth: &Arc<GraphAuth>,
) -> Option<Arc<dyn SecretVault>> {
    if !settings.use_key_vault {
        return None;
    }

    if dry_run {
        info!("{} key vault (in-memory)", Message::DryRunCall);
        return Some(Arc::new(InMemoryVault::new()));
    }

    match (settings.key_vault_url.as_deref(), credential) {
        (Some(url), Some(credential)) if credential.is_complete() => {
            info!(vault = url, "Key Vault enabled");
            Some(Arc::new(KeyVaultClient::new(url, credential, Arc::clone(auth))))
        }
        (None, _) => {
            warn!("{}: no Key Vault URL configured", Message::VaultDisabled);
            None
        }
        _ => {
            warn!("{}: no Key Vault credential provided", Message::VaultDisabled);
            None
        }
    }
}
