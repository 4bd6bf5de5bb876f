//! App registration lifecycle
//!
//! Creation walks `Requested -> Created -> SecretIssued -> PermissionsAttached
//! -> Persisted`. Token, create and secret failures end the walk; a
//! permission that cannot be granted is reported and skipped. Remote objects
//! left behind by a failure after `Created` are not deleted.

use crate::config::{AppRegistration, OrchestratorConfig};
use crate::credentials::{env_prefix, CredentialStore};
use crate::error::{GraphCtlError, Result};
use crate::graph::applications::{grant_graph_role, CreateApplicationRequest, ServicePrincipal};
use crate::graph::auth::{GraphAuth, DRY_RUN_TENANT};
use crate::graph::{GraphClient, GraphTransport};
use crate::messages::Message;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const DISPLAY_NAME_PREFIX: &str = "Automation-";
pub const SECRET_VALIDITY_DAYS: i64 = 365;

pub fn display_name(name: &str) -> String {
    format!("{}{}", DISPLAY_NAME_PREFIX, name)
}

/// App names end up in file names and environment variable names
pub fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(GraphCtlError::ConfigError(format!(
            "Invalid app name '{}': use letters, digits, '-' or '_'",
            name
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStage {
    NotRequested,
    Requested,
    Created,
    SecretIssued,
    PermissionsAttached,
    Persisted,
}

impl CreationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreationStage::NotRequested => "not requested",
            CreationStage::Requested => "requested",
            CreationStage::Created => "created",
            CreationStage::SecretIssued => "secret issued",
            CreationStage::PermissionsAttached => "permissions attached",
            CreationStage::Persisted => "persisted",
        }
    }

    /// Step that runs after this stage, used in failure reports
    fn next_step(&self) -> &'static str {
        match self {
            CreationStage::NotRequested | CreationStage::Requested => "application creation",
            CreationStage::Created => "secret creation",
            CreationStage::SecretIssued => "permission assignment",
            CreationStage::PermissionsAttached => "credential persistence",
            CreationStage::Persisted => "nothing",
        }
    }
}

#[derive(Debug)]
pub enum CreateOutcome {
    /// Already in the local configuration; nothing was sent to Graph
    AlreadyExists(AppRegistration),
    Created {
        registration: AppRegistration,
        /// Requested permissions that could not be granted
        rejected_permissions: Vec<String>,
    },
}

impl CreateOutcome {
    pub fn registration(&self) -> &AppRegistration {
        match self {
            CreateOutcome::AlreadyExists(registration) => registration,
            CreateOutcome::Created { registration, .. } => registration,
        }
    }
}

#[derive(Debug)]
pub struct RotationOutcome {
    pub registration: AppRegistration,
    pub expires_at: DateTime<Utc>,
}

struct IssuedSecret {
    text: String,
    expires_at: DateTime<Utc>,
}

pub struct AppManager {
    config: OrchestratorConfig,
    auth: Arc<GraphAuth>,
    store: Arc<CredentialStore>,
    transport: Arc<dyn GraphTransport>,
}

impl AppManager {
    pub fn new(
        config: OrchestratorConfig,
        auth: Arc<GraphAuth>,
        store: Arc<CredentialStore>,
        transport: Arc<dyn GraphTransport>,
    ) -> Self {
        Self {
            config,
            auth,
            store,
            transport,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut OrchestratorConfig {
        &mut self.config
    }

    pub fn list_app_registrations(&self) -> &[AppRegistration] {
        &self.config.app_registrations
    }

    pub async fn create_app_registration(
        &mut self,
        name: &str,
        description: Option<&str>,
        permissions: &[String],
    ) -> Result<CreateOutcome> {
        validate_name(name)?;
        let display_name = display_name(name);

        if let Some(existing) = self.config.find(&display_name) {
            info!(app = %display_name, "{}", Message::AppExists);
            return Ok(CreateOutcome::AlreadyExists(existing.clone()));
        }
        self.ensure_distinct_credentials(name)?;

        let mut stage = CreationStage::Requested;
        debug!(app = %display_name, stage = stage.as_str());

        let token = self.auth.get_master_token(&self.store).await.map_err(|e| {
            error!(app = %display_name, error = %e, "{}: master token unavailable", Message::AppCreationFailure);
            e
        })?;
        let graph = GraphClient::new(Arc::clone(&self.transport), token.value);

        info!(app = %display_name, "{}", Message::AppCreationStart);
        let created = graph
            .create_application(&CreateApplicationRequest::new(&display_name, description))
            .await
            .map_err(|e| {
                error!(app = %display_name, error = %e, "{}", Message::AppCreationFailure);
                e
            })?;

        let (object_id, client_id) = match (created.id, created.app_id) {
            (Some(id), Some(app_id)) if !id.is_empty() && !app_id.is_empty() => (id, app_id),
            _ => {
                error!(app = %display_name, "{}: response lacks id or appId", Message::AppCreationFailure);
                return Err(GraphCtlError::UnexpectedResponse(
                    "create application response is missing id or appId".into(),
                ));
            }
        };
        stage = CreationStage::Created;
        info!(app = %display_name, object_id = %object_id, "{}", Message::AppCreated);

        let secret = match self.create_client_secret(&graph, &object_id).await {
            Ok(secret) => secret,
            Err(e) => return Err(orphaned(&display_name, &object_id, &client_id, stage, e)),
        };
        stage = CreationStage::SecretIssued;
        debug!(app = %display_name, stage = stage.as_str());

        let (attached, rejected_permissions) =
            self.attach_permissions(&graph, &object_id, permissions).await;
        stage = CreationStage::PermissionsAttached;
        debug!(app = %display_name, stage = stage.as_str(), attached = attached.len());

        let tenant_id = self.app_tenant().await;
        if let Err(e) = self
            .store
            .save_app_credential(name, &client_id, &secret.text, &tenant_id)
            .await
        {
            return Err(orphaned(&display_name, &object_id, &client_id, stage, e));
        }

        let registration = AppRegistration {
            name: display_name.clone(),
            id: object_id,
            client_id,
            description: description.unwrap_or_default().to_string(),
            created: Utc::now(),
            permissions: attached,
            secret_expiry: Some(secret.expires_at),
        };
        self.config.app_registrations.push(registration.clone());
        stage = CreationStage::Persisted;
        debug!(app = %display_name, stage = stage.as_str());

        Ok(CreateOutcome::Created {
            registration,
            rejected_permissions,
        })
    }

    /// Issue a new secret for an existing app; the previous one stays valid until it expires
    pub async fn rotate_client_secret(&mut self, name: &str) -> Result<RotationOutcome> {
        let display_name = display_name(name);

        let (object_id, client_id) = match self.config.find(&display_name) {
            Some(app) => (app.id.clone(), app.client_id.clone()),
            None => {
                error!(app = %display_name, "{}: not in configuration", Message::SecretFailure);
                return Err(GraphCtlError::NotFound(display_name));
            }
        };

        let token = self.auth.get_master_token(&self.store).await?;
        let graph = GraphClient::new(Arc::clone(&self.transport), token.value);

        let secret = self.create_client_secret(&graph, &object_id).await?;

        let tenant_id = self.app_tenant().await;
        self.store
            .save_app_credential(name, &client_id, &secret.text, &tenant_id)
            .await?;

        let registration = match self.config.find_mut(&display_name) {
            Some(app) => {
                app.secret_expiry = Some(secret.expires_at);
                app.clone()
            }
            None => return Err(GraphCtlError::NotFound(display_name)),
        };

        info!(app = %display_name, "{}", Message::SecretRotated);
        Ok(RotationOutcome {
            registration,
            expires_at: secret.expires_at,
        })
    }

    /// `a-b`, `a_b` and `A_B` share env variable and vault secret names
    fn ensure_distinct_credentials(&self, name: &str) -> Result<()> {
        let prefix = env_prefix(name);
        let clash = self.config.app_registrations.iter().find(|app| {
            app.name
                .strip_prefix(DISPLAY_NAME_PREFIX)
                .is_some_and(|existing| env_prefix(existing) == prefix)
        });

        match clash {
            Some(app) => {
                error!(app = %display_name(name), existing = %app.name, "{}: credential names collide", Message::AppCreationFailure);
                Err(GraphCtlError::ConfigError(format!(
                    "App name '{}' would share credentials with '{}'",
                    name, app.name
                )))
            }
            None => Ok(()),
        }
    }

    /// Tenant written next to app secrets: config, then master credential
    async fn app_tenant(&self) -> String {
        if !self.config.tenant_id.trim().is_empty() {
            return self.config.tenant_id.clone();
        }

        if let Ok(master) = self.store.get_master_credential().await {
            return master.tenant_id;
        }

        if self.auth.is_dry_run() {
            return DRY_RUN_TENANT.to_string();
        }

        warn!("{}: tenant id unknown, run --setup first", Message::SecretsMissing);
        String::new()
    }

    async fn create_client_secret(
        &self,
        graph: &GraphClient,
        object_id: &str,
    ) -> Result<IssuedSecret> {
        let now = Utc::now();
        let label = format!("Secret-{}", now.format("%Y%m%d"));
        let requested_end = now + chrono::Duration::days(SECRET_VALIDITY_DAYS);

        let credential = graph
            .add_password(object_id, &label, requested_end)
            .await
            .map_err(|e| {
                error!(object_id, error = %e, "{}", Message::SecretFailure);
                e
            })?;

        let text = credential
            .secret_text
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                error!(object_id, "{}: no secretText in response", Message::SecretFailure);
                GraphCtlError::UnexpectedResponse("addPassword response has no secretText".into())
            })?;

        info!(object_id, "{}", Message::SecretCreated);
        Ok(IssuedSecret {
            text,
            expires_at: credential.end_date_time.unwrap_or(requested_end),
        })
    }

    /// Grant each permission independently; returns (granted, rejected)
    async fn attach_permissions(
        &self,
        graph: &GraphClient,
        object_id: &str,
        permissions: &[String],
    ) -> (Vec<String>, Vec<String>) {
        let mut requested: Vec<String> = Vec::new();
        for permission in permissions {
            if !requested.contains(permission) {
                requested.push(permission.clone());
            }
        }

        if requested.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let service_principal = match graph.graph_service_principal().await {
            Ok(sp) => sp,
            Err(e) => {
                error!(error = %e, "{}", Message::ServicePrincipalFailure);
                return (Vec::new(), requested);
            }
        };

        let mut attached = Vec::new();
        let mut rejected = Vec::new();

        for permission in requested {
            match self
                .add_permission(graph, object_id, &service_principal, &permission)
                .await
            {
                Ok(()) => attached.push(permission),
                Err(e) => {
                    warn!(permission = %permission, error = %e, "{}", Message::PermissionFailure);
                    rejected.push(permission);
                }
            }
        }

        (attached, rejected)
    }

    async fn add_permission(
        &self,
        graph: &GraphClient,
        object_id: &str,
        service_principal: &ServicePrincipal,
        permission: &str,
    ) -> Result<()> {
        let role_id = service_principal.app_role_id(permission).ok_or_else(|| {
            warn!(permission, "{}", Message::PermissionNotFound);
            GraphCtlError::UnexpectedResponse(format!(
                "Microsoft Graph has no application permission named {}",
                permission
            ))
        })?;

        let application = graph.get_application(object_id).await?;
        let mut access = application.required_resource_access;

        if !grant_graph_role(&mut access, role_id) {
            info!(permission, "{}", Message::PermissionExists);
            return Ok(());
        }

        graph.set_required_resource_access(object_id, &access).await?;
        info!(permission, "{}", Message::PermissionAdded);
        Ok(())
    }
}

fn orphaned(
    display_name: &str,
    object_id: &str,
    client_id: &str,
    stage: CreationStage,
    cause: GraphCtlError,
) -> GraphCtlError {
    warn!(
        app = display_name,
        object_id,
        client_id,
        stage = stage.as_str(),
        "{}",
        Message::AppOrphaned
    );
    GraphCtlError::Incomplete {
        display_name: display_name.to_string(),
        object_id: object_id.to_string(),
        client_id: client_id.to_string(),
        stage: stage.next_step().to_string(),
        reason: cause.to_string(),
    }
}
