//! Application registration endpoints
//!
//! Covers the Graph calls graphctl needs: create and read an application,
//! replace its `requiredResourceAccess`, mint a password credential, and look
//! up app roles on the Microsoft Graph service principal.

use crate::error::{GraphCtlError, Result};
use crate::graph::{GraphClient, PaginatedResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known appId of the Microsoft Graph resource
pub const MICROSOFT_GRAPH_APP_ID: &str = "00000003-0000-0000-c000-000000000000";

/// `resourceAccess.type` for application permissions
pub const APP_ROLE_TYPE: &str = "Role";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub display_name: String,
    pub sign_in_audience: String,
    pub api: ApiSettings,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSettings {
    pub requested_access_token_version: u8,
}

impl CreateApplicationRequest {
    /// Single-tenant application tagged as automation-managed
    pub fn new(display_name: &str, description: Option<&str>) -> Self {
        Self {
            display_name: display_name.to_string(),
            sign_in_audience: "AzureADMyOrg".to_string(),
            api: ApiSettings {
                requested_access_token_version: 2,
            },
            tags: vec!["Automation".to_string(), "GraphAPI".to_string()],
            notes: description
                .filter(|d| !d.trim().is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub required_resource_access: Vec<RequiredResourceAccess>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredResourceAccess {
    pub resource_app_id: String,
    #[serde(default)]
    pub resource_access: Vec<ResourceAccess>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAccess {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequiredResourceAccessUpdate<'a> {
    required_resource_access: &'a [RequiredResourceAccess],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddPasswordRequest {
    password_credential: PasswordCredentialRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordCredentialRequest {
    display_name: String,
    end_date_time: DateTime<Utc>,
}

/// Response of `addPassword`; `secretText` is only returned once
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordCredential {
    #[serde(default)]
    pub key_id: Option<String>,
    #[serde(default)]
    pub secret_text: Option<String>,
    #[serde(default)]
    pub end_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    pub id: String,
    #[serde(default)]
    pub app_roles: Vec<AppRole>,
}

#[derive(Debug, Deserialize)]
pub struct AppRole {
    pub id: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl ServicePrincipal {
    /// Role id for an application permission such as `User.Read.All`
    pub fn app_role_id(&self, permission: &str) -> Option<&str> {
        self.app_roles
            .iter()
            .find(|role| role.value.as_deref() == Some(permission))
            .map(|role| role.id.as_str())
    }
}

/// Add an application role on Microsoft Graph to `access`
///
/// Returns `false` when the role was already granted.
pub fn grant_graph_role(access: &mut Vec<RequiredResourceAccess>, role_id: &str) -> bool {
    let index = match access
        .iter()
        .position(|r| r.resource_app_id == MICROSOFT_GRAPH_APP_ID)
    {
        Some(index) => index,
        None => {
            access.push(RequiredResourceAccess {
                resource_app_id: MICROSOFT_GRAPH_APP_ID.to_string(),
                resource_access: Vec::new(),
            });
            access.len() - 1
        }
    };
    let graph = &mut access[index];

    if graph
        .resource_access
        .iter()
        .any(|ra| ra.id == role_id && ra.kind == APP_ROLE_TYPE)
    {
        return false;
    }

    graph.resource_access.push(ResourceAccess {
        id: role_id.to_string(),
        kind: APP_ROLE_TYPE.to_string(),
    });
    true
}

impl GraphClient {
    pub async fn create_application(
        &self,
        request: &CreateApplicationRequest,
    ) -> Result<Application> {
        self.post("/applications", request).await
    }

    pub async fn get_application(&self, object_id: &str) -> Result<Application> {
        self.get(&format!("/applications/{}", object_id)).await
    }

    pub async fn set_required_resource_access(
        &self,
        object_id: &str,
        access: &[RequiredResourceAccess],
    ) -> Result<()> {
        self.patch(
            &format!("/applications/{}", object_id),
            &RequiredResourceAccessUpdate {
                required_resource_access: access,
            },
        )
        .await
    }

    pub async fn add_password(
        &self,
        object_id: &str,
        display_name: &str,
        end_date_time: DateTime<Utc>,
    ) -> Result<PasswordCredential> {
        self.post(
            &format!("/applications/{}/addPassword", object_id),
            &AddPasswordRequest {
                password_credential: PasswordCredentialRequest {
                    display_name: display_name.to_string(),
                    end_date_time,
                },
            },
        )
        .await
    }

    /// The tenant's service principal for Microsoft Graph itself
    pub async fn graph_service_principal(&self) -> Result<ServicePrincipal> {
        let page: PaginatedResponse<ServicePrincipal> = self
            .get(&format!(
                "/servicePrincipals?$filter=appId eq '{}'",
                MICROSOFT_GRAPH_APP_ID
            ))
            .await?;

        page.value.into_iter().next().ok_or_else(|| {
            GraphCtlError::UnexpectedResponse(
                "Microsoft Graph service principal not found in tenant".into(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_body() {
        let body =
            serde_json::to_value(CreateApplicationRequest::new("Automation-reports", None))
                .unwrap();
        assert_eq!(body["displayName"], "Automation-reports");
        assert_eq!(body["signInAudience"], "AzureADMyOrg");
        assert_eq!(body["api"]["requestedAccessTokenVersion"], 2);
        assert_eq!(body["tags"][0], "Automation");
        assert!(body.get("notes").is_none());

        let with_notes = serde_json::to_value(CreateApplicationRequest::new(
            "Automation-reports",
            Some("Weekly export"),
        ))
        .unwrap();
        assert_eq!(with_notes["notes"], "Weekly export");
    }

    #[test]
    fn test_grant_role_creates_graph_resource() {
        let mut access = Vec::new();
        assert!(grant_graph_role(&mut access, "role-1"));
        assert_eq!(access.len(), 1);
        assert_eq!(access[0].resource_app_id, MICROSOFT_GRAPH_APP_ID);
        assert_eq!(access[0].resource_access[0].kind, "Role");
    }

    #[test]
    fn test_grant_role_skips_existing() {
        let mut access = vec![
            RequiredResourceAccess {
                resource_app_id: "other-resource".into(),
                resource_access: vec![],
            },
            RequiredResourceAccess {
                resource_app_id: MICROSOFT_GRAPH_APP_ID.into(),
                resource_access: vec![ResourceAccess {
                    id: "role-1".into(),
                    kind: "Role".into(),
                }],
            },
        ];
        assert!(!grant_graph_role(&mut access, "role-1"));
        assert!(grant_graph_role(&mut access, "role-2"));
        assert_eq!(access.len(), 2);
        assert_eq!(access[1].resource_access.len(), 2);
    }

    #[test]
    fn test_delegated_scope_with_same_id_is_not_a_role() {
        let mut access = vec![RequiredResourceAccess {
            resource_app_id: MICROSOFT_GRAPH_APP_ID.into(),
            resource_access: vec![ResourceAccess {
                id: "role-1".into(),
                kind: "Scope".into(),
            }],
        }];
        assert!(grant_graph_role(&mut access, "role-1"));
    }

    #[test]
    fn test_app_role_lookup() {
        let sp: ServicePrincipal = serde_json::from_value(serde_json::json!({
            "id": "sp-1",
            "appRoles": [
                { "id": "r1", "value": "User.Read.All" },
                { "id": "r2" }
            ]
        }))
        .unwrap();
        assert_eq!(sp.app_role_id("User.Read.All"), Some("r1"));
        assert_eq!(sp.app_role_id("Mail.Send"), None);
    }
}
