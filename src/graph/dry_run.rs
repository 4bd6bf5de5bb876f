//! Fixed Graph responses for `--dry-run`

use crate::apps::DISPLAY_NAME_PREFIX;
use crate::error::Result;
use crate::graph::GraphTransport;
use crate::messages::Message;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Mutex;
use tracing::info;

pub const DRY_RUN_SECRET: &str = "dry-run-secret-123456789";
pub const DRY_RUN_SERVICE_PRINCIPAL_ID: &str = "sp-id-123";

/// App roles advertised by the mock Microsoft Graph service principal
pub const DRY_RUN_APP_ROLES: &[(&str, &str)] = &[
    ("role-id-123", "User.Read"),
    ("role-id-456", "Directory.Read.All"),
    ("df021288-bdef-4463-88db-98f22de89214", "User.Read.All"),
    ("5b567255-7703-4780-807c-7be8301ae99b", "Group.Read.All"),
    ("332a536c-c7ef-4017-ab91-336970924f0d", "Sites.Read.All"),
    ("b633e1c5-b582-4048-a93e-9f11b44c7e96", "Mail.Send"),
];

/// Transport that answers every call locally and records what was asked
#[derive(Default)]
pub struct DryRunTransport {
    calls: Mutex<Vec<String>>,
}

impl DryRunTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// `"METHOD endpoint"` for each call in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn respond(method: &Method, endpoint: &str, body: Option<&Value>) -> Value {
        let path = endpoint.split('?').next().unwrap_or(endpoint);

        match (method.as_str(), path) {
            ("POST", "/applications") => {
                let display_name = body
                    .and_then(|b| b.get("displayName"))
                    .and_then(Value::as_str)
                    .unwrap_or("Dry Run App");
                let slug = display_name
                    .strip_prefix(DISPLAY_NAME_PREFIX)
                    .unwrap_or(display_name);
                json!({
                    "id": format!("dry-run-app-id-{}", slug),
                    "appId": format!("dry-run-client-id-{}", slug),
                    "displayName": display_name,
                })
            }
            ("POST", p) if p.ends_with("/addPassword") => json!({
                "keyId": "dry-run-key-id",
                "secretText": DRY_RUN_SECRET,
                "endDateTime": (Utc::now() + chrono::Duration::days(365)).to_rfc3339(),
            }),
            ("GET", "/servicePrincipals") => {
                let roles: Vec<Value> = DRY_RUN_APP_ROLES
                    .iter()
                    .map(|(id, value)| json!({ "id": id, "value": value }))
                    .collect();
                json!({
                    "value": [{ "id": DRY_RUN_SERVICE_PRINCIPAL_ID, "appRoles": roles }]
                })
            }
            ("GET", p) if p.starts_with("/applications/") => json!({
                "id": p.trim_start_matches("/applications/"),
                "requiredResourceAccess": [],
            }),
            ("PATCH", p) if p.starts_with("/applications/") => json!({}),
            _ => json!({
                "status": "success",
                "message": format!("Dry run successful for {}", endpoint),
            }),
        }
    }
}

#[async_trait]
impl GraphTransport for DryRunTransport {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        _access_token: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        info!(%method, endpoint, "{}", Message::DryRunCall);
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{} {}", method, endpoint));

        Ok(Self::respond(&method, endpoint, body.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_application_mock_uses_slug() {
        let transport = DryRunTransport::new();
        let resp = transport
            .send(
                Method::POST,
                "/applications",
                "token",
                Some(json!({ "displayName": "Automation-reports" })),
            )
            .await
            .unwrap();
        assert_eq!(resp["id"], "dry-run-app-id-reports");
        assert_eq!(resp["appId"], "dry-run-client-id-reports");
    }

    #[tokio::test]
    async fn test_service_principal_mock_has_roles() {
        let transport = DryRunTransport::new();
        let resp = transport
            .send(
                Method::GET,
                "/servicePrincipals?$filter=appId eq '00000003-0000-0000-c000-000000000000'",
                "token",
                None,
            )
            .await
            .unwrap();
        let roles = resp["value"][0]["appRoles"].as_array().unwrap();
        assert!(roles.iter().any(|r| r["value"] == "User.Read"));
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let transport = DryRunTransport::new();
        transport
            .send(Method::GET, "/applications/abc", "token", None)
            .await
            .unwrap();
        transport
            .send(Method::POST, "/applications/abc/addPassword", "token", None)
            .await
            .unwrap();
        assert_eq!(
            transport.calls(),
            vec![
                "GET /applications/abc".to_string(),
                "POST /applications/abc/addPassword".to_string()
            ]
        );
    }
}
