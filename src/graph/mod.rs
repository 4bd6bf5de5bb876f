pub mod applications;
pub mod auth;
pub mod dry_run;

pub use dry_run::DryRunTransport;

use crate::error::{GraphCtlError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Sends one Graph request and returns the JSON body
///
/// HTTP statuses of 400 and above are returned as `RemoteApiError`. An empty
/// success body (e.g. `204 No Content`) is returned as an empty JSON object.
#[async_trait]
pub trait GraphTransport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        body: Option<Value>,
    ) -> Result<Value>;
}

/// Live transport over HTTPS, one attempt per call
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}

#[async_trait]
impl GraphTransport for HttpTransport {
    async fn send(
        &self,
        method: Method,
        endpoint: &str,
        access_token: &str,
        body: Option<Value>,
    ) -> Result<Value> {
        let url = self.url(endpoint);
        debug!(%method, %url, "Graph API request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(access_token);
        if let Some(body) = &body {
            request = request.json(body);
        }

        let resp = request.send().await.map_err(|e| {
            error!(%method, %url, error = %e, "Graph API request failed");
            GraphCtlError::HttpError(e)
        })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(%method, %url, status = status.as_u16(), "Graph API returned an error");
            return Err(GraphCtlError::RemoteApiError {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Graph API client bound to one access token
pub struct GraphClient {
    transport: Arc<dyn GraphTransport>,
    access_token: String,
}

impl GraphClient {
    pub fn new(transport: Arc<dyn GraphTransport>, access_token: String) -> Self {
        Self {
            transport,
            access_token,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let value = self
            .transport
            .send(Method::GET, endpoint, &self.access_token, None)
            .await?;
        decode(endpoint, value)
    }

    pub async fn post<T: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<R> {
        let value = self
            .transport
            .send(
                Method::POST,
                endpoint,
                &self.access_token,
                Some(serde_json::to_value(body)?),
            )
            .await?;
        decode(endpoint, value)
    }

    pub async fn patch<T: Serialize>(&self, endpoint: &str, body: &T) -> Result<()> {
        self.transport
            .send(
                Method::PATCH,
                endpoint,
                &self.access_token,
                Some(serde_json::to_value(body)?),
            )
            .await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        GraphCtlError::UnexpectedResponse(format!("{}: {}", endpoint, e))
    })
}

/// Standard OData collection response with `value` array and `@odata.nextLink`
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}
