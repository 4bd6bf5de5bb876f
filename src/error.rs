use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphCtlError {
    #[error("Authentication failed: {code}: {description}")]
    AuthError { code: String, description: String },

    #[error("Missing credentials: {0}. Run 'graphctl --setup' first")]
    MissingCredentials(String),

    #[error("Graph API error: HTTP {status}: {}", enhance_graph_error(.body))]
    RemoteApiError { status: u16, body: String },

    #[error("Unexpected Graph API response: {0}")]
    UnexpectedResponse(String),

    #[error("App registration '{0}' not found")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(
        "'{display_name}' exists remotely (object id {object_id}, client id {client_id}) \
         but {stage} failed: {reason}. Delete it in Entra ID before retrying"
    )]
    Incomplete {
        display_name: String,
        object_id: String,
        client_id: String,
        stage: String,
        reason: String,
    },

    #[error("Key Vault error: {0}")]
    VaultError(String),

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Interactive prompt error: {0}")]
    DialoguerError(#[from] dialoguer::Error),
}

pub type Result<T> = std::result::Result<T, GraphCtlError>;

pub use GraphCtlError as Error;

/// Parse Graph API error response and provide helpful context
pub fn enhance_graph_error(error_response: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\n💡 Hint: The master app token was rejected. Re-run 'graphctl --setup' with a valid secret."
                }
                "Forbidden" | "Authorization_RequestDenied" => {
                    "\n💡 Hint: The master app needs Application.ReadWrite.All with admin consent granted."
                }
                "Request_BadRequest" | "BadRequest" => {
                    if message.contains("already exists") {
                        "\n💡 Hint: An application with this name already exists in the directory."
                    } else {
                        "\n💡 Hint: The request body was rejected. Check the permission names and description."
                    }
                }
                "Request_ResourceNotFound" | "NotFound" => {
                    "\n💡 Hint: The application no longer exists remotely. The local configuration may be stale."
                }
                "TooManyRequests" => {
                    "\n💡 Hint: API rate limit exceeded. Wait a moment and run the command again."
                }
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    error_response.to_string()
}
