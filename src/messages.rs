//! Log and status messages shared by every component
//!
//! Each message has a stable code so log files can be grepped across
//! releases even when the wording changes.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    MasterSetupStart,
    MasterSetupSuccess,
    MasterVerifySkipped,
    TokenAcquired,
    TokenCached,
    TokenFailure,
    AppExists,
    AppCreationStart,
    AppCreated,
    AppCreationFailure,
    AppOrphaned,
    SecretCreated,
    SecretFailure,
    SecretRotated,
    PermissionAdded,
    PermissionExists,
    PermissionNotFound,
    PermissionFailure,
    ServicePrincipalFailure,
    SecretsSaved,
    SecretsLoaded,
    SecretsMissing,
    VaultWriteFailed,
    VaultReadFailed,
    VaultDisabled,
    ConfigCreated,
    ConfigLoaded,
    ConfigSaved,
    ModuleGenerated,
    ModuleFailure,
    DryRunCall,
}

impl Message {
    pub const ALL: &'static [Message] = &[
        Message::MasterSetupStart,
        Message::MasterSetupSuccess,
        Message::MasterVerifySkipped,
        Message::TokenAcquired,
        Message::TokenCached,
        Message::TokenFailure,
        Message::AppExists,
        Message::AppCreationStart,
        Message::AppCreated,
        Message::AppCreationFailure,
        Message::AppOrphaned,
        Message::SecretCreated,
        Message::SecretFailure,
        Message::SecretRotated,
        Message::PermissionAdded,
        Message::PermissionExists,
        Message::PermissionNotFound,
        Message::PermissionFailure,
        Message::ServicePrincipalFailure,
        Message::SecretsSaved,
        Message::SecretsLoaded,
        Message::SecretsMissing,
        Message::VaultWriteFailed,
        Message::VaultReadFailed,
        Message::VaultDisabled,
        Message::ConfigCreated,
        Message::ConfigLoaded,
        Message::ConfigSaved,
        Message::ModuleGenerated,
        Message::ModuleFailure,
        Message::DryRunCall,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Message::MasterSetupStart => "GC100",
            Message::MasterSetupSuccess => "GC101",
            Message::MasterVerifySkipped => "GC102",
            Message::TokenAcquired => "GC110",
            Message::TokenCached => "GC111",
            Message::TokenFailure => "GC112",
            Message::AppExists => "GC200",
            Message::AppCreationStart => "GC201",
            Message::AppCreated => "GC202",
            Message::AppCreationFailure => "GC203",
            Message::AppOrphaned => "GC204",
            Message::SecretCreated => "GC210",
            Message::SecretFailure => "GC211",
            Message::SecretRotated => "GC212",
            Message::PermissionAdded => "GC220",
            Message::PermissionExists => "GC221",
            Message::PermissionNotFound => "GC222",
            Message::PermissionFailure => "GC223",
            Message::ServicePrincipalFailure => "GC224",
            Message::SecretsSaved => "GC300",
            Message::SecretsLoaded => "GC301",
            Message::SecretsMissing => "GC302",
            Message::VaultWriteFailed => "GC310",
            Message::VaultReadFailed => "GC311",
            Message::VaultDisabled => "GC312",
            Message::ConfigCreated => "GC400",
            Message::ConfigLoaded => "GC401",
            Message::ConfigSaved => "GC402",
            Message::ModuleGenerated => "GC500",
            Message::ModuleFailure => "GC501",
            Message::DryRunCall => "GC900",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Message::MasterSetupStart => "Starting master app registration setup",
            Message::MasterSetupSuccess => "Master app registration setup completed",
            Message::MasterVerifySkipped => "Skipping master credential verification",
            Message::TokenAcquired => "Acquired access token",
            Message::TokenCached => "Using cached access token",
            Message::TokenFailure => "Failed to acquire access token",
            Message::AppExists => "App registration already exists",
            Message::AppCreationStart => "Creating app registration",
            Message::AppCreated => "App registration created",
            Message::AppCreationFailure => "Failed to create app registration",
            Message::AppOrphaned => "Application left in directory without local record",
            Message::SecretCreated => "Client secret created",
            Message::SecretFailure => "Failed to create client secret",
            Message::SecretRotated => "Client secret rotated",
            Message::PermissionAdded => "Added permission",
            Message::PermissionExists => "Permission already granted",
            Message::PermissionNotFound => "Permission not found on Microsoft Graph",
            Message::PermissionFailure => "Failed to add permission",
            Message::ServicePrincipalFailure => "Failed to look up Microsoft Graph service principal",
            Message::SecretsSaved => "Secrets saved",
            Message::SecretsLoaded => "Secrets loaded",
            Message::SecretsMissing => "Secrets not found",
            Message::VaultWriteFailed => "Failed to write secret to Key Vault, kept local copy",
            Message::VaultReadFailed => "Failed to read secret from Key Vault, using local file",
            Message::VaultDisabled => "Key Vault requested but not configured, using local files",
            Message::ConfigCreated => "Configuration file not found, starting empty",
            Message::ConfigLoaded => "Configuration loaded",
            Message::ConfigSaved => "Configuration saved",
            Message::ModuleGenerated => "Generated API module",
            Message::ModuleFailure => "Failed to generate API module",
            Message::DryRunCall => "[DRY RUN] Graph API call",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<_> = Message::ALL.iter().map(|m| m.code()).collect();
        assert_eq!(codes.len(), Message::ALL.len());
    }

    #[test]
    fn test_display_includes_code() {
        assert_eq!(
            Message::AppCreated.to_string(),
            "[GC202] App registration created"
        );
    }
}
