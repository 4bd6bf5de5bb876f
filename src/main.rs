mod cmd;

use clap::{ArgGroup, CommandFactory, Parser};
use colored::Colorize;
use graphctl::config::Settings;
use graphctl::credentials::Credential;
use graphctl::{logging, Orchestrator, OrchestratorOptions};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "graphctl",
    about = "Create and manage Entra ID app registrations through Microsoft Graph",
    version,
    long_about = "Automate least-privilege app registrations for Microsoft Graph\n\n\
                  A master app registration creates Automation-<name> apps, grants their\n\
                  application permissions, rotates their secrets and generates a client\n\
                  module for each one."
)]
#[command(group(
    ArgGroup::new("action")
        .args(["setup", "create_app", "list_apps", "rotate_secret", "generate_module"])
        .multiple(false)
))]
pub struct Cli {
    /// Set up the master app registration
    #[arg(long)]
    pub setup: bool,

    /// Create a new app registration
    #[arg(long, value_name = "NAME")]
    pub create_app: Option<String>,

    /// Description for the app registration
    #[arg(long, requires = "create_app")]
    pub description: Option<String>,

    /// Application permissions to grant (e.g. User.Read.All)
    #[arg(long, num_args = 1.., value_name = "PERMISSION", requires = "create_app")]
    pub permissions: Vec<String>,

    /// List registered applications
    #[arg(long)]
    pub list_apps: bool,

    /// Issue a new client secret for an app
    #[arg(long, value_name = "NAME")]
    pub rotate_secret: Option<String>,

    /// Generate a client module for an app
    #[arg(long, value_name = "NAME")]
    pub generate_module: Option<String>,

    /// Token scopes for the generated client
    #[arg(long, num_args = 1.., value_name = "SCOPE", requires = "generate_module")]
    pub scopes: Vec<String>,

    /// Mirror secrets to Azure Key Vault
    #[arg(long)]
    pub use_key_vault: bool,

    /// Azure Key Vault URL
    #[arg(long, env = "AZURE_KEYVAULT_URL")]
    pub key_vault_url: Option<String>,

    /// Service principal client ID (Key Vault access, setup default)
    #[arg(long, env = "AZURE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Service principal client secret
    #[arg(long, env = "AZURE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Tenant ID
    #[arg(long, env = "AZURE_TENANT_ID")]
    pub tenant_id: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Replace every Graph and token call with fixed responses
    #[arg(long)]
    pub dry_run: bool,

    /// Directory holding configuration, secrets and generated modules
    #[arg(long, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,
}

impl Cli {
    fn has_action(&self) -> bool {
        self.setup
            || self.list_apps
            || self.create_app.is_some()
            || self.rotate_secret.is_some()
            || self.generate_module.is_some()
    }

    /// Service principal from the override flags, when all three are given
    fn override_credential(&self) -> Option<Credential> {
        match (&self.tenant_id, &self.client_id, &self.client_secret) {
            (Some(tenant_id), Some(client_id), Some(secret)) => {
                Some(Credential::new(tenant_id, client_id, secret))
            }
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> graphctl::Result<()> {
    let cli = Cli::parse();

    if !cli.has_action() {
        return print_usage(&mut std::io::stdout());
    }

    let mut settings = Settings::load(&cli.root)?;
    if cli.use_key_vault {
        settings.use_key_vault = true;
    }
    if let Some(url) = &cli.key_vault_url {
        settings.key_vault_url = Some(url.clone());
    }

    logging::init(&cli.root, cli.debug, settings.log_level.as_deref())?;

    let vault_credential = cli.override_credential();
    if vault_credential.is_some() {
        println!("{} Using service principal authentication", "→".cyan());
    }

    let mut orchestrator = Orchestrator::new(OrchestratorOptions {
        root: cli.root.clone(),
        settings,
        dry_run: cli.dry_run,
        vault_credential,
    })?;

    if orchestrator.is_dry_run() {
        println!(
            "{}",
            "[DRY RUN] No requests will be sent to Microsoft Graph".yellow()
        );
    }

    if cli.setup {
        cmd::setup::run(&mut orchestrator, &cli).await
    } else if let Some(name) = &cli.create_app {
        cmd::apps::create(
            &mut orchestrator,
            name,
            cli.description.as_deref(),
            &cli.permissions,
        )
        .await
    } else if cli.list_apps {
        cmd::apps::list(&orchestrator);
        Ok(())
    } else if let Some(name) = &cli.rotate_secret {
        cmd::apps::rotate(&mut orchestrator, name).await
    } else if let Some(name) = &cli.generate_module {
        cmd::module::generate(&orchestrator, name, &cli.scopes)
    } else {
        Ok(())
    }
}

/// Help goes to stdout when no action is given
fn print_usage(out: &mut impl Write) -> graphctl::Result<()> {
    Cli::command().write_help(out)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphctl::GraphCtlError;
    use std::io;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_actions_are_exclusive() {
        let result = Cli::try_parse_from(["graphctl", "--list-apps", "--setup"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_permissions_need_create_app() {
        assert!(Cli::try_parse_from(["graphctl", "--list-apps", "--permissions", "User.Read"]).is_err());

        let cli = Cli::try_parse_from([
            "graphctl",
            "--create-app",
            "reports",
            "--permissions",
            "User.Read.All",
            "Sites.Read.All",
        ])
        .unwrap();
        assert_eq!(cli.create_app.as_deref(), Some("reports"));
        assert_eq!(cli.permissions, vec!["User.Read.All", "Sites.Read.All"]);
    }

    #[test]
    fn test_no_action_is_allowed() {
        let cli = Cli::try_parse_from(["graphctl", "--debug"]).unwrap();
        assert!(!cli.has_action());
    }

    #[test]
    fn test_usage_lists_actions() {
        let mut out = Vec::new();
        print_usage(&mut out).unwrap();
        let usage = String::from_utf8(out).unwrap();
        assert!(usage.contains("--create-app"));
        assert!(usage.ends_with('\n'));
    }

    #[test]
    fn test_usage_write_failure_is_reported() {
        assert!(matches!(
            print_usage(&mut ClosedPipe),
            Err(GraphCtlError::IoError(_))
        ));
    }
}
