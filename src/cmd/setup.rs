use crate::cmd::progress;
use crate::Cli;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input, Password};
use graphctl::credentials::MASTER_FILE_NAME;
use graphctl::error::Result;
use graphctl::Orchestrator;

const MASTER_APP_PERMISSIONS: &[&str] = &["Application.ReadWrite.All", "Directory.ReadWrite.All"];

fn print_instructions() {
    println!("\n{}", "Master App Registration Setup".cyan().bold());
    println!("{}", "═".repeat(50));
    println!("The master app creates and manages every other app registration.\n");
    println!("  1. Entra admin center > Applications > App registrations > New registration");
    println!("  2. Name it {} (single tenant)", "GraphAPI-Orchestrator-Master".bold());
    println!("  3. Note the Application (client) ID and Directory (tenant) ID");
    println!("  4. API permissions > Microsoft Graph > Application permissions:");
    for permission in MASTER_APP_PERMISSIONS {
        println!("       - {}", permission);
    }
    println!("  5. Grant admin consent");
    println!("  6. Certificates & secrets > New client secret, copy its value\n");
}

fn prompt(label: &str, preset: Option<&String>) -> Result<String> {
    if let Some(value) = preset.filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }
    let value: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .interact_text()?;
    Ok(value.trim().to_string())
}

pub async fn run(orchestrator: &mut Orchestrator, cli: &Cli) -> Result<()> {
    print_instructions();

    let tenant_id = prompt("Tenant ID", cli.tenant_id.as_ref())?;
    let client_id = prompt("Application (client) ID", cli.client_id.as_ref())?;
    let client_secret = match cli.client_secret.as_ref().filter(|s| !s.trim().is_empty()) {
        Some(secret) => secret.trim().to_string(),
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Client secret value")
            .interact()?,
    };

    let spinner = progress::spinner(if orchestrator.is_dry_run() {
        "Saving master credential..."
    } else {
        "Verifying master credential..."
    });

    if let Err(e) = orchestrator
        .setup_master(&tenant_id, &client_id, &client_secret)
        .await
    {
        progress::fail(&spinner);
        return Err(e);
    }
    progress::succeed(&spinner, "Master app registration configured");

    println!(
        "  Secrets: {}",
        orchestrator.root().join(MASTER_FILE_NAME).display()
    );
    if orchestrator.uses_vault() {
        println!("  Secrets mirrored to Key Vault");
    }
    println!(
        "\n{} Next: graphctl --create-app <name> --permissions <permission...>",
        "→".cyan()
    );
    Ok(())
}
