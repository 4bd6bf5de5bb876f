use crate::cmd::progress;
use colored::Colorize;
use graphctl::apps::CreateOutcome;
use graphctl::credentials::app_file_name;
use graphctl::error::Result;
use graphctl::Orchestrator;

fn dry_run_tag(orchestrator: &Orchestrator) -> String {
    if orchestrator.is_dry_run() {
        format!("{} ", "[DRY RUN]".yellow())
    } else {
        String::new()
    }
}

pub async fn create(
    orchestrator: &mut Orchestrator,
    name: &str,
    description: Option<&str>,
    permissions: &[String],
) -> Result<()> {
    let spinner = progress::spinner(&format!("Creating app registration {}...", name));

    let outcome = match orchestrator.create_app(name, description, permissions).await {
        Ok(outcome) => outcome,
        Err(e) => {
            progress::fail(&spinner);
            return Err(e);
        }
    };

    let tag = dry_run_tag(orchestrator);
    match outcome {
        CreateOutcome::AlreadyExists(app) => {
            progress::warn(
                &spinner,
                &format!("{}{} already exists, nothing changed", tag, app.name),
            );
            println!("  Client ID: {}", app.client_id);
        }
        CreateOutcome::Created {
            registration,
            rejected_permissions,
        } => {
            progress::succeed(
                &spinner,
                &format!("{}Created {}", tag, registration.name.bold()),
            );
            println!("  Object ID: {}", registration.id);
            println!("  Client ID: {}", registration.client_id);
            if let Some(expiry) = registration.secret_expiry {
                println!("  Secret expires: {}", expiry.format("%Y-%m-%d"));
            }
            println!(
                "  Secrets: {}",
                orchestrator.root().join(app_file_name(name)).display()
            );

            if registration.permissions.is_empty() {
                println!("  Permissions: None");
            } else {
                println!("  Permissions: {}", registration.permissions.join(", "));
            }
            for permission in &rejected_permissions {
                println!("  {} {} was not granted", "⚠".yellow(), permission);
            }
            if !registration.permissions.is_empty() {
                println!(
                    "\n{} Grant admin consent for the new permissions in the Entra admin center",
                    "→".cyan()
                );
            }
        }
    }
    Ok(())
}

pub fn list(orchestrator: &Orchestrator) {
    let apps = orchestrator.list_apps();

    if apps.is_empty() {
        println!("\n{}", "No app registrations found.".yellow());
        println!("Create one with: graphctl --create-app <name>");
        return;
    }

    println!("\n{}", "App Registrations".cyan().bold());
    println!("{}", "═".repeat(50));
    for (i, app) in apps.iter().enumerate() {
        println!("\n{}. {}", i + 1, app.slug().bold());
        println!("   ID: {}", app.id);
        println!("   Client ID: {}", app.client_id);
        println!("   Description: {}", app.description);
        println!("   Created: {}", app.created.format("%Y-%m-%d %H:%M"));
        let permissions = if app.permissions.is_empty() {
            "None".to_string()
        } else {
            app.permissions.join(", ")
        };
        println!("   Permissions: {}", permissions);
        if let Some(expiry) = app.secret_expiry {
            println!("   Secret expires: {}", expiry.format("%Y-%m-%d"));
        }
    }
    println!();
}

pub async fn rotate(orchestrator: &mut Orchestrator, name: &str) -> Result<()> {
    let spinner = progress::spinner(&format!("Rotating client secret for {}...", name));

    let outcome = match orchestrator.rotate_secret(name).await {
        Ok(outcome) => outcome,
        Err(e) => {
            progress::fail(&spinner);
            return Err(e);
        }
    };

    progress::succeed(
        &spinner,
        &format!(
            "{}New secret issued for {}",
            dry_run_tag(orchestrator),
            outcome.registration.name.bold()
        ),
    );
    println!("  Expires: {}", outcome.expires_at.format("%Y-%m-%d"));
    println!(
        "  Secrets: {}",
        orchestrator.root().join(app_file_name(name)).display()
    );
    println!("  The previous secret stays valid until it expires");
    Ok(())
}
