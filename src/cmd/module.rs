use colored::Colorize;
use graphctl::error::Result;
use graphctl::Orchestrator;

pub fn generate(orchestrator: &Orchestrator, name: &str, scopes: &[String]) -> Result<()> {
    let module = orchestrator.generate_module(name, scopes)?;

    println!("{} Generated client module for {}", "✓".green(), name.bold());
    println!("  Client: {}", module.client_path.display());
    println!("  README: {}", module.readme_path.display());
    Ok(())
}
