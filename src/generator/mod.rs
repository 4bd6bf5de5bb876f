//! Client module generation for registered apps

pub mod template;

pub use template::Template;

use crate::apps::display_name;
use crate::config::AppRegistration;
use crate::credentials::{app_file_name, env_prefix, vault_prefix};
use crate::error::{GraphCtlError, Result};
use crate::graph::auth::{GRAPH_SCOPE, MICROSOFT_AUTHORITY};
use crate::messages::Message;
use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};

const CLIENT_TEMPLATE: &str = include_str!("templates/client.rs.tmpl");
const README_TEMPLATE: &str = include_str!("templates/README.md.tmpl");

/// Files written by [`ModuleGenerator::generate_module`]
#[derive(Debug, Clone)]
pub struct GeneratedModule {
    pub directory: PathBuf,
    pub client_path: PathBuf,
    pub readme_path: PathBuf,
}

pub struct ModuleGenerator {
    modules_dir: PathBuf,
    authority: String,
    include_vault: bool,
}

impl ModuleGenerator {
    pub fn new(modules_dir: impl Into<PathBuf>, include_vault: bool) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            authority: MICROSOFT_AUTHORITY.to_string(),
            include_vault,
        }
    }

    pub fn with_authority(mut self, authority: &str) -> Self {
        self.authority = authority.trim_end_matches('/').to_string();
        self
    }

    /// Write `<modules_dir>/<app>/<app>_client.rs` and its README
    ///
    /// Both files are rendered before anything touches the disk.
    pub fn generate_module(
        &self,
        registrations: &[AppRegistration],
        app_name: &str,
        scopes: &[String],
    ) -> Result<GeneratedModule> {
        let full_name = display_name(app_name);
        if !registrations.iter().any(|app| app.name == full_name) {
            error!(app = %full_name, "{}: not in configuration", Message::ModuleFailure);
            return Err(GraphCtlError::NotFound(full_name));
        }

        let scopes: Vec<String> = if scopes.is_empty() {
            vec![GRAPH_SCOPE.to_string()]
        } else {
            scopes.to_vec()
        };

        let vars = ModuleVars {
            app_name: app_name.to_string(),
            type_name: type_name(app_name),
            env_prefix: env_prefix(app_name),
            secret_file: app_file_name(app_name),
            vault_name: vault_prefix(app_name),
            authority: self.authority.clone(),
            scopes,
            generated_at: Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            key_vault_enabled: self.include_vault,
        };

        let client = vars.render_client()?;
        let readme = vars.render_readme()?;

        let directory = self.modules_dir.join(app_name);
        let client_path = directory.join(format!("{}_client.rs", app_name));
        let readme_path = directory.join("README.md");

        fs::create_dir_all(&directory)?;
        fs::write(&client_path, client)?;
        fs::write(&readme_path, readme)?;

        info!(app = %full_name, path = %client_path.display(), "{}", Message::ModuleGenerated);
        Ok(GeneratedModule {
            directory,
            client_path,
            readme_path,
        })
    }
}

struct ModuleVars {
    app_name: String,
    type_name: String,
    env_prefix: String,
    secret_file: String,
    vault_name: String,
    authority: String,
    scopes: Vec<String>,
    generated_at: String,
    key_vault_enabled: bool,
}

impl ModuleVars {
    /// String values are bound as Rust literals
    fn render_client(&self) -> Result<String> {
        let scopes = self
            .scopes
            .iter()
            .map(|s| rust_literal(s))
            .collect::<Vec<_>>()
            .join(", ");

        let mut template = Template::parse("client.rs", CLIENT_TEMPLATE)?;
        template
            .bind("app_name", &self.app_name)?
            .bind("type_name", &self.type_name)?
            .bind("env_prefix", rust_literal(&self.env_prefix))?
            .bind("secret_file", rust_literal(&self.secret_file))?
            .bind("vault_name", rust_literal(&self.vault_name))?
            .bind("authority", rust_literal(&self.authority))?
            .bind("scopes", scopes)?
            .bind("generated_at", &self.generated_at)?
            .bind("key_vault_enabled", self.key_vault_enabled.to_string())?;
        template.render()
    }

    fn render_readme(&self) -> Result<String> {
        let scopes = self
            .scopes
            .iter()
            .map(|s| format!("`{}`", s))
            .collect::<Vec<_>>()
            .join(", ");

        let mut template = Template::parse("README.md", README_TEMPLATE)?;
        template
            .bind("app_name", &self.app_name)?
            .bind("type_name", &self.type_name)?
            .bind("env_prefix", &self.env_prefix)?
            .bind("secret_file", &self.secret_file)?
            .bind("scopes", scopes)?
            .bind("generated_at", &self.generated_at)?
            .bind("key_vault_enabled", if self.key_vault_enabled { "yes" } else { "no" })?;
        template.render()
    }
}

fn rust_literal(value: &str) -> String {
    format!("{:?}", value)
}

/// `example-sharepoint` -> `ExampleSharepointClient`
pub fn type_name(app_name: &str) -> String {
    let mut name: String = app_name
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    if name.chars().next().map_or(true, |c| !c.is_ascii_alphabetic()) {
        name.insert_str(0, "App");
    }
    name.push_str("Client");
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str) -> AppRegistration {
        AppRegistration {
            name: display_name(name),
            id: "obj".into(),
            client_id: "cid".into(),
            description: String::new(),
            created: Utc::now(),
            permissions: vec![],
            secret_expiry: None,
        }
    }

    #[test]
    fn test_type_name() {
        assert_eq!(type_name("example-sharepoint"), "ExampleSharepointClient");
        assert_eq!(type_name("purview_api"), "PurviewApiClient");
        assert_eq!(type_name("reports"), "ReportsClient");
        assert_eq!(type_name("365-audit"), "App365AuditClient");
    }

    #[test]
    fn test_generated_client_has_no_placeholders() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ModuleGenerator::new(dir.path(), true);
        let module = generator
            .generate_module(
                &[registration("example-sharepoint")],
                "example-sharepoint",
                &["https://graph.microsoft.com/.default".into()],
            )
            .unwrap();

        let client = fs::read_to_string(&module.client_path).unwrap();
        assert!(!client.contains("${"));
        assert!(client.contains("pub struct ExampleSharepointClient"));
        assert!(client.contains("const ENV_PREFIX: &str = \"EXAMPLE_SHAREPOINT\";"));
        assert!(client.contains("const SECRET_FILE: &str = \".env.example-sharepoint.secret\";"));
        assert!(client.contains("const KEY_VAULT_ENABLED: bool = true;"));
        assert!(module
            .client_path
            .ends_with("example-sharepoint/example-sharepoint_client.rs"));

        let readme = fs::read_to_string(&module.readme_path).unwrap();
        assert!(readme.contains("EXAMPLE_SHAREPOINT_CLIENT_ID"));
        assert!(!readme.contains("${"));
    }

    #[test]
    fn test_default_scope() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ModuleGenerator::new(dir.path(), false);
        let module = generator
            .generate_module(&[registration("reports")], "reports", &[])
            .unwrap();
        let client = fs::read_to_string(module.client_path).unwrap();
        assert!(client.contains("&[\"https://graph.microsoft.com/.default\"]"));
        assert!(client.contains("const KEY_VAULT_ENABLED: bool = false;"));
    }

    #[test]
    fn test_unknown_app_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ModuleGenerator::new(dir.path().join("api_modules"), false);
        let result = generator.generate_module(&[registration("reports")], "ghost", &[]);
        assert!(matches!(result, Err(GraphCtlError::NotFound(_))));
        assert!(!dir.path().join("api_modules").exists());
    }

    /// Bracket nesting outside comments, strings and char literals
    fn delimiters_balance(source: &str) -> bool {
        let chars: Vec<char> = source.chars().collect();
        let mut stack = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '/' if chars.get(i + 1) == Some(&'/') => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                }
                '"' => {
                    i += 1;
                    while i < chars.len() && chars[i] != '"' {
                        if chars[i] == '\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                }
                '\'' if chars.get(i + 2) == Some(&'\'') => i += 2,
                '\'' if chars.get(i + 1) == Some(&'\\') && chars.get(i + 3) == Some(&'\'') => {
                    i += 3
                }
                open @ ('(' | '[' | '{') => stack.push(open),
                close @ (')' | ']' | '}') => {
                    let expected = match close {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    if stack.pop() != Some(expected) {
                        return false;
                    }
                }
                _ => {}
            }
            i += 1;
        }

        stack.is_empty()
    }

    #[test]
    fn test_delimiter_check_catches_imbalance() {
        assert!(delimiters_balance("fn f() { let c = '{'; g(\"}\"); } // }"));
        assert!(!delimiters_balance("fn f() { g(); "));
        assert!(!delimiters_balance("fn f() { g(] }"));
    }

    #[test]
    fn test_generated_client_is_well_formed() {
        let dir = tempfile::tempdir().unwrap();
        let generator = ModuleGenerator::new(dir.path(), true);
        let module = generator
            .generate_module(
                &[registration("purview_api")],
                "purview_api",
                &["https://graph.microsoft.com/.default".into(), "User.Read".into()],
            )
            .unwrap();
        let client = fs::read_to_string(&module.client_path).unwrap();

        assert!(delimiters_balance(&client));
        assert!(client.contains("pub fn request("));
        assert!(client.contains("pub fn new(secrets_dir: impl AsRef<Path>) -> Result<Self>"));
        assert!(client.contains("impl PurviewApiClient {"));
        assert!(client.contains("pub enum PurviewApiClientError {"));
        assert!(client.contains("const VAULT_NAME: &str = \"purview-api\";"));
    }

    #[test]
    fn test_templates_declare_expected_slots() {
        let client = Template::parse("client.rs", CLIENT_TEMPLATE).unwrap();
        for slot in ["app_name", "type_name", "scopes", "authority", "key_vault_enabled"] {
            assert!(client.slots().contains(&slot), "missing {}", slot);
        }
    }
}
