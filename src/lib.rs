//! Entra ID app registration orchestration over Microsoft Graph
//!
//! The [`orchestrator::Orchestrator`] ties the pieces together: a master app
//! identity creates `Automation-<name>` registrations, grants least-privilege
//! application permissions, stores and rotates their secrets, and generates
//! a standalone Rust client for each one.

pub mod apps;
pub mod config;
pub mod credentials;
pub mod error;
pub mod generator;
pub mod graph;
pub mod logging;
pub mod messages;
pub mod orchestrator;

pub use error::{GraphCtlError, Result};
pub use orchestrator::{Orchestrator, OrchestratorOptions};
