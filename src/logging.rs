//! Subscriber setup: compact stderr output plus a daily file under `<root>/logs`

use crate::error::Result;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_FILTER: &str = "graphctl=info";
pub const DEBUG_FILTER: &str = "graphctl=debug";

/// `RUST_LOG` wins, then `--debug`, then the configured level
pub fn filter_directive(debug: bool, log_level: Option<&str>) -> String {
    if let Ok(env) = std::env::var("RUST_LOG") {
        if !env.trim().is_empty() {
            return env;
        }
    }
    if debug {
        return DEBUG_FILTER.to_string();
    }
    match log_level.map(str::trim).filter(|l| !l.is_empty()) {
        Some(level) if level.contains('=') => level.to_string(),
        Some(level) => format!("graphctl={}", level),
        None => DEFAULT_FILTER.to_string(),
    }
}

pub fn log_file_path(root: &Path) -> PathBuf {
    root.join("logs")
        .join(format!("graphctl_{}.log", Local::now().format("%Y%m%d")))
}

/// Install the global subscriber; returns the log file in use
///
/// A second call is a no-op, which keeps tests that share a process quiet.
pub fn init(root: &Path, debug: bool, log_level: Option<&str>) -> Result<PathBuf> {
    let directive = filter_directive(debug, log_level);

    let path = log_file_path(root);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    let stderr_layer = fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(&directive));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .with_filter(EnvFilter::new(&directive));

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        assert_eq!(filter_directive(true, Some("warn")), DEBUG_FILTER);
        assert_eq!(filter_directive(false, Some("warn")), "graphctl=warn");
        assert_eq!(filter_directive(false, Some("graphctl=trace,reqwest=debug")), "graphctl=trace,reqwest=debug");
        assert_eq!(filter_directive(false, None), DEFAULT_FILTER);
    }

    #[test]
    fn test_log_file_name() {
        let path = log_file_path(Path::new("/tmp/root"));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("graphctl_"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "graphctl_YYYYMMDD.log".len());
    }
}
