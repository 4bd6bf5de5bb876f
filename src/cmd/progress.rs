//! Spinners for Graph round-trips

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Spinner on stderr; hidden when stderr is not a terminal
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn finish(spinner: &ProgressBar, prefix_template: &str, prefix: &'static str, message: &str) {
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template(prefix_template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_prefix(prefix);
    spinner.finish_with_message(message.to_string());
}

pub fn succeed(spinner: &ProgressBar, message: &str) {
    finish(spinner, "{prefix:.green} {msg}", "✓", message);
}

pub fn warn(spinner: &ProgressBar, message: &str) {
    finish(spinner, "{prefix:.yellow} {msg}", "⚠", message);
}

/// Clear the spinner; the caller reports the error
pub fn fail(spinner: &ProgressBar) {
    spinner.finish_and_clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_finishes() {
        let sp = spinner("Creating application...");
        assert!(!sp.is_finished());
        succeed(&sp, "Created");
        assert!(sp.is_finished());

        let sp = spinner("Rotating...");
        fail(&sp);
        assert!(sp.is_finished());
    }
}
