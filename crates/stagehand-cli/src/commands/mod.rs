pub mod check;
pub mod compile;
pub mod completions;
pub mod inspect;
pub mod man_pages;

use indicatif::{ProgressBar, ProgressStyle};
use stagehand_core::CoreError;
use stagehand_schema::{EnvSnapshot, Warning};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Prefix that marks a message as a configuration error for exit code mapping.
pub const CONFIG_ERROR_PREFIX: &str = "config error:";

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn core_error(err: CoreError) -> String {
    match err {
        CoreError::Config(e) => format!("{CONFIG_ERROR_PREFIX} {e}"),
        other => other.to_string(),
    }
}

pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with(CONFIG_ERROR_PREFIX) {
        EXIT_CONFIG_ERROR
    } else {
        EXIT_FAILURE
    }
}

/// Configure-time variables come from the invoking process.
pub fn host_environment() -> EnvSnapshot {
    EnvSnapshot::from_process()
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

pub fn colorize_warning(warning: &Warning) -> String {
    use console::Style;
    format!(
        "{} {warning}",
        Style::new().yellow().bold().apply_to("warning:")
    )
}

pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("{}", colorize_warning(warning));
    }
}
