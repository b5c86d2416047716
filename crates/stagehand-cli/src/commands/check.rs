use super::{core_error, host_environment, json_pretty, print_warnings, EXIT_SUCCESS};
use std::path::Path;

/// Validate and compile in memory without writing anything.
pub fn run(config: &Path, json: bool) -> Result<u8, String> {
    let compiled =
        stagehand_core::compile_file(config, &host_environment()).map_err(core_error)?;

    if json {
        let payload = serde_json::json!({
            "project": compiled.project.name,
            "fingerprint": compiled.fingerprint.hash,
            "artifacts": compiled.artifacts.len(),
            "warnings": compiled.warnings,
            "status": "ok",
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        print_warnings(&compiled.warnings);
        println!(
            "{} is valid (project {}, fingerprint {})",
            config.display(),
            compiled.project.name,
            compiled.fingerprint.short
        );
    }
    Ok(EXIT_SUCCESS)
}
