use super::{core_error, host_environment, json_pretty, EXIT_SUCCESS};
use stagehand_schema::{HookKind, ResolvedStage};
use std::path::Path;

pub fn run(config: &Path, json: bool) -> Result<u8, String> {
    let compiled =
        stagehand_core::compile_file(config, &host_environment()).map_err(core_error)?;

    if json {
        let payload = serde_json::json!({
            "fingerprint": compiled.fingerprint,
            "project": compiled.project,
            "warnings": compiled.warnings,
        });
        println!("{}", json_pretty(&payload)?);
        return Ok(EXIT_SUCCESS);
    }

    println!("project:     {}", compiled.project.name);
    println!("version:     {}", compiled.project.config_version);
    println!("fingerprint: {}", compiled.fingerprint.hash);
    for stage in &compiled.project.stages {
        print_stage(stage);
    }
    Ok(EXIT_SUCCESS)
}

fn print_stage(stage: &ResolvedStage) {
    println!();
    println!("[{}]", stage.id);
    if let Some(base) = &stage.base_image {
        println!("  base:    {base}");
    }
    println!("  image:   {}", stage.output_image);
    if !stage.ports.is_empty() {
        println!("  ports:   {}", stage.ports.join(", "));
    }
    if stage.gpu {
        println!("  gpu:     yes");
    }
    for mount in stage.attachments() {
        println!("  mount:   {} -> {} ({})", mount.source, mount.destination, mount.label());
    }
    for kind in HookKind::ALL {
        let hooks = stage.hooks.get(kind);
        if !hooks.is_empty() {
            println!("  {kind}: {} script(s)", hooks.len());
        }
    }
}
