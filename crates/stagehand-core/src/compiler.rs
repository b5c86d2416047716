use crate::artifacts::ArtifactSet;
use crate::dockerfile::{self, dockerfile_name};
use crate::manifest::{self, MANIFEST_FILE_NAME};
use crate::wrapper::{hook_wrapper, login_profile};
use crate::CoreError;
use stagehand_schema::paths::{HOOK_PLAN_FILE, LOGIN_PROFILE_FILE};
use stagehand_schema::{
    fingerprint, parse_config_file, ConfigFingerprint, EnvSource, ProjectConfig, Resolution,
    ResolvedProject, Warning,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything a compilation produces. Nothing is written to disk until the
/// caller hands `artifacts` to [`ArtifactSet::write_to`].
#[derive(Debug, Clone)]
pub struct CompileOutput {
    pub project: ResolvedProject,
    pub fingerprint: ConfigFingerprint,
    pub artifacts: ArtifactSet,
    pub warnings: Vec<Warning>,
}

/// Root of all per-stage generated files, relative to the output directory.
pub const GENERATED_ROOT: &str = "generated";

/// Directory of a stage's generated files, relative to the output directory.
pub fn generated_dir(stage_name: &str) -> PathBuf {
    Path::new(GENERATED_ROOT).join(stage_name)
}

pub fn compile(config: &ProjectConfig, env: &impl EnvSource) -> Result<CompileOutput, CoreError> {
    let Resolution { project, warnings } = config.resolve(env)?;
    let fingerprint = fingerprint(&project)?;
    debug!("config fingerprint {}", fingerprint.short);

    let mut artifacts = ArtifactSet::new();
    artifacts.own_dir(GENERATED_ROOT)?;
    artifacts.insert(
        MANIFEST_FILE_NAME,
        manifest::render(&project, &fingerprint)?,
        false,
    )?;

    for stage in &project.stages {
        artifacts.insert(
            dockerfile_name(stage.id),
            dockerfile::render(stage, &fingerprint),
            false,
        )?;

        let dir = generated_dir(stage.id.name());
        for (kind, invocations) in &stage.hooks.hooks {
            artifacts.insert(
                dir.join(kind.wrapper_file_name()),
                hook_wrapper(stage.id, *kind, invocations),
                true,
            )?;
        }
        artifacts.insert(dir.join(HOOK_PLAN_FILE), stage.hooks.to_json()?, false)?;
        artifacts.insert(dir.join(LOGIN_PROFILE_FILE), login_profile(stage.id), true)?;
    }

    info!(
        "compiled project {} ({} artifacts, {} warnings)",
        project.name,
        artifacts.len(),
        warnings.len()
    );
    Ok(CompileOutput {
        project,
        fingerprint,
        artifacts,
        warnings,
    })
}

pub fn compile_file(
    path: impl AsRef<Path>,
    env: &impl EnvSource,
) -> Result<CompileOutput, CoreError> {
    let config = parse_config_file(path)?;
    compile(&config, env)
}
