use crate::config::{ConfigError, HookEntry, ProjectConfig, StageConfig};
use crate::hooks::{HookInvocation, HookKind, HookPlan, StageId};
use crate::paths::{container_script_path, RuntimePathGuard};
use crate::ports::{compose_ports, own_ports};
use crate::storage::{destination_collisions, resolve_mounts, resolve_storage, ResolvedMount, Warning};
use crate::subst::{identifier_len, substitute, EnvSource, SubstContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validated project with every configure-time token resolved.
///
/// Stage-2 already carries what it inherits from stage-1 (ports, environment,
/// GPU request), so artifact generation never has to look back at stage-1.
/// This is the input to fingerprinting and to every generated artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedProject {
    pub config_version: u32,
    pub name: String,
    pub stages: Vec<ResolvedStage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedStage {
    pub id: StageId,
    /// Literal base image; only stage-1 has one.
    pub base_image: Option<String>,
    pub output_image: String,
    pub ports: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub ssh_port: Option<u16>,
    pub gpu: bool,
    pub storage: Vec<ResolvedMount>,
    pub mounts: Vec<ResolvedMount>,
    pub hooks: HookPlan,
}

impl ResolvedStage {
    /// Storage first, then explicit mounts.
    pub fn attachments(&self) -> impl Iterator<Item = &ResolvedMount> {
        self.storage.iter().chain(&self.mounts)
    }
}

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub project: ResolvedProject,
    pub warnings: Vec<Warning>,
}

impl ResolvedProject {
    pub fn stage(&self, id: StageId) -> Option<&ResolvedStage> {
        self.stages.iter().find(|s| s.id == id)
    }

    pub fn canonical_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ProjectConfig {
    /// Validate the document and resolve it against `env`.
    pub fn resolve(&self, env: &impl EnvSource) -> Result<Resolution, ConfigError> {
        let name = validate_project_name(&self.project.name)?;
        if self.stage_2.image.base.is_some() {
            return Err(ConfigError::Stage2BaseImage);
        }

        let mut warnings = Vec::new();
        let first = resolve_stage(&name, StageId::One, &self.stage_1, None, env, &mut warnings)?;
        let second = resolve_stage(
            &name,
            StageId::Two,
            &self.stage_2,
            Some(&first),
            env,
            &mut warnings,
        )?;

        tracing::debug!(
            "resolved project {name} with {} warning(s)",
            warnings.len()
        );
        Ok(Resolution {
            project: ResolvedProject {
                config_version: self.config_version,
                name,
                stages: vec![first, second],
            },
            warnings,
        })
    }
}

fn validate_project_name(raw: &str) -> Result<String, ConfigError> {
    let name = raw.trim();
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(name.to_owned())
    } else {
        Err(ConfigError::InvalidProjectName(raw.to_owned()))
    }
}

fn resolve_stage(
    project: &str,
    id: StageId,
    config: &StageConfig,
    parent: Option<&ResolvedStage>,
    env: &impl EnvSource,
    warnings: &mut Vec<Warning>,
) -> Result<ResolvedStage, ConfigError> {
    let key = id.config_key();

    let base_image = match (id, &config.image.base) {
        (StageId::One, Some(raw)) => {
            let base = substitute(raw, env, SubstContext::Baked)
                .map_err(|e| ConfigError::subst(format!("{key}.image.base"), e))?;
            if base.trim().is_empty() {
                return Err(ConfigError::MissingBaseImage);
            }
            Some(base.trim().to_owned())
        }
        (StageId::One, None) => return Err(ConfigError::MissingBaseImage),
        (StageId::Two, _) => None,
    };

    let output_image = match &config.image.output {
        Some(raw) => substitute(raw, env, SubstContext::Manifest)
            .map_err(|e| ConfigError::subst(format!("{key}.image.output"), e))?,
        None => format!("{project}:{}", id.name()),
    };

    let own = own_ports(id, config, env)?;
    let ports = match parent {
        Some(parent) => compose_ports(&parent.ports, &own),
        None => own,
    };

    if let Some(name) = config.environment.first_duplicate() {
        return Err(ConfigError::DuplicateKey {
            stage: id,
            section: "environment",
            key: name.to_owned(),
        });
    }
    let mut environment = parent.map(|p| p.environment.clone()).unwrap_or_default();
    for (name, raw) in config.environment.iter() {
        if name.is_empty() || identifier_len(name) != name.len() {
            return Err(ConfigError::InvalidEnvName {
                stage: id,
                name: name.to_owned(),
            });
        }
        let value = substitute(raw, env, SubstContext::Manifest)
            .map_err(|e| ConfigError::subst(format!("{key}.environment.{name}"), e))?;
        environment.insert(name.to_owned(), value);
    }

    let storage = resolve_storage(project, id, &config.storage, env)?;
    let mounts = resolve_mounts(project, id, &config.mount, env)?;
    warnings.extend(destination_collisions(id, storage.iter().chain(&mounts)));

    let guard = RuntimePathGuard::new(mounts.iter().map(|m| m.destination.as_str()));
    let hooks = resolve_hooks(id, config, &guard, env)?;

    Ok(ResolvedStage {
        id,
        base_image,
        output_image,
        ports,
        environment,
        ssh_port: config.ssh.enable.then_some(config.ssh.port),
        gpu: config.gpu || parent.is_some_and(|p| p.gpu),
        storage,
        mounts,
        hooks,
    })
}

fn resolve_hooks(
    stage: StageId,
    config: &StageConfig,
    guard: &RuntimePathGuard,
    env: &impl EnvSource,
) -> Result<HookPlan, ConfigError> {
    if config.on_entry.len() > 1 {
        return Err(ConfigError::MultipleEntryHooks {
            stage,
            count: config.on_entry.len(),
        });
    }

    let mut plan = HookPlan::new(stage);
    for kind in HookKind::ALL {
        let entries = config.hooks(kind);
        let mut invocations = Vec::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            invocations.push(resolve_hook_entry(stage, kind, index, entry, guard, env)?);
        }
        plan.set(kind, invocations);
    }
    Ok(plan)
}

fn resolve_hook_entry(
    stage: StageId,
    kind: HookKind,
    index: usize,
    entry: &HookEntry,
    guard: &RuntimePathGuard,
    env: &impl EnvSource,
) -> Result<HookInvocation, ConfigError> {
    let field = format!("{}.{kind}[{index}]", stage.config_key());

    if kind.is_build_time() {
        for raw in std::iter::once(&entry.script).chain(&entry.args) {
            if let Some(reference) = guard.check_raw(raw) {
                return Err(ConfigError::RuntimePathInBuild {
                    stage,
                    argument: raw.clone(),
                    reference: reference.to_string(),
                });
            }
        }
    }

    let script = substitute(&entry.script, env, SubstContext::Baked)
        .map_err(|e| ConfigError::subst(format!("{field}.script"), e))?;
    if script.trim().is_empty() {
        return Err(ConfigError::EmptyHookScript {
            stage,
            hook: kind,
            index,
        });
    }

    let mut args = Vec::with_capacity(entry.args.len());
    for (arg_index, raw) in entry.args.iter().enumerate() {
        args.push(
            substitute(raw, env, SubstContext::Baked)
                .map_err(|e| ConfigError::subst(format!("{field}.args[{arg_index}]"), e))?,
        );
    }

    if kind.is_build_time() {
        for (raw, resolved) in std::iter::once((&entry.script, &script))
            .chain(entry.args.iter().zip(&args))
        {
            if let Some(reference) = guard.check_resolved(resolved) {
                return Err(ConfigError::RuntimePathInBuild {
                    stage,
                    argument: raw.clone(),
                    reference: reference.to_string(),
                });
            }
        }
    }

    Ok(HookInvocation::new(container_script_path(script.trim()), args))
}
