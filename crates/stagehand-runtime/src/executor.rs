use crate::RuntimeError;
use stagehand_schema::{HookInvocation, HookKind, StageId};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

/// Shell used for hook targets that are not executable themselves.
pub const SCRIPT_SHELL: &str = "/bin/sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    Missing,
    Executable,
    /// Present but without an execute bit; run through [`SCRIPT_SHELL`].
    Script,
}

pub trait HookRunner {
    fn probe(&self, script: &str) -> TargetStatus;

    /// Run one target to completion and return its exit code.
    fn run(&self, invocation: &HookInvocation, status: TargetStatus) -> Result<i32, RuntimeError>;
}

/// Runs hook targets as child processes sharing the entrypoint's stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

impl HookRunner for ProcessRunner {
    fn probe(&self, script: &str) -> TargetStatus {
        match Path::new(script).metadata() {
            Ok(meta) if meta.is_file() && meta.permissions().mode() & 0o111 != 0 => {
                TargetStatus::Executable
            }
            Ok(_) => TargetStatus::Script,
            Err(_) => TargetStatus::Missing,
        }
    }

    fn run(&self, invocation: &HookInvocation, status: TargetStatus) -> Result<i32, RuntimeError> {
        let mut cmd = match status {
            TargetStatus::Executable => Command::new(&invocation.script),
            _ => {
                let mut cmd = Command::new(SCRIPT_SHELL);
                cmd.arg(&invocation.script);
                cmd
            }
        };
        cmd.args(&invocation.args);

        let exit = cmd.status()?;
        Ok(exit
            .code()
            .or_else(|| exit.signal().map(|sig| 128 + sig))
            .unwrap_or(1))
    }
}

/// Run a hook list strictly in order, stopping at the first missing target
/// or non-zero exit.
pub fn run_hook_list(
    runner: &impl HookRunner,
    stage: StageId,
    hook: HookKind,
    invocations: &[HookInvocation],
) -> Result<(), RuntimeError> {
    if invocations.is_empty() {
        return Ok(());
    }
    info!("{stage} {hook}: running {} hook(s)", invocations.len());

    for invocation in invocations {
        let status = runner.probe(&invocation.script);
        if status == TargetStatus::Missing {
            return Err(RuntimeError::MissingHookTarget {
                stage,
                hook,
                script: invocation.script.clone(),
            });
        }
        debug!("{stage} {hook}: {} {:?}", invocation.script, invocation.args);
        let code = runner.run(invocation, status)?;
        if code != 0 {
            return Err(RuntimeError::HookFailed {
                stage,
                hook,
                script: invocation.script.clone(),
                code,
            });
        }
    }
    Ok(())
}
