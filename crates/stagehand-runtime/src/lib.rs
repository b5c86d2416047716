//! Entrypoint decision engine for stagehand containers.
//!
//! This crate runs as the container's init process. It loads the hook plans
//! generated for every stage up to the container's own, resolves entrypoint
//! options, runs first-run hooks (guarded by an `InitLedger`) and every-run
//! hooks through a `HookRunner`, and then decides on exactly one
//! `TerminalAction`: a custom entry, a command hand-off, an interactive
//! shell, an idle sleep, or a plain exit.

pub mod decision;
pub mod executor;
pub mod handoff;
pub mod ledger;
pub mod mock;
pub mod options;
pub mod plan;
pub mod prepare;
pub mod startup;
pub mod stdin;

pub use decision::{
    choose_action, custom_entry_action, validate_transition, EntryState, StdinState,
    TerminalAction,
};
pub use executor::{run_hook_list, HookRunner, ProcessRunner, TargetStatus};
pub use ledger::{FsLedger, InitLedger, LedgerMarker};
pub use options::{parse_options, EntryOptions, OptionError};
pub use plan::StagePlans;
pub use prepare::{prepare, PrepareReport};
pub use startup::Startup;

use stagehand_schema::{HookKind, StageId};
use std::path::PathBuf;
use thiserror::Error;

/// Exit status for entrypoint option errors.
pub const EXIT_OPTION_ERROR: u8 = 2;
/// Exit status for hook, plan, and hand-off failures.
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Option(#[from] OptionError),
    #[error("{stage} {hook}: hook target not found: {script}")]
    MissingHookTarget {
        stage: StageId,
        hook: HookKind,
        script: String,
    },
    #[error("{stage} {hook}: {script} exited with status {code}")]
    HookFailed {
        stage: StageId,
        hook: HookKind,
        script: String,
        code: i32,
    },
    #[error("custom entry target not found: {0}")]
    MissingCustomEntry(String),
    #[error("hook plan not found: {}", .0.display())]
    PlanMissing(PathBuf),
    #[error("invalid hook plan {}: {source}", path.display())]
    Plan {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("init ledger error at {}: {source}", path.display())]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to hand off to {program}: {source}")]
    HandOff {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid entrypoint state transition: {from} -> {to}")]
    InvalidTransition { from: EntryState, to: EntryState },
    #[error("invalid container stage: {0}")]
    InvalidStage(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuntimeError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Option(_) => EXIT_OPTION_ERROR,
            _ => EXIT_FAILURE,
        }
    }
}
