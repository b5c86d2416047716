//! Configuration model, substitution, and validation for stagehand.
//!
//! This crate turns a project configuration document (`ProjectConfig`) into a
//! validated, fully substituted `ResolvedProject`: storage and mount
//! destinations, composed port lists, hook plans with container-side script
//! paths, and a deterministic fingerprint (`fingerprint`). It also owns the
//! container path layout shared by the compiler and the entrypoint.

pub mod config;
pub mod hooks;
pub mod identity;
pub mod normalize;
pub mod paths;
pub mod ports;
pub mod storage;
pub mod subst;

pub use config::{
    parse_config_file, parse_config_str, ConfigError, ConfigFormat, HookEntry, ImageSection,
    KeyedEntries, MountEntry, MountKind, ProjectConfig, ProjectSection, SshSection, StageConfig,
    StorageEntry,
};
pub use hooks::{HookInvocation, HookKind, HookPlan, StageId};
pub use identity::{fingerprint, ConfigFingerprint, FINGERPRINT_LABEL};
pub use normalize::{Resolution, ResolvedProject, ResolvedStage};
pub use paths::{RuntimePathGuard, RuntimeReference};
pub use storage::{MountOrigin, ResolvedMount, StorageKeyword, Warning};
pub use subst::{EnvSnapshot, EnvSource, SubstContext, SubstError};
