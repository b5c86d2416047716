//! Artifact compiler for stagehand.
//!
//! Turns a validated project (`stagehand_schema::ResolvedProject`) into the
//! files a container build needs: one Dockerfile per stage, the compose
//! manifest, per-hook shell wrappers, declarative hook plans, and login
//! profile snippets. Output is deterministic and written atomically under an
//! exclusive directory lock.

pub mod artifacts;
pub mod compiler;
pub mod concurrency;
pub mod dockerfile;
pub mod manifest;
pub mod wrapper;

pub use artifacts::{ArtifactFile, ArtifactSet};
pub use compiler::{compile, compile_file, generated_dir, CompileOutput};
pub use concurrency::{ArtifactLock, LOCK_FILE_NAME};
pub use dockerfile::ENTRY_BINARY_NAME;
pub use manifest::MANIFEST_FILE_NAME;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Config(#[from] stagehand_schema::ConfigError),
    #[error("manifest serialization error: {0}")]
    Manifest(#[from] serde_yaml::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid artifact path: {0}")]
    InvalidArtifactPath(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
