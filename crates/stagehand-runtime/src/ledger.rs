use crate::RuntimeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagehand_schema::paths::{ENV_LEDGER_DIR, LEDGER_DIR};
use stagehand_schema::{HookKind, StageId};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Records which (stage, hook) pairs already ran to completion.
pub trait InitLedger {
    fn exists(&self, stage: StageId, hook: HookKind) -> Result<bool, RuntimeError>;

    fn mark(&self, stage: StageId, hook: HookKind) -> Result<(), RuntimeError>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerMarker {
    pub stage: StageId,
    pub hook: HookKind,
    pub completed_at: DateTime<Utc>,
}

/// One marker file per (stage, hook) under a ledger directory. A missing
/// marker, or a missing directory, means "not yet initialized".
#[derive(Debug, Clone)]
pub struct FsLedger {
    dir: PathBuf,
}

impl FsLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ledger at `$STAGEHAND_LEDGER_DIR`, or the image default.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(ENV_LEDGER_DIR).unwrap_or_else(|| LEDGER_DIR.into()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn marker_path(&self, stage: StageId, hook: HookKind) -> PathBuf {
        self.dir.join(format!("{}.{}.done", stage.name(), hook.name()))
    }

    pub fn read_marker(&self, stage: StageId, hook: HookKind) -> Option<LedgerMarker> {
        let content = std::fs::read_to_string(self.marker_path(stage, hook)).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn ledger_err(&self, source: std::io::Error) -> RuntimeError {
        RuntimeError::Ledger {
            path: self.dir.clone(),
            source,
        }
    }
}

impl InitLedger for FsLedger {
    fn exists(&self, stage: StageId, hook: HookKind) -> Result<bool, RuntimeError> {
        Ok(self.marker_path(stage, hook).is_file())
    }

    fn mark(&self, stage: StageId, hook: HookKind) -> Result<(), RuntimeError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| self.ledger_err(e))?;
        let marker = LedgerMarker {
            stage,
            hook,
            completed_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&marker)
            .map_err(|e| self.ledger_err(std::io::Error::other(e)))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| self.ledger_err(e))?;
        tmp.write_all(content.as_bytes())
            .map_err(|e| self.ledger_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.ledger_err(e))?;
        tmp.persist(self.marker_path(stage, hook))
            .map_err(|e| self.ledger_err(e.error))?;
        Ok(())
    }
}
