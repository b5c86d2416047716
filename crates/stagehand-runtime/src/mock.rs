use crate::executor::{HookRunner, TargetStatus};
use crate::ledger::InitLedger;
use crate::RuntimeError;
use stagehand_schema::{HookInvocation, HookKind, StageId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

/// Hook runner that records invocations instead of spawning processes.
/// Targets it was not told about probe as missing.
#[derive(Debug, Default)]
pub struct MockRunner {
    targets: BTreeMap<String, TargetStatus>,
    exit_codes: BTreeMap<String, i32>,
    calls: Mutex<Vec<HookInvocation>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_target(mut self, script: &str) -> Self {
        self.targets
            .insert(script.to_owned(), TargetStatus::Executable);
        self
    }

    #[must_use]
    pub fn with_script_target(mut self, script: &str) -> Self {
        self.targets.insert(script.to_owned(), TargetStatus::Script);
        self
    }

    #[must_use]
    pub fn with_failing_target(mut self, script: &str, code: i32) -> Self {
        self.exit_codes.insert(script.to_owned(), code);
        self.with_target(script)
    }

    pub fn calls(&self) -> Vec<HookInvocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Scripts run so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.script).collect()
    }
}

impl HookRunner for MockRunner {
    fn probe(&self, script: &str) -> TargetStatus {
        self.targets
            .get(script)
            .copied()
            .unwrap_or(TargetStatus::Missing)
    }

    fn run(&self, invocation: &HookInvocation, _status: TargetStatus) -> Result<i32, RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::Io(std::io::Error::other(format!("mutex poisoned: {e}"))))?
            .push(invocation.clone());
        Ok(self.exit_codes.get(&invocation.script).copied().unwrap_or(0))
    }
}

/// In-memory init ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    marks: Mutex<BTreeSet<(StageId, HookKind)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn marked(&self) -> Vec<(StageId, HookKind)> {
        self.marks
            .lock()
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl InitLedger for MemoryLedger {
    fn exists(&self, stage: StageId, hook: HookKind) -> Result<bool, RuntimeError> {
        Ok(self
            .marks
            .lock()
            .map(|m| m.contains(&(stage, hook)))
            .unwrap_or(false))
    }

    fn mark(&self, stage: StageId, hook: HookKind) -> Result<(), RuntimeError> {
        self.marks
            .lock()
            .map_err(|e| RuntimeError::Io(std::io::Error::other(format!("mutex poisoned: {e}"))))?
            .insert((stage, hook));
        Ok(())
    }
}
