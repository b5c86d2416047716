use crate::RuntimeError;
use stagehand_schema::paths::HOOK_PLAN_FILE;
use stagehand_schema::{HookInvocation, HookKind, HookPlan, StageId};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Hook plans of every stage present in the container, in stage order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlans {
    current: StageId,
    plans: Vec<HookPlan>,
}

impl StagePlans {
    /// Read `<generated_dir>/stage-N/hooks.json` for each stage up to `current`.
    /// A missing plan is an error: the image was not built by the compiler.
    pub fn load(generated_dir: &Path, current: StageId) -> Result<Self, RuntimeError> {
        let mut plans = Vec::with_capacity(current.up_to().len());
        for &stage in current.up_to() {
            let path = generated_dir.join(stage.name()).join(HOOK_PLAN_FILE);
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(RuntimeError::PlanMissing(path))
                }
                Err(e) => return Err(RuntimeError::Io(e)),
            };
            let plan = HookPlan::from_json(&content).map_err(|source| RuntimeError::Plan {
                path: path.clone(),
                source,
            })?;
            if plan.stage != stage {
                return Err(RuntimeError::InvalidStage(format!(
                    "{} declares {}, expected {stage}",
                    path.display(),
                    plan.stage
                )));
            }
            debug!("loaded hook plan for {stage}");
            plans.push(plan);
        }
        Ok(Self { current, plans })
    }

    /// Build from in-memory plans, ordering them by stage.
    pub fn from_plans(current: StageId, mut plans: Vec<HookPlan>) -> Self {
        plans.retain(|p| p.stage <= current);
        plans.sort_by_key(|p| p.stage);
        Self { current, plans }
    }

    pub fn current(&self) -> StageId {
        self.current
    }

    pub fn iter(&self) -> impl Iterator<Item = &HookPlan> {
        self.plans.iter()
    }

    /// The entry hook of the latest stage that defines one.
    pub fn custom_entry(&self) -> Option<(StageId, &HookInvocation)> {
        self.plans
            .iter()
            .rev()
            .find_map(|p| p.get(HookKind::OnEntry).first().map(|inv| (p.stage, inv)))
    }
}
