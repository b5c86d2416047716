use crate::executor::{run_hook_list, HookRunner};
use crate::ledger::InitLedger;
use crate::plan::StagePlans;
use crate::RuntimeError;
use stagehand_schema::{HookKind, StageId};
use tracing::{debug, info};

/// What the preparation step did, per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    pub first_run: Vec<StageId>,
    pub first_run_skipped: Vec<StageId>,
    pub every_run: Vec<StageId>,
}

/// Run first-run hooks for every stage not yet recorded in the ledger, then
/// every-run hooks for every stage. Stages run in order; any failure stops
/// preparation and leaves that stage unmarked.
pub fn prepare(
    plans: &StagePlans,
    runner: &impl HookRunner,
    ledger: &impl InitLedger,
) -> Result<PrepareReport, RuntimeError> {
    let mut report = PrepareReport::default();

    for plan in plans.iter() {
        let hooks = plan.get(HookKind::OnFirstRun);
        if hooks.is_empty() {
            continue;
        }
        if ledger.exists(plan.stage, HookKind::OnFirstRun)? {
            debug!("{} on_first_run already completed", plan.stage);
            report.first_run_skipped.push(plan.stage);
            continue;
        }
        run_hook_list(runner, plan.stage, HookKind::OnFirstRun, hooks)?;
        ledger.mark(plan.stage, HookKind::OnFirstRun)?;
        info!("{} on_first_run completed", plan.stage);
        report.first_run.push(plan.stage);
    }

    for plan in plans.iter() {
        let hooks = plan.get(HookKind::OnEveryRun);
        if hooks.is_empty() {
            continue;
        }
        run_hook_list(runner, plan.stage, HookKind::OnEveryRun, hooks)?;
        report.every_run.push(plan.stage);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryLedger, MockRunner};
    use stagehand_schema::{HookInvocation, HookPlan};

    fn plan(stage: StageId, first: &[&str], every: &[&str]) -> HookPlan {
        let to_inv = |scripts: &[&str]| {
            scripts
                .iter()
                .map(|s| HookInvocation::new(*s, vec![]))
                .collect::<Vec<_>>()
        };
        let mut plan = HookPlan::new(stage);
        plan.set(HookKind::OnFirstRun, to_inv(first));
        plan.set(HookKind::OnEveryRun, to_inv(every));
        plan
    }

    fn runner() -> MockRunner {
        MockRunner::new()
            .with_target("/f1")
            .with_target("/f2")
            .with_target("/e1")
            .with_target("/e2")
    }

    #[test]
    fn first_run_for_all_stages_precedes_every_run() {
        let plans = StagePlans::from_plans(
            StageId::Two,
            vec![
                plan(StageId::One, &["/f1"], &["/e1"]),
                plan(StageId::Two, &["/f2"], &["/e2"]),
            ],
        );
        let runner = runner();
        let report = prepare(&plans, &runner, &MemoryLedger::new()).unwrap();
        assert_eq!(runner.executed(), vec!["/f1", "/f2", "/e1", "/e2"]);
        assert_eq!(report.first_run, vec![StageId::One, StageId::Two]);
        assert_eq!(report.every_run, vec![StageId::One, StageId::Two]);
    }

    #[test]
    fn first_run_is_idempotent_through_the_ledger() {
        let plans =
            StagePlans::from_plans(StageId::One, vec![plan(StageId::One, &["/f1"], &["/e1"])]);
        let ledger = MemoryLedger::new();

        let first = runner();
        prepare(&plans, &first, &ledger).unwrap();
        assert_eq!(first.executed(), vec!["/f1", "/e1"]);

        let second = runner();
        let report = prepare(&plans, &second, &ledger).unwrap();
        assert_eq!(second.executed(), vec!["/e1"]);
        assert_eq!(report.first_run_skipped, vec![StageId::One]);
    }

    #[test]
    fn failed_first_run_is_not_marked() {
        let plans =
            StagePlans::from_plans(StageId::One, vec![plan(StageId::One, &["/f1"], &["/e1"])]);
        let runner = MockRunner::new()
            .with_failing_target("/f1", 2)
            .with_target("/e1");
        let ledger = MemoryLedger::new();
        assert!(prepare(&plans, &runner, &ledger).is_err());
        assert!(ledger.marked().is_empty());
        assert_eq!(runner.executed(), vec!["/f1"]);
    }

    #[test]
    fn empty_lists_leave_no_marker() {
        let plans = StagePlans::from_plans(StageId::One, vec![plan(StageId::One, &[], &[])]);
        let ledger = MemoryLedger::new();
        let report = prepare(&plans, &MockRunner::new(), &ledger).unwrap();
        assert_eq!(report, PrepareReport::default());
        assert!(ledger.marked().is_empty());
    }
}
