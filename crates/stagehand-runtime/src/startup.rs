use crate::decision::{
    choose_action, custom_entry_action, validate_transition, EntryState, StdinState,
    TerminalAction,
};
use crate::executor::HookRunner;
use crate::ledger::InitLedger;
use crate::options::{parse_options, EntryOptions};
use crate::plan::StagePlans;
use crate::prepare::{prepare, PrepareReport};
use crate::RuntimeError;
use std::ffi::OsString;
use tracing::{debug, info};

/// One run of the container entrypoint, from argv to terminal action.
///
/// Steps must be called in order: [`resolve_options`](Self::resolve_options),
/// [`prepare`](Self::prepare), then [`decide`](Self::decide). Each step is
/// checked against the state transition table; a failing step moves the
/// session to [`EntryState::Error`].
pub struct Startup<R: HookRunner, L: InitLedger> {
    plans: StagePlans,
    runner: R,
    ledger: L,
    argv: Vec<OsString>,
    options: EntryOptions,
    state: EntryState,
}

impl<R: HookRunner, L: InitLedger> Startup<R, L> {
    pub fn new(plans: StagePlans, runner: R, ledger: L, argv: Vec<OsString>) -> Self {
        Self {
            plans,
            runner,
            ledger,
            argv,
            options: EntryOptions::default(),
            state: EntryState::Start,
        }
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn options(&self) -> &EntryOptions {
        &self.options
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    fn advance(&mut self, to: EntryState) -> Result<(), RuntimeError> {
        validate_transition(self.state, to)?;
        debug!("entrypoint state {} -> {to}", self.state);
        self.state = to;
        Ok(())
    }

    fn fail(&mut self, err: RuntimeError) -> RuntimeError {
        if validate_transition(self.state, EntryState::Error).is_ok() {
            self.state = EntryState::Error;
        }
        err
    }

    /// Parse entrypoint options, unless a custom entry owns the argv.
    pub fn resolve_options(&mut self) -> Result<&EntryOptions, RuntimeError> {
        validate_transition(self.state, EntryState::OptionsResolved)?;
        let custom = self
            .plans
            .custom_entry()
            .map(|(stage, entry)| (stage, entry.script.clone()));
        if let Some((stage, script)) = custom {
            debug!("custom entry {script} from {stage}; argv is forwarded");
        } else {
            match parse_options(&self.argv) {
                Ok(options) => self.options = options,
                Err(e) => return Err(self.fail(e.into())),
            }
        }
        self.advance(EntryState::OptionsResolved)?;
        Ok(&self.options)
    }

    /// Run first-run and every-run hooks.
    pub fn prepare(&mut self) -> Result<PrepareReport, RuntimeError> {
        validate_transition(self.state, EntryState::Prepared)?;
        match prepare(&self.plans, &self.runner, &self.ledger) {
            Ok(report) => {
                self.advance(EntryState::Prepared)?;
                Ok(report)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Choose the terminal action.
    pub fn decide(
        &mut self,
        stdin: StdinState,
        login_shell: &str,
    ) -> Result<TerminalAction, RuntimeError> {
        if self.state != EntryState::Prepared {
            return Err(RuntimeError::InvalidTransition {
                from: self.state,
                to: EntryState::CustomEntry,
            });
        }

        let action = match self.plans.custom_entry() {
            Some((_, entry)) => {
                let status = self.runner.probe(&entry.script);
                custom_entry_action(entry, status, &self.argv)
            }
            None => Ok(choose_action(&self.options, stdin, login_shell)),
        };
        let action = match action {
            Ok(action) => action,
            Err(e) => return Err(self.fail(e)),
        };

        self.advance(action.state())?;
        info!("entrypoint branch: {}", action.branch());
        Ok(action)
    }

    /// Run every step and return the chosen action.
    pub fn run(
        &mut self,
        stdin: StdinState,
        login_shell: &str,
    ) -> Result<TerminalAction, RuntimeError> {
        self.resolve_options()?;
        self.prepare()?;
        self.decide(stdin, login_shell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MemoryLedger, MockRunner};
    use stagehand_schema::{HookInvocation, HookKind, HookPlan, StageId};

    fn argv(tokens: &[&str]) -> Vec<OsString> {
        tokens.iter().map(OsString::from).collect()
    }

    fn plans(entry: Option<&str>) -> StagePlans {
        let mut one = HookPlan::new(StageId::One);
        one.set(
            HookKind::OnFirstRun,
            vec![HookInvocation::new("/init.sh", vec![])],
        );
        let mut two = HookPlan::new(StageId::Two);
        if let Some(script) = entry {
            two.set(
                HookKind::OnEntry,
                vec![HookInvocation::new(script, vec!["--serve".to_owned()])],
            );
        }
        StagePlans::from_plans(StageId::Two, vec![one, two])
    }

    fn session(entry: Option<&str>, args: &[&str]) -> Startup<MockRunner, MemoryLedger> {
        let runner = MockRunner::new().with_target("/init.sh").with_target("/entry.sh");
        Startup::new(plans(entry), runner, MemoryLedger::new(), argv(args))
    }

    #[test]
    fn unknown_option_fails_before_preparation() {
        let mut startup = session(None, &["--", "--wat"]);
        let err = startup.run(StdinState::Closed, "/bin/sh").unwrap_err();
        assert!(err.to_string().contains("--wat"));
        assert_eq!(err.exit_code(), 2);
        assert_eq!(startup.state(), EntryState::Error);
        assert!(startup.runner().executed().is_empty());
    }

    #[test]
    fn custom_entry_skips_option_parsing() {
        let mut startup = session(Some("/entry.sh"), &["--no-block"]);
        let action = startup.run(StdinState::Closed, "/bin/sh").unwrap();
        assert_eq!(
            action,
            TerminalAction::CustomEntry {
                program: "/entry.sh".into(),
                args: argv(&["--serve", "--no-block"]),
            }
        );
        assert!(!startup.options().no_block);
        assert_eq!(startup.state(), EntryState::CustomEntry);
    }

    #[test]
    fn missing_custom_entry_fails_after_preparation() {
        let mut startup = session(Some("/absent.sh"), &[]);
        let err = startup.run(StdinState::Closed, "/bin/sh").unwrap_err();
        assert!(matches!(err, RuntimeError::MissingCustomEntry(_)));
        assert_eq!(startup.runner().executed(), vec!["/init.sh"]);
        assert_eq!(startup.state(), EntryState::Error);
    }

    #[test]
    fn steps_must_run_in_order() {
        let mut startup = session(None, &[]);
        assert!(matches!(
            startup.prepare(),
            Err(RuntimeError::InvalidTransition { .. })
        ));
        assert!(startup.decide(StdinState::Closed, "/bin/sh").is_err());
        assert_eq!(startup.state(), EntryState::Start);
    }

    #[test]
    fn verbose_option_is_reported() {
        let mut startup = session(None, &["--", "--verbose", "--", "id"]);
        assert!(startup.resolve_options().unwrap().verbose);
        startup.prepare().unwrap();
        let action = startup.decide(StdinState::Closed, "/bin/sh").unwrap();
        assert_eq!(action.branch(), "command hand-off");
    }
}
