use crate::executor::{TargetStatus, SCRIPT_SHELL};
use crate::options::EntryOptions;
use crate::RuntimeError;
use stagehand_schema::HookInvocation;
use std::ffi::OsString;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Start,
    OptionsResolved,
    Prepared,
    CustomEntry,
    ExecCommand,
    ShellFallback,
    SleepFallback,
    NoBlockExit,
    Error,
}

impl EntryState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::CustomEntry
                | Self::ExecCommand
                | Self::ShellFallback
                | Self::SleepFallback
                | Self::NoBlockExit
                | Self::Error
        )
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::OptionsResolved => "options_resolved",
            Self::Prepared => "prepared",
            Self::CustomEntry => "custom_entry",
            Self::ExecCommand => "exec_command",
            Self::ShellFallback => "shell_fallback",
            Self::SleepFallback => "sleep_fallback",
            Self::NoBlockExit => "no_block_exit",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

pub fn validate_transition(from: EntryState, to: EntryState) -> Result<(), RuntimeError> {
    let valid = matches!(
        (from, to),
        (EntryState::Start, EntryState::OptionsResolved)
            | (EntryState::OptionsResolved, EntryState::Prepared)
            | (
                EntryState::Prepared,
                EntryState::CustomEntry
                    | EntryState::ExecCommand
                    | EntryState::ShellFallback
                    | EntryState::SleepFallback
                    | EntryState::NoBlockExit
            )
            | (
                EntryState::Start | EntryState::OptionsResolved | EntryState::Prepared,
                EntryState::Error
            )
    );

    if valid {
        Ok(())
    } else {
        Err(RuntimeError::InvalidTransition { from, to })
    }
}

/// Whether anything can still arrive on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdinState {
    Terminal,
    /// A pipe or file that is not the null device.
    Open,
    Closed,
}

impl StdinState {
    pub fn is_open(self) -> bool {
        !matches!(self, Self::Closed)
    }
}

/// The single way the entrypoint gives up control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalAction {
    CustomEntry {
        program: OsString,
        args: Vec<OsString>,
    },
    ExecCommand {
        program: OsString,
        args: Vec<OsString>,
    },
    ShellFallback {
        shell: String,
    },
    SleepFallback,
    NoBlockExit,
}

impl TerminalAction {
    pub fn state(&self) -> EntryState {
        match self {
            Self::CustomEntry { .. } => EntryState::CustomEntry,
            Self::ExecCommand { .. } => EntryState::ExecCommand,
            Self::ShellFallback { .. } => EntryState::ShellFallback,
            Self::SleepFallback => EntryState::SleepFallback,
            Self::NoBlockExit => EntryState::NoBlockExit,
        }
    }

    /// Human-readable branch name for the final log line.
    pub fn branch(&self) -> &'static str {
        match self {
            Self::CustomEntry { .. } => "custom entry",
            Self::ExecCommand { .. } => "command hand-off",
            Self::ShellFallback { .. } => "shell fallback",
            Self::SleepFallback => "sleep fallback",
            Self::NoBlockExit => "no-block exit",
        }
    }
}

/// Build the hand-off for a custom entry. The original argv follows the
/// baked arguments untouched; entrypoint options are not parsed.
pub fn custom_entry_action(
    entry: &HookInvocation,
    status: TargetStatus,
    argv: &[OsString],
) -> Result<TerminalAction, RuntimeError> {
    let mut args: Vec<OsString> = Vec::with_capacity(entry.args.len() + argv.len() + 1);
    let program = match status {
        TargetStatus::Missing => {
            return Err(RuntimeError::MissingCustomEntry(entry.script.clone()));
        }
        TargetStatus::Executable => OsString::from(&entry.script),
        TargetStatus::Script => {
            args.push(OsString::from(&entry.script));
            OsString::from(SCRIPT_SHELL)
        }
    };
    args.extend(entry.args.iter().map(OsString::from));
    args.extend(argv.iter().cloned());
    Ok(TerminalAction::CustomEntry { program, args })
}

/// Pick the action when no custom entry exists.
pub fn choose_action(options: &EntryOptions, stdin: StdinState, login_shell: &str) -> TerminalAction {
    if let Some((program, args)) = options.command.split_first() {
        return TerminalAction::ExecCommand {
            program: program.clone(),
            args: args.to_vec(),
        };
    }
    if options.no_block {
        return TerminalAction::NoBlockExit;
    }
    if stdin.is_open() {
        TerminalAction::ShellFallback {
            shell: login_shell.to_owned(),
        }
    } else {
        TerminalAction::SleepFallback
    }
}
