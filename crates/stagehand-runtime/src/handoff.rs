//! Process replacement for the chosen terminal action.

use crate::decision::TerminalAction;
use crate::RuntimeError;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

pub const BASH: &str = "/bin/bash";
pub const SH: &str = "/bin/sh";

/// `/bin/bash` when the image has it, otherwise `/bin/sh`.
pub fn login_shell() -> &'static str {
    pick_login_shell(|path| Path::new(path).exists())
}

pub fn pick_login_shell(exists: impl Fn(&str) -> bool) -> &'static str {
    if exists(BASH) {
        BASH
    } else {
        SH
    }
}

/// The command that replaces the entrypoint, or `None` for a plain exit.
pub fn command_for(action: &TerminalAction) -> Option<Command> {
    match action {
        TerminalAction::CustomEntry { program, args }
        | TerminalAction::ExecCommand { program, args } => {
            let mut cmd = Command::new(program);
            cmd.args(args);
            Some(cmd)
        }
        TerminalAction::ShellFallback { shell } => {
            let mut cmd = Command::new(shell);
            cmd.arg("-l");
            Some(cmd)
        }
        TerminalAction::SleepFallback => {
            let mut cmd = Command::new("sleep");
            cmd.arg("infinity");
            Some(cmd)
        }
        TerminalAction::NoBlockExit => None,
    }
}

/// Replace the current process. Returns only for [`TerminalAction::NoBlockExit`]
/// or when the exec itself fails.
pub fn hand_off(action: &TerminalAction) -> Result<(), RuntimeError> {
    let Some(mut cmd) = command_for(action) else {
        return Ok(());
    };
    let program = cmd.get_program().to_string_lossy().into_owned();
    let source = cmd.exec();
    Err(RuntimeError::HandOff { program, source })
}
