//! Shell wrappers generated for each (stage, hook) pair.

use stagehand_schema::paths::{stage_generated_dir, ENV_VERBOSE, PROFILE_DIR};
use stagehand_schema::{HookInvocation, HookKind, StageId};
use std::fmt::Write as _;

const HEADER: &str = "#!/bin/sh\n# Generated by stagehand. Do not edit.\n";

/// Missing hook targets exit with the shell's "command not found" status.
pub const MISSING_TARGET_EXIT: i32 = 127;

/// POSIX single-quote a value for safe interpolation into a script.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn quoted_args(args: &[String]) -> String {
    args.iter().fold(String::new(), |mut out, arg| {
        out.push(' ');
        out.push_str(&shell_quote(arg));
        out
    })
}

fn preamble(stage: StageId, kind: HookKind) -> String {
    format!(
        r#"{HEADER}# {stage} {kind}
set -u

stagehand_log() {{
    if [ "${{{ENV_VERBOSE}:-0}}" = "1" ]; then
        printf '[stagehand] %s\n' "$*" >&2
    fi
}}

stagehand_missing() {{
    printf '[stagehand] {stage} {kind}: hook target not found: %s\n' "$1" >&2
    exit {MISSING_TARGET_EXIT}
}}
"#
    )
}

/// Wrapper that runs every target in order and stops at the first failure.
/// `on_entry` wrappers instead replace themselves with their single target,
/// forwarding the wrapper's own arguments after the baked ones.
pub fn hook_wrapper(stage: StageId, kind: HookKind, invocations: &[HookInvocation]) -> String {
    let mut script = preamble(stage, kind);

    if kind == HookKind::OnEntry {
        for invocation in invocations.iter().take(1) {
            let target = shell_quote(&invocation.script);
            let args = quoted_args(&invocation.args);
            let _ = write!(
                script,
                r#"
target={target}
[ -e "$target" ] || stagehand_missing "$target"
stagehand_log "{stage} {kind}: exec $target"
if [ -x "$target" ]; then
    exec "$target"{args} "$@"
fi
exec /bin/sh "$target"{args} "$@"
"#
            );
        }
        return script;
    }

    let _ = write!(
        script,
        r#"
stagehand_run() {{
    target="$1"
    shift
    [ -e "$target" ] || stagehand_missing "$target"
    stagehand_log "{stage} {kind}: $target"
    if [ -x "$target" ]; then
        "$target" "$@"
    else
        /bin/sh "$target" "$@"
    fi
}}

"#
    );
    for invocation in invocations {
        let _ = writeln!(
            script,
            "stagehand_run {}{} || exit $?",
            shell_quote(&invocation.script),
            quoted_args(&invocation.args)
        );
    }
    script.push_str("exit 0\n");
    script
}

/// Container path of a stage's wrapper for `kind`.
pub fn wrapper_path(stage: StageId, kind: HookKind) -> String {
    format!("{}/{}", stage_generated_dir(stage), kind.wrapper_file_name())
}

/// Link name of a stage's login snippet under `/etc/profile.d`.
pub fn profile_link(stage: StageId) -> String {
    format!("{PROFILE_DIR}/stagehand-{}.sh", stage.name())
}

/// Snippet sourced by login shells. Profile scripts are sourced, so the
/// wrapper runs in a child shell and a failing hook never ends the login.
pub fn login_profile(stage: StageId) -> String {
    let wrapper = wrapper_path(stage, HookKind::OnUserLogin);
    format!(
        "# Generated by stagehand. Do not edit.\n\
         # Sourced from {link} by login shells.\n\
         if [ -x {wrapper} ]; then\n    \
         {wrapper} || printf '[stagehand] {stage} {hook} exited with %s\\n' \"$?\" >&2\n\
         fi\n",
        link = profile_link(stage),
        wrapper = shell_quote(&wrapper),
        hook = HookKind::OnUserLogin,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv(script: &str, args: &[&str]) -> HookInvocation {
        HookInvocation::new(script, args.iter().map(|a| (*a).to_owned()).collect())
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("hello"), "'hello'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
        assert_eq!(shell_quote("$(rm -rf /)"), "'$(rm -rf /)'");
    }

    #[test]
    fn list_wrapper_runs_targets_in_order_and_fails_fast() {
        let script = hook_wrapper(
            StageId::One,
            HookKind::OnFirstRun,
            &[inv("/opt/a.sh", &["x y"]), inv("/opt/b.sh", &[])],
        );
        assert!(script.starts_with("#!/bin/sh\n"));
        let a = script.find("stagehand_run '/opt/a.sh' 'x y' || exit $?").unwrap();
        let b = script.find("stagehand_run '/opt/b.sh' || exit $?").unwrap();
        assert!(a < b);
        assert!(script.contains("exit 127"));
        assert!(!script.contains("exec "));
    }

    #[test]
    fn wrapper_logs_only_when_verbose() {
        let script = hook_wrapper(StageId::Two, HookKind::OnEveryRun, &[inv("/a", &[])]);
        assert!(script.contains(r#"if [ "${STAGEHAND_VERBOSE:-0}" = "1" ]; then"#));
    }

    #[test]
    fn entry_wrapper_execs_with_forwarded_args() {
        let script = hook_wrapper(
            StageId::Two,
            HookKind::OnEntry,
            &[inv("/stagehand/installation/stage-2/entry.sh", &["--port", "80"])],
        );
        assert!(script.contains(r#"exec "$target" '--port' '80' "$@""#));
        assert!(script.contains(r#"exec /bin/sh "$target" '--port' '80' "$@""#));
        assert!(!script.contains("stagehand_run"));
    }

    #[test]
    fn login_profile_points_at_stage_wrapper() {
        let profile = login_profile(StageId::One);
        assert!(profile.contains("'/stagehand/generated/stage-1/on_user_login.sh'"));
        assert!(profile.contains("/etc/profile.d/stagehand-stage-1.sh"));
        assert!(!profile.contains("exit "));
    }
}
