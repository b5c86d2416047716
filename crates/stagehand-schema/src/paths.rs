//! Container-side path layout and the build-time path guard.

use crate::hooks::StageId;
use crate::subst::{identifier_len, parse, Segment};

pub const STAGEHAND_ROOT: &str = "/stagehand";
pub const APP_DIR: &str = "/stagehand/app";
pub const DATA_DIR: &str = "/stagehand/data";
pub const WORKSPACE_DIR: &str = "/stagehand/workspace";
pub const INSTALL_DIR: &str = "/stagehand/installation";
pub const GENERATED_DIR: &str = "/stagehand/generated";
pub const LEDGER_DIR: &str = "/var/lib/stagehand/ledger";
pub const ENTRY_BINARY: &str = "/usr/local/bin/stagehand-entry";
pub const PROFILE_DIR: &str = "/etc/profile.d";

/// Declarative hook plan next to each stage's wrappers.
pub const HOOK_PLAN_FILE: &str = "hooks.json";
pub const LOGIN_PROFILE_FILE: &str = "login-profile.sh";

pub const ENV_VERBOSE: &str = "STAGEHAND_VERBOSE";
pub const ENV_STAGE: &str = "STAGEHAND_STAGE";
pub const ENV_INSTALL_DIR: &str = "STAGEHAND_INSTALL_DIR";
pub const ENV_STAGE_1_DIR: &str = "STAGEHAND_STAGE_1_DIR";
pub const ENV_STAGE_2_DIR: &str = "STAGEHAND_STAGE_2_DIR";
pub const ENV_GENERATED_DIR: &str = "STAGEHAND_GENERATED_DIR";
pub const ENV_LEDGER_DIR: &str = "STAGEHAND_LEDGER_DIR";
pub const ENV_APP_DIR: &str = "STAGEHAND_APP_DIR";
pub const ENV_DATA_DIR: &str = "STAGEHAND_DATA_DIR";
pub const ENV_WORKSPACE_DIR: &str = "STAGEHAND_WORKSPACE_DIR";

/// Variables whose values point at storage that only exists once the
/// container runs.
pub const RUNTIME_ONLY_VARS: [&str; 3] = [ENV_APP_DIR, ENV_DATA_DIR, ENV_WORKSPACE_DIR];

pub fn stage_install_dir(stage: StageId) -> String {
    format!("{INSTALL_DIR}/{}", stage.name())
}

pub fn stage_generated_dir(stage: StageId) -> String {
    format!("{GENERATED_DIR}/{}", stage.name())
}

/// Map a configured script path to its location inside the image.
/// Relative paths live under the copied installation directory.
pub fn container_script_path(script: &str) -> String {
    if script.starts_with('/') {
        script.to_owned()
    } else {
        format!("{INSTALL_DIR}/{}", script.trim_start_matches("./"))
    }
}

/// Environment every generated image exports, sorted by name.
pub fn image_environment(stage: StageId) -> Vec<(&'static str, String)> {
    vec![
        (ENV_APP_DIR, APP_DIR.to_owned()),
        (ENV_DATA_DIR, DATA_DIR.to_owned()),
        (ENV_GENERATED_DIR, GENERATED_DIR.to_owned()),
        (ENV_INSTALL_DIR, INSTALL_DIR.to_owned()),
        (ENV_LEDGER_DIR, LEDGER_DIR.to_owned()),
        (ENV_STAGE, stage.number().to_string()),
        (ENV_STAGE_1_DIR, stage_install_dir(StageId::One)),
        (ENV_STAGE_2_DIR, stage_install_dir(StageId::Two)),
        (ENV_WORKSPACE_DIR, WORKSPACE_DIR.to_owned()),
    ]
}

/// What a build-time value referenced that only exists at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeReference {
    Variable(String),
    Prefix(String),
}

impl std::fmt::Display for RuntimeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Variable(name) => write!(f, "runtime-only variable ${name}"),
            Self::Prefix(prefix) => write!(f, "runtime-only path {prefix}"),
        }
    }
}

/// Detects build-time references to storage and mounts that are only
/// attached when the container starts.
#[derive(Debug, Clone)]
pub struct RuntimePathGuard {
    prefixes: Vec<String>,
}

impl RuntimePathGuard {
    pub fn new<'a>(mount_destinations: impl IntoIterator<Item = &'a str>) -> Self {
        let mut prefixes: Vec<String> = [APP_DIR, DATA_DIR, WORKSPACE_DIR]
            .into_iter()
            .chain(mount_destinations)
            .map(|p| p.trim_end_matches('/').to_owned())
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort();
        prefixes.dedup();
        Self { prefixes }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Check the unresolved spelling for runtime-only variable names.
    pub fn check_raw(&self, raw: &str) -> Option<RuntimeReference> {
        let segments = parse(raw).ok()?;
        for segment in &segments {
            match segment {
                Segment::Token(token) => {
                    if RUNTIME_ONLY_VARS.contains(&token.name.as_str()) {
                        return Some(RuntimeReference::Variable(token.name.clone()));
                    }
                }
                Segment::Literal(text) => {
                    if let Some(name) = bare_runtime_variable(text) {
                        return Some(RuntimeReference::Variable(name.to_owned()));
                    }
                }
            }
        }
        None
    }

    /// Check a resolved value for runtime-only path prefixes.
    pub fn check_resolved(&self, resolved: &str) -> Option<RuntimeReference> {
        self.prefixes
            .iter()
            .find(|prefix| contains_path_prefix(resolved, prefix))
            .map(|prefix| RuntimeReference::Prefix(prefix.clone()))
    }
}

fn bare_runtime_variable(text: &str) -> Option<&'static str> {
    for (idx, _) in text.match_indices('$') {
        let rest = &text[idx + 1..];
        let len = identifier_len(rest);
        if let Some(name) = RUNTIME_ONLY_VARS
            .into_iter()
            .find(|name| len == name.len() && rest.starts_with(name))
        {
            return Some(name);
        }
    }
    None
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// True when `prefix` occurs in `value` as a whole path: not preceded by a
/// path segment and followed by end, `/`, or a non-path character.
fn contains_path_prefix(value: &str, prefix: &str) -> bool {
    value.match_indices(prefix).any(|(idx, _)| {
        let before_ok = value[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !is_path_char(c) && c != '/');
        let after_ok = value[idx + prefix.len()..]
            .chars()
            .next()
            .map_or(true, |c| c == '/' || !is_path_char(c));
        before_ok && after_ok
    })
}
