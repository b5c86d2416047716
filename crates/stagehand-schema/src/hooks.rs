use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the two sequential image stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StageId {
    #[serde(rename = "stage-1")]
    One,
    #[serde(rename = "stage-2")]
    Two,
}

impl StageId {
    pub const ALL: [Self; 2] = [Self::One, Self::Two];

    pub fn number(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::One => "stage-1",
            Self::Two => "stage-2",
        }
    }

    /// Key of this stage's table in the configuration document.
    pub fn config_key(self) -> &'static str {
        match self {
            Self::One => "stage_1",
            Self::Two => "stage_2",
        }
    }

    /// Stages whose hooks are present in a container of this stage, in run order.
    pub fn up_to(self) -> &'static [Self] {
        match self {
            Self::One => &[Self::One],
            Self::Two => &Self::ALL,
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" | "stage-1" | "stage_1" => Ok(Self::One),
            "2" | "stage-2" | "stage_2" => Ok(Self::Two),
            other => Err(format!("unknown stage '{other}', expected 1 or 2")),
        }
    }
}

/// A named lifecycle point at which configured scripts run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    OnBuild,
    OnFirstRun,
    OnEveryRun,
    OnUserLogin,
    OnEntry,
}

impl HookKind {
    pub const ALL: [Self; 5] = [
        Self::OnBuild,
        Self::OnFirstRun,
        Self::OnEveryRun,
        Self::OnUserLogin,
        Self::OnEntry,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::OnBuild => "on_build",
            Self::OnFirstRun => "on_first_run",
            Self::OnEveryRun => "on_every_run",
            Self::OnUserLogin => "on_user_login",
            Self::OnEntry => "on_entry",
        }
    }

    /// Build-time hooks run while the image layer is produced; their
    /// arguments cannot see runtime mounts.
    pub fn is_build_time(self) -> bool {
        matches!(self, Self::OnBuild)
    }

    pub fn wrapper_file_name(self) -> String {
        format!("{}.sh", self.name())
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single hook target with its baked arguments, as seen inside the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookInvocation {
    pub script: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl HookInvocation {
    pub fn new(script: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            script: script.into(),
            args,
        }
    }
}

/// Declarative, ordered hook lists for one stage.
///
/// Written next to the wrapper scripts as `hooks.json` and read by the
/// entrypoint's sequential executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookPlan {
    pub stage: StageId,
    #[serde(default)]
    pub hooks: BTreeMap<HookKind, Vec<HookInvocation>>,
}

impl HookPlan {
    pub fn new(stage: StageId) -> Self {
        Self {
            stage,
            hooks: BTreeMap::new(),
        }
    }

    pub fn get(&self, kind: HookKind) -> &[HookInvocation] {
        self.hooks.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Store a list; empty lists are dropped so the plan stays canonical.
    pub fn set(&mut self, kind: HookKind, invocations: Vec<HookInvocation>) {
        if invocations.is_empty() {
            self.hooks.remove(&kind);
        } else {
            self.hooks.insert(kind, invocations);
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}
