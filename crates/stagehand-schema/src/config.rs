use crate::hooks::{HookKind, StageId};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use thiserror::Error;

use crate::subst::SubstError;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to parse config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("unsupported config_version: {0}, expected 1")]
    UnsupportedVersion(u32),
    #[error("invalid project name '{0}': use lowercase letters, digits, '.', '_' or '-'")]
    InvalidProjectName(String),
    #[error("stage_1.image.base must not be empty")]
    MissingBaseImage,
    #[error("stage_2.image.base is not supported: stage-2 always builds from the stage-1 image")]
    Stage2BaseImage,
    #[error("{stage}: unknown storage keyword '{keyword}', expected one of app, data, workspace")]
    UnknownStorageKeyword { stage: StageId, keyword: String },
    #[error("{stage}: duplicate {section} key '{key}'")]
    DuplicateKey {
        stage: StageId,
        section: &'static str,
        key: String,
    },
    #[error("{stage}: mount '{key}' needs an absolute dst_path, got '{path}'")]
    RelativeMountDestination {
        stage: StageId,
        key: String,
        path: String,
    },
    #[error("{stage}: {section} '{key}' of type host needs a src path")]
    MissingMountSource {
        stage: StageId,
        section: &'static str,
        key: String,
    },
    #[error("{stage}: invalid environment variable name '{name}'")]
    InvalidEnvName { stage: StageId, name: String },
    #[error("{stage}: {hook} entry #{index} has an empty script path")]
    EmptyHookScript {
        stage: StageId,
        hook: HookKind,
        index: usize,
    },
    #[error("{stage}: on_entry accepts a single entry, found {count}")]
    MultipleEntryHooks { stage: StageId, count: usize },
    #[error("{stage}: on_build argument '{argument}' references {reference}, which is not available at build time")]
    RuntimePathInBuild {
        stage: StageId,
        argument: String,
        reference: String,
    },
    #[error("{field}: {source}")]
    Substitution {
        field: String,
        #[source]
        source: SubstError,
    },
}

impl ConfigError {
    pub(crate) fn subst(field: impl Into<String>, source: SubstError) -> Self {
        Self::Substitution {
            field: field.into(),
            source,
        }
    }
}

/// Raw project configuration, as authored.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default = "default_config_version")]
    pub config_version: u32,
    pub project: ProjectSection,
    pub stage_1: StageConfig,
    #[serde(default)]
    pub stage_2: StageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    #[serde(default)]
    pub image: ImageSection,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub environment: KeyedEntries<String>,
    #[serde(default)]
    pub ssh: SshSection,
    #[serde(default)]
    pub gpu: bool,
    #[serde(default)]
    pub storage: KeyedEntries<StorageEntry>,
    #[serde(default)]
    pub mount: KeyedEntries<MountEntry>,
    #[serde(default)]
    pub on_build: Vec<HookEntry>,
    #[serde(default)]
    pub on_first_run: Vec<HookEntry>,
    #[serde(default)]
    pub on_every_run: Vec<HookEntry>,
    #[serde(default)]
    pub on_user_login: Vec<HookEntry>,
    #[serde(default)]
    pub on_entry: Vec<HookEntry>,
}

impl StageConfig {
    pub fn hooks(&self, kind: HookKind) -> &[HookEntry] {
        match kind {
            HookKind::OnBuild => &self.on_build,
            HookKind::OnFirstRun => &self.on_first_run,
            HookKind::OnEveryRun => &self.on_every_run,
            HookKind::OnUserLogin => &self.on_user_login,
            HookKind::OnEntry => &self.on_entry,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ImageSection {
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SshSection {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub host_port: Option<String>,
}

impl Default for SshSection {
    fn default() -> Self {
        Self {
            enable: false,
            port: default_ssh_port(),
            host_port: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    Volume,
    Host,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StorageEntry {
    #[serde(rename = "type")]
    pub kind: MountKind,
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MountEntry {
    #[serde(rename = "type")]
    pub kind: MountKind,
    #[serde(default)]
    pub src: Option<String>,
    pub dst_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct HookEntry {
    pub script: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A keyed table that keeps every entry in document order, duplicates
/// included, so validation can report a repeated key by name instead of
/// letting the last one silently win.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyedEntries<T>(pub Vec<(String, T)>);

impl<T> Default for KeyedEntries<T> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<T> KeyedEntries<T> {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First key that appears more than once.
    pub fn first_duplicate(&self) -> Option<&str> {
        let mut seen = std::collections::BTreeSet::new();
        self.0
            .iter()
            .map(|(k, _)| k.as_str())
            .find(|k| !seen.insert(*k))
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for KeyedEntries<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<T: Serialize> Serialize for KeyedEntries<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for KeyedEntries<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for EntriesVisitor<T> {
            type Value = KeyedEntries<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of named entries")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, T>()? {
                    entries.push((key, value));
                }
                Ok(KeyedEntries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor(PhantomData))
    }
}

fn default_config_version() -> u32 {
    CONFIG_VERSION
}

fn default_ssh_port() -> u16 {
    22
}

/// Input syntax of a configuration document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

pub fn parse_config_str(input: &str, format: ConfigFormat) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig = match format {
        ConfigFormat::Toml => toml::from_str(input)?,
        ConfigFormat::Yaml => serde_yaml::from_str(input)?,
    };
    if config.config_version != CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(config.config_version));
    }
    Ok(config)
}

pub fn parse_config_file(path: impl AsRef<Path>) -> Result<ProjectConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    parse_config_str(&content, ConfigFormat::from_path(path))
}

impl ProjectConfig {
    pub fn stage(&self, id: StageId) -> &StageConfig {
        match id {
            StageId::One => &self.stage_1,
            StageId::Two => &self.stage_2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
config_version = 1

[project]
name = "demo"

[stage_1]
ports = ["2222:22", "{{HOST_IP:-127.0.0.1}}:8080:80"]
gpu = true

[stage_1.image]
base = "ubuntu:24.04"
output = "demo:stage-1"

[stage_1.ssh]
enable = true
host_port = "2200"

[stage_1.environment]
TZ = "UTC"

[stage_1.storage.data]
type = "volume"

[stage_1.mount.cache]
type = "host"
src = "/srv/cache"
dst_path = "/mnt/cache"

[[stage_1.on_build]]
script = "stage-1/system/apt/install.sh"
args = ["git", "curl"]

[[stage_2.on_entry]]
script = "stage-2/entry.sh"
"#;

    #[test]
    fn parses_full_config() {
        let config = parse_config_str(FULL, ConfigFormat::Toml).expect("should parse");
        assert_eq!(config.project.name, "demo");
        assert_eq!(config.stage_1.ports.len(), 2);
        assert!(config.stage_1.gpu);
        assert!(config.stage_1.ssh.enable);
        assert_eq!(config.stage_1.ssh.port, 22);
        assert_eq!(config.stage_1.storage.len(), 1);
        assert_eq!(config.stage_1.on_build[0].args, vec!["git", "curl"]);
        assert_eq!(config.stage_2.on_entry.len(), 1);
        assert!(config.stage_2.ports.is_empty());
    }

    #[test]
    fn parses_minimal_config() {
        let input = r#"
[project]
name = "demo"
[stage_1.image]
base = "ubuntu:24.04"
"#;
        let config = parse_config_str(input, ConfigFormat::Toml).unwrap();
        assert_eq!(config.config_version, 1);
        assert_eq!(config.stage_2, StageConfig::default());
    }

    #[test]
    fn rejects_unknown_fields() {
        let input = r#"
[project]
name = "demo"
[stage_1]
volumes = []
"#;
        assert!(parse_config_str(input, ConfigFormat::Toml).is_err());
    }

    #[test]
    fn rejects_unsupported_version() {
        let input = r#"
config_version = 7
[project]
name = "demo"
[stage_1]
"#;
        assert!(matches!(
            parse_config_str(input, ConfigFormat::Toml),
            Err(ConfigError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn yaml_keeps_duplicate_mount_keys_for_validation() {
        let input = r"
project:
  name: demo
stage_1:
  mount:
    data:
      type: volume
      dst_path: /a
    data:
      type: volume
      dst_path: /b
";
        let config = parse_config_str(input, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.stage_1.mount.len(), 2);
        assert_eq!(config.stage_1.mount.first_duplicate(), Some("data"));
    }

    #[test]
    fn toml_duplicate_table_names_the_key() {
        let input = r#"
[project]
name = "demo"
[stage_1.mount.data]
type = "volume"
dst_path = "/a"
[stage_1.mount.data]
type = "volume"
dst_path = "/b"
"#;
        let err = parse_config_str(input, ConfigFormat::Toml).unwrap_err();
        assert!(err.to_string().contains("data"), "got: {err}");
    }

    #[test]
    fn parse_file_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stagehand.yaml");
        fs::write(
            &path,
            "project:\n  name: demo\nstage_1:\n  image:\n    base: debian\n",
        )
        .unwrap();
        let config = parse_config_file(&path).unwrap();
        assert_eq!(config.stage(StageId::One).image.base.as_deref(), Some("debian"));
        assert!(matches!(
            parse_config_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("stagehand.yml")),
            ConfigFormat::Yaml
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("stagehand.toml")),
            ConfigFormat::Toml
        );
    }

    #[test]
    fn keyed_entries_preserve_document_order() {
        let input = r#"
[project]
name = "demo"
[stage_1.environment]
ZED = "1"
ALPHA = "2"
"#;
        let config = parse_config_str(input, ConfigFormat::Toml).unwrap();
        let keys: Vec<_> = config.stage_1.environment.iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&"ZED") && keys.contains(&"ALPHA"));
    }
}
