//! Storage keywords, explicit mounts and their container-side destinations.

use crate::config::{ConfigError, KeyedEntries, MountEntry, MountKind, StorageEntry};
use crate::hooks::StageId;
use crate::paths::{APP_DIR, DATA_DIR, WORKSPACE_DIR};
use crate::subst::{substitute, EnvSource, SubstContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKeyword {
    App,
    Data,
    Workspace,
}

impl StorageKeyword {
    pub const ALL: [Self; 3] = [Self::App, Self::Data, Self::Workspace];

    pub fn name(self) -> &'static str {
        match self {
            Self::App => "app",
            Self::Data => "data",
            Self::Workspace => "workspace",
        }
    }

    pub fn destination(self) -> &'static str {
        match self {
            Self::App => APP_DIR,
            Self::Data => DATA_DIR,
            Self::Workspace => WORKSPACE_DIR,
        }
    }
}

impl FromStr for StorageKeyword {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|k| k.name() == s).ok_or(())
    }
}

/// The two independent naming namespaces for attached storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountOrigin {
    Storage,
    Mount,
}

impl MountOrigin {
    pub fn section(self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Mount => "mount",
        }
    }
}

/// A storage entry or mount after substitution, ready for the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMount {
    pub origin: MountOrigin,
    pub key: String,
    pub kind: MountKind,
    /// Volume name or host path, in manifest syntax.
    pub source: String,
    pub destination: String,
}

impl ResolvedMount {
    /// Label used in diagnostics, e.g. `mount 'cache'`.
    pub fn label(&self) -> String {
        format!("{} '{}'", self.origin.section(), self.key)
    }

    /// Key of the top-level volume declaration for named volumes.
    pub fn volume_key(&self, stage: StageId) -> String {
        format!("{}-{}-{}", stage.name(), self.origin.section(), self.key)
    }

    /// Compose short syntax `source:destination`.
    pub fn compose_spec(&self, stage: StageId) -> String {
        match self.kind {
            MountKind::Volume => format!("{}:{}", self.volume_key(stage), self.destination),
            MountKind::Host => format!("{}:{}", self.source, self.destination),
        }
    }
}

/// Non-fatal findings reported alongside a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    DuplicateDestination {
        stage: StageId,
        destination: String,
        first: String,
        second: String,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateDestination {
                stage,
                destination,
                first,
                second,
            } => write!(
                f,
                "{stage}: {first} and {second} both mount at {destination}"
            ),
        }
    }
}

pub fn resolve_storage(
    project: &str,
    stage: StageId,
    entries: &KeyedEntries<StorageEntry>,
    env: &impl EnvSource,
) -> Result<Vec<ResolvedMount>, ConfigError> {
    if let Some(key) = entries.first_duplicate() {
        return Err(ConfigError::DuplicateKey {
            stage,
            section: "storage",
            key: key.to_owned(),
        });
    }

    let mut resolved = Vec::with_capacity(entries.len());
    for (key, entry) in entries.iter() {
        let keyword: StorageKeyword =
            key.parse()
                .map_err(|()| ConfigError::UnknownStorageKeyword {
                    stage,
                    keyword: key.to_owned(),
                })?;
        let field = format!("{}.storage.{key}.src", stage.config_key());
        let source = resolve_source(
            project,
            stage,
            MountOrigin::Storage,
            key,
            entry.kind,
            entry.src.as_deref(),
            &field,
            env,
        )?;
        resolved.push(ResolvedMount {
            origin: MountOrigin::Storage,
            key: key.to_owned(),
            kind: entry.kind,
            source,
            destination: keyword.destination().to_owned(),
        });
    }
    resolved.sort_by_key(|m| m.key.parse::<StorageKeyword>().ok());
    Ok(resolved)
}

pub fn resolve_mounts(
    project: &str,
    stage: StageId,
    entries: &KeyedEntries<MountEntry>,
    env: &impl EnvSource,
) -> Result<Vec<ResolvedMount>, ConfigError> {
    if let Some(key) = entries.first_duplicate() {
        return Err(ConfigError::DuplicateKey {
            stage,
            section: "mount",
            key: key.to_owned(),
        });
    }

    let mut resolved = Vec::with_capacity(entries.len());
    for (key, entry) in entries.iter() {
        let prefix = format!("{}.mount.{key}", stage.config_key());
        let destination = substitute(&entry.dst_path, env, SubstContext::Baked)
            .map_err(|e| ConfigError::subst(format!("{prefix}.dst_path"), e))?;
        if !destination.starts_with('/') {
            return Err(ConfigError::RelativeMountDestination {
                stage,
                key: key.to_owned(),
                path: destination,
            });
        }
        let source = resolve_source(
            project,
            stage,
            MountOrigin::Mount,
            key,
            entry.kind,
            entry.src.as_deref(),
            &format!("{prefix}.src"),
            env,
        )?;
        resolved.push(ResolvedMount {
            origin: MountOrigin::Mount,
            key: key.to_owned(),
            kind: entry.kind,
            source,
            destination: normalize_destination(&destination),
        });
    }
    resolved.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(resolved)
}

#[allow(clippy::too_many_arguments)]
fn resolve_source(
    project: &str,
    stage: StageId,
    origin: MountOrigin,
    key: &str,
    kind: MountKind,
    src: Option<&str>,
    field: &str,
    env: &impl EnvSource,
) -> Result<String, ConfigError> {
    match (kind, src) {
        (_, Some(raw)) => {
            substitute(raw, env, SubstContext::Manifest).map_err(|e| ConfigError::subst(field, e))
        }
        (MountKind::Volume, None) => Ok(automatic_volume_name(project, stage, origin, key)),
        (MountKind::Host, None) => Err(ConfigError::MissingMountSource {
            stage,
            section: origin.section(),
            key: key.to_owned(),
        }),
    }
}

/// Storage volumes are `<project>-<stage>-<keyword>`; mount volumes carry a
/// `mount-` segment so a mount keyed like a keyword gets its own volume.
fn automatic_volume_name(project: &str, stage: StageId, origin: MountOrigin, key: &str) -> String {
    match origin {
        MountOrigin::Storage => format!("{project}-{}-{key}", stage.name()),
        MountOrigin::Mount => format!("{project}-{}-mount-{key}", stage.name()),
    }
}

fn normalize_destination(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Report every pair of distinct entries sharing a destination.
pub fn destination_collisions<'a>(
    stage: StageId,
    mounts: impl IntoIterator<Item = &'a ResolvedMount>,
) -> Vec<Warning> {
    let mut seen: BTreeMap<&str, &ResolvedMount> = BTreeMap::new();
    let mut warnings = Vec::new();
    for mount in mounts {
        match seen.get(mount.destination.as_str()) {
            Some(first) => {
                tracing::warn!(
                    "{stage}: {} and {} share destination {}",
                    first.label(),
                    mount.label(),
                    mount.destination
                );
                warnings.push(Warning::DuplicateDestination {
                    stage,
                    destination: mount.destination.clone(),
                    first: first.label(),
                    second: mount.label(),
                });
            }
            None => {
                seen.insert(&mount.destination, mount);
            }
        }
    }
    warnings
}
