use crate::normalize::ResolvedProject;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label carrying the fingerprint on images and compose services.
pub const FINGERPRINT_LABEL: &str = "org.stagehand.config-hash";

/// Deterministic identity of a resolved project.
///
/// Two configurations that resolve to the same project, under the same
/// environment snapshot, share a fingerprint regardless of key order or
/// formatting in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFingerprint {
    pub hash: String,
    pub short: String,
}

impl fmt::Display for ConfigFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hash)
    }
}

pub fn fingerprint(project: &ResolvedProject) -> Result<ConfigFingerprint, serde_json::Error> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"stagehand:v");
    hasher.update(project.config_version.to_string().as_bytes());
    hasher.update(b"\n");
    hasher.update(project.canonical_json()?.as_bytes());

    let hash = hasher.finalize().to_hex().to_string();
    let short = hash[..12].to_owned();
    Ok(ConfigFingerprint { hash, short })
}
