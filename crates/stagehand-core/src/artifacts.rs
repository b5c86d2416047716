use crate::concurrency::ArtifactLock;
use crate::CoreError;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFile {
    pub contents: String,
    pub executable: bool,
}

/// Generated files keyed by their path relative to the output directory.
///
/// Directories registered with [`ArtifactSet::own_dir`] belong to the set
/// entirely: writing prunes any file under them the set does not contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSet {
    files: BTreeMap<PathBuf, ArtifactFile>,
    owned_dirs: BTreeSet<PathBuf>,
}

impl ArtifactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        path: impl Into<PathBuf>,
        contents: String,
        executable: bool,
    ) -> Result<(), CoreError> {
        let path = path.into();
        if !is_relative_path(&path) {
            return Err(CoreError::InvalidArtifactPath(path.display().to_string()));
        }
        self.files.insert(
            path,
            ArtifactFile {
                contents,
                executable,
            },
        );
        Ok(())
    }

    pub fn own_dir(&mut self, path: impl Into<PathBuf>) -> Result<(), CoreError> {
        let path = path.into();
        if !is_relative_path(&path) {
            return Err(CoreError::InvalidArtifactPath(path.display().to_string()));
        }
        self.owned_dirs.insert(path);
        Ok(())
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&ArtifactFile> {
        self.files.get(path.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &ArtifactFile)> {
        self.files.iter().map(|(p, f)| (p.as_path(), f))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write every file under `output_dir` while holding the directory lock.
    /// Each file is replaced atomically. Stale files inside owned directories
    /// are removed; everything else not in the set is left alone.
    pub fn write_to(&self, output_dir: &Path) -> Result<usize, CoreError> {
        let _lock = ArtifactLock::acquire(output_dir)?;

        for owned in &self.owned_dirs {
            let root = output_dir.join(owned);
            if root.is_dir() {
                self.prune(output_dir, &root)?;
            }
        }

        for (relative, file) in &self.files {
            let dest = output_dir.join(relative);
            let dir = dest.parent().unwrap_or(output_dir);
            fs::create_dir_all(dir)?;

            let mut tmp = NamedTempFile::new_in(dir)?;
            tmp.write_all(file.contents.as_bytes())?;
            let mode = if file.executable { 0o755 } else { 0o644 };
            tmp.as_file()
                .set_permissions(fs::Permissions::from_mode(mode))?;
            tmp.as_file().sync_all()?;
            tmp.persist(&dest).map_err(|e| CoreError::Io(e.error))?;
            debug!("wrote {}", dest.display());
        }

        Ok(self.files.len())
    }

    /// Remove files under `dir` that are not part of the set, then any
    /// directories left empty.
    fn prune(&self, output_dir: &Path, dir: &Path) -> Result<(), CoreError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.prune(output_dir, &path)?;
                if fs::read_dir(&path)?.next().is_none() {
                    fs::remove_dir(&path)?;
                }
                continue;
            }
            let relative = path.strip_prefix(output_dir).unwrap_or(&path);
            if !self.files.contains_key(relative) {
                fs::remove_file(&path)?;
                debug!("removed stale {}", path.display());
            }
        }
        Ok(())
    }
}

fn is_relative_path(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}
