use crate::CoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::Path;

/// Lock file guarding an output directory while artifacts are written.
pub const LOCK_FILE_NAME: &str = ".stagehand.lock";

/// Exclusive advisory lock on an output directory, released on drop.
pub struct ArtifactLock {
    lock_file: File,
}

impl ArtifactLock {
    pub fn acquire(output_dir: &Path) -> Result<Self, CoreError> {
        let file = open_lock_file(output_dir)?;
        file.lock_exclusive()
            .map_err(|e| CoreError::Io(std::io::Error::new(std::io::ErrorKind::WouldBlock, e)))?;
        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(output_dir: &Path) -> Result<Option<Self>, CoreError> {
        let file = open_lock_file(output_dir)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

fn open_lock_file(output_dir: &Path) -> Result<File, CoreError> {
    std::fs::create_dir_all(output_dir)?;
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(output_dir.join(LOCK_FILE_NAME))?)
}

impl Drop for ArtifactLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}
