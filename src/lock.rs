//! Advisory file locks on the manifest.
//!
//! The manifest is the only resource shared between concurrent `subsync`
//! processes, so it is the only one guarded by a lock. The lock is taken on
//! the manifest file itself and released when the [`ManifestLock`] handle is
//! dropped, which covers every exit path of an edit cycle.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};

/// How often a contended exclusive lock is retried.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// An open, locked handle to the manifest file.
#[derive(Debug)]
pub struct ManifestLock {
    file: File,
    path: PathBuf,
}

impl ManifestLock {
    /// Open (creating it if needed) and exclusively lock the file at `path`.
    ///
    /// Waits until no other process holds a lock on the file, or returns
    /// [`Error::Cancelled`] if `cancel` is raised while waiting.
    pub fn exclusive(path: &Path, cancel: &CancellationToken) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| Error::fs(path, e))?;

        let mut waiting = false;
        loop {
            match FileExt::try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    if !waiting {
                        log::info!("Waiting for another process to release {}", path.display());
                        waiting = true;
                    }
                    cancel.check()?;
                    thread::sleep(LOCK_POLL_INTERVAL);
                }
                Err(e) => {
                    return Err(Error::ManifestLock {
                        path: path.to_path_buf(),
                        message: e.to_string(),
                    })
                }
            }
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Open and lock the file at `path` for reading only.
    ///
    /// Returns `Ok(None)` when the file does not exist.
    pub fn shared(path: &Path) -> Result<Option<Self>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::fs(path, e)),
        };

        FileExt::lock_shared(&file).map_err(|e| Error::ManifestLock {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
        }))
    }

    /// Path of the locked file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole file from the beginning.
    pub fn read_to_string(&mut self) -> Result<String> {
        let mut content = String::new();
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut content))
            .map_err(|e| Error::fs(&self.path, e))?;
        Ok(content)
    }

    /// Truncate the file and replace its content.
    pub fn rewrite(&mut self, content: &str) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.set_len(0))
            .and_then(|_| self.file.write_all(content.as_bytes()))
            .and_then(|_| self.file.sync_all())
            .map_err(|e| Error::fs(&self.path, e))
    }
}

impl Drop for ManifestLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            log::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}
