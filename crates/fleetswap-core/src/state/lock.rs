//! Exclusive per-environment lock file.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::warn;

use crate::error::{DeployError, Result};

/// Held for the duration of one command against an environment.
///
/// The file is created exclusively and removed on drop.
#[derive(Debug)]
pub struct EnvironmentLock {
    path: PathBuf,
}

impl EnvironmentLock {
    pub fn lock_path(dir: &Path, project: &str, environment: &str) -> PathBuf {
        dir.join(format!("{}-{}.lock", project, environment))
    }

    pub fn acquire(dir: &Path, project: &str, environment: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        let path = Self::lock_path(dir, project, environment);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{}", std::process::id())
                    .with_context(|| format!("Failed to write lock file: {}", path.display()))?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = fs::read_to_string(&path).unwrap_or_default();
                Err(DeployError::precondition(format!(
                    "environment '{}' is locked by another run (pid {}); remove {} if that run is gone",
                    environment,
                    owner.trim(),
                    path.display()
                )))
            }
            Err(e) => Err(DeployError::State(
                anyhow::Error::new(e)
                    .context(format!("Failed to create lock file: {}", path.display())),
            )),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for EnvironmentLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}
