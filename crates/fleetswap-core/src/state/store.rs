//! Ledger persistence in the state directory
//!
//! One JSON file per project, written atomically (tmp + rename).

use std::fs;
use std::path::PathBuf;

use anyhow::Context;

use super::ledger::RoleLedger;

#[derive(Debug, Clone)]
pub struct LedgerStore {
    dir: PathBuf,
    project: String,
}

impl LedgerStore {
    pub fn new(dir: PathBuf, project: impl Into<String>) -> Self {
        Self {
            dir,
            project: project.into(),
        }
    }

    /// Default state directory
    ///
    /// - Unix: `$XDG_STATE_HOME/fleetswap` or `~/.local/state/fleetswap`
    /// - elsewhere: the local data directory
    pub fn default_dir() -> anyhow::Result<PathBuf> {
        let base = dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .ok_or_else(|| anyhow::anyhow!("Cannot determine state directory"))?;
        Ok(base.join("fleetswap"))
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.roles.json", self.project))
    }

    /// Load the ledger, or an empty one if none was written yet.
    pub fn load(&self) -> anyhow::Result<RoleLedger> {
        let path = self.path();
        if !path.exists() {
            return Ok(RoleLedger::new());
        }
        let bytes =
            fs::read(&path).with_context(|| format!("Failed to read ledger: {}", path.display()))?;
        let ledger: RoleLedger = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse ledger: {}", path.display()))?;
        ledger.validate()?;
        Ok(ledger)
    }

    pub fn save(&self, ledger: &RoleLedger) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create state directory: {}", self.dir.display())
        })?;

        let path = self.path();
        let tmp_path = self
            .dir
            .join(format!("{}.roles.json.{}.tmp", self.project, std::process::id()));

        let bytes = serde_json::to_vec_pretty(ledger).context("Failed to serialize ledger")?;
        fs::write(&tmp_path, bytes)
            .with_context(|| format!("Failed to write tmp ledger: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("Failed to rename tmp ledger: {}", tmp_path.display()))?;
        Ok(())
    }
}
