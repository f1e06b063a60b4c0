//! Run Vault
//!
//! Optional flat-file persistence for research runs. Records are stored as
//! JSON under `<root>/runs/`, keyed by a hash of the query plus the storage
//! timestamp, so repeated runs of the same query sit next to each other
//! without colliding.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use drafthorse_core::ResearchRecord;

use crate::error::{EngineError, EngineResult};

/// Hex characters of the query hash used in filenames
const KEY_HASH_LEN: usize = 12;

/// Flat-file store for research run records.
pub struct ResearchVault {
    root: PathBuf,
}

impl ResearchVault {
    /// Open a vault at the given root, creating the directory tree.
    pub fn open(root: impl Into<PathBuf>) -> EngineResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join("runs"))?;
        Ok(Self { root })
    }

    /// Open the default per-user vault location.
    pub fn open_default() -> EngineResult<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| EngineError::config("no data directory available"))?;
        Self::open(base.join("drafthorse"))
    }

    /// Store a run record. Returns the path it was written to.
    pub fn store(&self, record: &ResearchRecord) -> EngineResult<PathBuf> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| EngineError::internal(format!("clock before epoch: {}", e)))?
            .as_secs();

        let path = self
            .root
            .join("runs")
            .join(format!("{}-{}.json", query_key(&record.query), timestamp));

        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(&path, json)?;
        tracing::info!(path = %path.display(), "research run stored");
        Ok(path)
    }

    /// List stored run files, newest last.
    pub fn list(&self) -> EngineResult<Vec<PathBuf>> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(self.root.join("runs"))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Load a run record from a vault file.
    pub fn load(&self, path: &Path) -> EngineResult<ResearchRecord> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Stable filename key for a query.
fn query_key(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..KEY_HASH_LEN].to_string()
}
