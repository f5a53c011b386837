// attest-core/src/infrastructure/store.rs
//
// Filesystem-backed snapshot/report persistence under the project target
// directory:
//   target/snapshots/<hash>.json
//   target/reports/<snapshot_hash>/<kind>.json   (last writer wins)
//   target/reports/index.json

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::domain::error::DomainError;
use crate::domain::ports::SnapshotStore;
use crate::domain::report::{ReportArtifact, ReportRecord};
use crate::domain::snapshot::Snapshot;
use crate::infrastructure::error::InfrastructureError;

pub struct FsSnapshotStore {
    target_dir: PathBuf,
}

impl FsSnapshotStore {
    pub fn new(target_dir: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
        }
    }

    fn snapshot_path(&self, hash: &str) -> PathBuf {
        self.target_dir.join("snapshots").join(format!("{}.json", hash))
    }

    fn report_path(&self, hash: &str, kind: &str) -> PathBuf {
        self.target_dir
            .join("reports")
            .join(hash)
            .join(format!("{}.json", kind))
    }

    fn index_path(&self) -> PathBuf {
        self.target_dir.join("reports").join("index.json")
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), InfrastructureError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(InfrastructureError::Io)?;
        }
        let json = serde_json::to_string_pretty(value).map_err(InfrastructureError::JsonError)?;
        fs::write(path, json).map_err(InfrastructureError::Io)
    }

    fn read_index(&self) -> Result<Vec<ReportRecord>, InfrastructureError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(vec![]);
        }
        let content = fs::read_to_string(&path).map_err(InfrastructureError::Io)?;
        serde_json::from_str(&content).map_err(InfrastructureError::JsonError)
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn persist_snapshot(&self, snapshot: &Snapshot) -> Result<(), DomainError> {
        let path = self.snapshot_path(&snapshot.hash);
        Self::write_json(&path, snapshot).map_err(|e| DomainError::StoreError(e.to_string()))?;
        info!(path = ?path, "Snapshot persisted");
        Ok(())
    }

    fn load_snapshot(&self, hash: &str) -> Result<Snapshot, DomainError> {
        let path = self.snapshot_path(hash);
        if !path.exists() {
            return Err(DomainError::SnapshotNotFound(hash.to_string()));
        }
        let content =
            fs::read_to_string(&path).map_err(|e| DomainError::StoreError(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| DomainError::StoreError(e.to_string()))
    }

    fn persist_report(&self, artifact: &ReportArtifact) -> Result<(), DomainError> {
        let path = self.report_path(&artifact.snapshot_hash, artifact.kind.as_str());
        Self::write_json(&path, artifact).map_err(|e| DomainError::StoreError(e.to_string()))?;

        // Index upkeep: one row per (snapshot, kind), last writer wins.
        let mut index = self
            .read_index()
            .map_err(|e| DomainError::StoreError(e.to_string()))?;
        index.retain(|r| !(r.snapshot_hash == artifact.snapshot_hash && r.kind == artifact.kind));
        index.push(ReportRecord {
            report_id: artifact.report_id.clone(),
            snapshot_hash: artifact.snapshot_hash.clone(),
            kind: artifact.kind,
            generated_at: artifact.generated_at,
        });
        Self::write_json(&self.index_path(), &index)
            .map_err(|e| DomainError::StoreError(e.to_string()))?;

        info!(report = %artifact.report_id, path = ?path, "Report persisted");
        Ok(())
    }

    fn reports_for_snapshot(&self, hash: &str) -> Result<Vec<ReportRecord>, DomainError> {
        let index = self
            .read_index()
            .map_err(|e| DomainError::StoreError(e.to_string()))?;
        Ok(index
            .into_iter()
            .filter(|r| r.snapshot_hash == hash)
            .collect())
    }
}
