// attest-core/src/domain/ports/mod.rs
//
// Sync ports implemented by the infrastructure layer. The domain only ever
// sees these contracts.

use std::path::Path;

use crate::domain::error::DomainError;
use crate::domain::report::{ReportArtifact, ReportRecord};
use crate::domain::schema::SchemaSet;
use crate::domain::snapshot::Snapshot;

/// Where schema definitions come from (YAML directory, database, ...).
pub trait SchemaSource: Send + Sync {
    fn load(&self, schemas_dir: &Path) -> Result<SchemaSet, DomainError>;
}

/// Persistence of frozen snapshots and the reports generated against them.
pub trait SnapshotStore: Send + Sync {
    fn persist_snapshot(&self, snapshot: &Snapshot) -> Result<(), DomainError>;

    /// Loads the frozen copy for `hash`, or `SnapshotNotFound`.
    fn load_snapshot(&self, hash: &str) -> Result<Snapshot, DomainError>;

    /// Last-writer-wins per `(snapshot_hash, kind)`.
    fn persist_report(&self, artifact: &ReportArtifact) -> Result<(), DomainError>;

    /// Lookup by snapshot hash, for staleness detection and listings.
    fn reports_for_snapshot(&self, hash: &str) -> Result<Vec<ReportRecord>, DomainError>;
}
