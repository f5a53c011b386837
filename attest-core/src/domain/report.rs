// attest-core/src/domain/report.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four report kinds. Each is independently regenerable from the same
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Summary,
    Mapping,
    Verify,
    Exceptions,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Summary,
        ReportKind::Mapping,
        ReportKind::Verify,
        ReportKind::Exceptions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Mapping => "mapping",
            Self::Verify => "verify",
            Self::Exceptions => "exceptions",
        }
    }
}

impl std::fmt::Display for ReportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rendered report: typed body serialized to JSON, plus the provenance the
/// staleness check needs. `snapshot_hash` always names the snapshot the body
/// was read from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub report_id: String,
    pub snapshot_hash: String,
    pub kind: ReportKind,
    pub generated_at: DateTime<Utc>,
    pub body: serde_json::Value,
}

/// Index row persisted by the store, keyed `(report_id, snapshot_hash, kind)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    pub report_id: String,
    pub snapshot_hash: String,
    pub kind: ReportKind,
    pub generated_at: DateTime<Utc>,
}
