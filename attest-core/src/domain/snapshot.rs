// attest-core/src/domain/snapshot.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::DomainError;
use crate::domain::lookup::{LookupAttempt, LookupException};
use crate::domain::mapping::ColumnMapping;
use crate::domain::validate::row::RowValidationResult;

/// Truncation applied to hex digests (12 chars is plenty to spot drift and
/// keeps table/file names readable).
const HASH_LEN: usize = 12;

// =============================================================================
//  1. DATASET
// =============================================================================

/// The working tabular dataset: ordered headers plus string cells, exactly as
/// imported. Rows are addressed by index; cells by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Origin label (usually the imported file name), for reports.
    pub source: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(source: String, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            source,
            columns,
            rows,
        }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row_index: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row_index)?.get(col).map(String::as_str)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// The full row as `(column, value)` pairs, for exception context.
    pub fn row_cells(&self, row_index: usize) -> Vec<(String, String)> {
        match self.rows.get(row_index) {
            Some(row) => self
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect(),
            None => vec![],
        }
    }
}

// =============================================================================
//  2. SNAPSHOT
// =============================================================================

/// Everything a report is allowed to read: the dataset plus the validation
/// and lookup state computed against it. Serialization order is struct
/// declaration order, which makes the content hash deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotContent {
    pub schema_id: String,
    pub document_type: String,
    pub match_score: f64,
    pub mapping: ColumnMapping,
    pub dataset: Dataset,
    pub rows: Vec<RowValidationResult>,
    pub attempts: Vec<LookupAttempt>,
    pub exceptions: Vec<LookupException>,
}

impl SnapshotContent {
    /// Canonical content hash: SHA-256 over the JSON serialization,
    /// truncated. Identical state always hashes identically; any mutation of
    /// dataset, verdicts or lookup records produces a different hash.
    pub fn content_hash(&self) -> Result<String, DomainError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| DomainError::StoreError(format!("serialize snapshot content: {}", e)))?;

        let digest = Sha256::digest(&bytes);
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Ok(hex[..HASH_LEN].to_string())
    }
}

/// An immutable, content-addressed freeze of the working state. Reports are
/// generated from this copy only, never from the live working set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub hash: String,
    pub frozen_at: DateTime<Utc>,
    pub content: SnapshotContent,
}

impl Snapshot {
    pub fn freeze(content: SnapshotContent) -> Result<Self, DomainError> {
        Ok(Self {
            hash: content.content_hash()?,
            frozen_at: Utc::now(),
            content,
        })
    }

    /// Tamper check: the stored content must still hash to the declared
    /// identifier. Anything else means the frozen copy was modified.
    pub fn verify(&self) -> Result<(), DomainError> {
        let actual = self.content.content_hash()?;
        if actual != self.hash {
            return Err(DomainError::StaleSnapshot {
                declared: self.hash.clone(),
                actual,
            });
        }
        Ok(())
    }
}
