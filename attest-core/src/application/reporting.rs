// attest-core/src/application/reporting.rs
//
// Snapshot & Report Engine. Reports read the frozen copy only: generation
// loads the snapshot back from the store, re-verifies its hash, renders, and
// persists the artifact keyed (report_id, snapshot_hash, kind).

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::application::exceptions::{
    ExceptionTracker, StatusCounts, ValidationFailure, validation_failures,
};
use crate::domain::error::DomainError;
use crate::domain::lookup::{AttemptStatus, ExceptionStatus, LookupException, ScoredCandidate};
use crate::domain::ports::SnapshotStore;
use crate::domain::report::{ReportArtifact, ReportKind};
use crate::domain::snapshot::{Snapshot, SnapshotContent};
use crate::domain::validate::row::{field_success_rate, stats};
use crate::error::AttestError;

// =============================================================================
//  1. FREEZING & FRESHNESS
// =============================================================================

/// Freezes the working state into a content-addressed snapshot and persists
/// it. Freezing is a single step over fully computed inputs: every row result
/// handed in here already exists, so no result can postdate the hash.
pub fn freeze_snapshot(
    content: SnapshotContent,
    store: &dyn SnapshotStore,
) -> Result<Snapshot, AttestError> {
    let snapshot = Snapshot::freeze(content)?;
    store.persist_snapshot(&snapshot)?;
    info!(hash = %snapshot.hash, "Snapshot frozen");
    println!("🧊 Snapshot frozen: {}", snapshot.hash);
    Ok(snapshot)
}

/// Fails fast when the live working state no longer matches the snapshot a
/// report would be (re)generated against.
pub fn ensure_fresh(declared_hash: &str, live: &SnapshotContent) -> Result<(), DomainError> {
    let actual = live.content_hash()?;
    if actual != declared_hash {
        return Err(DomainError::StaleSnapshot {
            declared: declared_hash.to_string(),
            actual,
        });
    }
    Ok(())
}

// =============================================================================
//  2. REPORT BODIES (DTOs)
// =============================================================================

#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub document_type: String,
    pub schema_id: String,
    pub match_score: f64,
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub success_rate: f64,
    pub rows_matched: usize,
    pub exception_counts: StatusCounts,
    pub overall_status: String,
}

#[derive(Debug, Serialize)]
pub struct MappingReport {
    pub document_type: String,
    pub coverage: f64,
    pub entries: Vec<MappingReportEntry>,
    pub unmapped_fields: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MappingReportEntry {
    pub field: String,
    pub column: String,
    pub origin: String,
    pub match_score: f64,
    pub field_success_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub rows: Vec<VerifyRow>,
}

#[derive(Debug, Serialize)]
pub struct VerifyRow {
    pub row_index: usize,
    pub valid: bool,
    /// matched | accepted | rejected | for_creation | exception | pending
    pub lookup_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExceptionsReport {
    pub counts: StatusCounts,
    pub validation_failures: Vec<ValidationFailure>,
    pub exceptions: Vec<ExceptionReportEntry>,
}

#[derive(Debug, Serialize)]
pub struct ExceptionReportEntry {
    pub id: usize,
    pub row_index: usize,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub reason: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_value: Option<String>,
    pub candidates: Vec<ScoredCandidate>,
    pub row_data: Vec<(String, String)>,
}

// =============================================================================
//  3. GENERATION
// =============================================================================

/// Renders one report kind from the frozen copy identified by `hash`.
/// The stored snapshot is re-verified before anything is read from it.
pub fn generate_report(
    kind: ReportKind,
    hash: &str,
    store: &dyn SnapshotStore,
) -> Result<ReportArtifact, AttestError> {
    let snapshot = store.load_snapshot(hash)?;
    snapshot.verify()?;

    let body = build_body(kind, &snapshot.content)
        .map_err(|e| AttestError::InternalError(format!("serialize {} report: {}", kind, e)))?;

    let artifact = ReportArtifact {
        report_id: new_report_id(hash, kind),
        snapshot_hash: snapshot.hash.clone(),
        kind,
        generated_at: Utc::now(),
        body,
    };

    store.persist_report(&artifact)?;
    info!(report = %artifact.report_id, kind = %kind, snapshot = %hash, "Report generated");
    Ok(artifact)
}

/// All four kinds against the same snapshot, in a fixed order.
pub fn generate_all_reports(
    hash: &str,
    store: &dyn SnapshotStore,
) -> Result<Vec<ReportArtifact>, AttestError> {
    ReportKind::ALL
        .iter()
        .map(|kind| generate_report(*kind, hash, store))
        .collect()
}

fn build_body(kind: ReportKind, content: &SnapshotContent) -> Result<serde_json::Value, serde_json::Error> {
    match kind {
        ReportKind::Summary => serde_json::to_value(summary_body(content)),
        ReportKind::Mapping => serde_json::to_value(mapping_body(content)),
        ReportKind::Verify => serde_json::to_value(verify_body(content)),
        ReportKind::Exceptions => serde_json::to_value(exceptions_body(content)),
    }
}

fn summary_body(content: &SnapshotContent) -> SummaryReport {
    let row_stats = stats(&content.rows);
    let tracker = ExceptionTracker::new(content.exceptions.clone());
    let counts = tracker.counts();
    let rows_matched = content
        .attempts
        .iter()
        .filter(|a| a.status == AttemptStatus::Matched)
        .count();

    let overall_status = if row_stats.invalid_rows > 0 {
        "validation_failures"
    } else if counts.pending > 0 || counts.for_creation > 0 {
        "exceptions_pending"
    } else {
        "clean"
    };

    SummaryReport {
        document_type: content.document_type.clone(),
        schema_id: content.schema_id.clone(),
        match_score: content.match_score,
        total_rows: row_stats.total_rows,
        valid_rows: row_stats.valid_rows,
        invalid_rows: row_stats.invalid_rows,
        success_rate: row_stats.success_rate,
        rows_matched,
        exception_counts: counts,
        overall_status: overall_status.to_string(),
    }
}

fn mapping_body(content: &SnapshotContent) -> MappingReport {
    let entries = content
        .mapping
        .bindings()
        .iter()
        .map(|binding| MappingReportEntry {
            field: binding.field.clone(),
            column: binding.column.clone(),
            origin: format!("{:?}", binding.origin).to_lowercase(),
            match_score: binding.score,
            field_success_rate: field_success_rate(&content.rows, &binding.field),
        })
        .collect();

    // Coverage over the mapping itself: fields that never got a column.
    let bound_fields: std::collections::HashSet<&str> = content
        .mapping
        .bindings()
        .iter()
        .map(|b| b.field.as_str())
        .collect();
    let all_fields: Vec<String> = content
        .rows
        .first()
        .map(|r| r.outcomes.iter().map(|o| o.field.clone()).collect())
        .unwrap_or_default();
    let unmapped_fields: Vec<String> = all_fields
        .iter()
        .filter(|f| !bound_fields.contains(f.as_str()))
        .cloned()
        .collect();

    let coverage = if all_fields.is_empty() {
        0.0
    } else {
        (all_fields.len() - unmapped_fields.len()) as f64 / all_fields.len() as f64 * 100.0
    };

    MappingReport {
        document_type: content.document_type.clone(),
        coverage,
        entries,
        unmapped_fields,
    }
}

fn verify_body(content: &SnapshotContent) -> VerifyReport {
    let rows = content
        .rows
        .iter()
        .map(|row| {
            let matched = content
                .attempts
                .iter()
                .find(|a| a.row_index == row.row_index && a.status == AttemptStatus::Matched);
            let exception = content
                .exceptions
                .iter()
                .find(|e| e.row_index == row.row_index);

            match (matched, exception) {
                (Some(attempt), _) => VerifyRow {
                    row_index: row.row_index,
                    valid: row.valid,
                    lookup_status: "matched".into(),
                    field: Some(attempt.field.clone()),
                    value: Some(attempt.value.clone()),
                    identifier: attempt.candidate.as_ref().map(|c| c.identifier.clone()),
                    display: attempt.candidate.as_ref().map(|c| c.display.clone()),
                },
                (None, Some(exception)) => VerifyRow {
                    row_index: row.row_index,
                    valid: row.valid,
                    lookup_status: exception_status_label(exception).into(),
                    field: exception.field.clone(),
                    value: exception.value.clone(),
                    identifier: exception.resolution_value.clone(),
                    display: None,
                },
                (None, None) => VerifyRow {
                    row_index: row.row_index,
                    valid: row.valid,
                    lookup_status: "pending".into(),
                    field: None,
                    value: None,
                    identifier: None,
                    display: None,
                },
            }
        })
        .collect();

    VerifyReport { rows }
}

fn exception_status_label(exception: &LookupException) -> &'static str {
    match exception.status {
        ExceptionStatus::Pending => "exception",
        ExceptionStatus::Accepted => "accepted",
        ExceptionStatus::Rejected => "rejected",
        ExceptionStatus::ForCreation => "for_creation",
    }
}

fn exception_kind_label(kind: crate::domain::lookup::ExceptionKind) -> &'static str {
    match kind {
        crate::domain::lookup::ExceptionKind::NoMatch => "no_match",
        crate::domain::lookup::ExceptionKind::Ambiguous => "ambiguous",
        crate::domain::lookup::ExceptionKind::NoLookupKey => "no_lookup_key",
    }
}

fn exceptions_body(content: &SnapshotContent) -> ExceptionsReport {
    let tracker = ExceptionTracker::new(content.exceptions.clone());
    let exceptions = content
        .exceptions
        .iter()
        .map(|e| ExceptionReportEntry {
            id: e.id,
            row_index: e.row_index,
            kind: exception_kind_label(e.kind).to_string(),
            field: e.field.clone(),
            value: e.value.clone(),
            reason: e.reason.clone(),
            status: exception_status_label(e).to_string(),
            resolution_value: e.resolution_value.clone(),
            candidates: e.candidates.clone(),
            row_data: e.row_data.clone(),
        })
        .collect();

    ExceptionsReport {
        counts: tracker.counts(),
        validation_failures: validation_failures(&content.rows),
        exceptions,
    }
}

/// Report ids are short and unique enough to key artifacts: `r-` plus eight
/// hex chars of a digest over snapshot, kind, wall clock and pid.
fn new_report_id(snapshot_hash: &str, kind: ReportKind) -> String {
    let seed = format!(
        "{}:{}:{}:{}",
        snapshot_hash,
        kind,
        Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true),
        std::process::id()
    );
    let digest = Sha256::digest(seed.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{:02x}", b)).collect();
    format!("r-{}", hex)
}
