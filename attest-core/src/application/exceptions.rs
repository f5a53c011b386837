// attest-core/src/application/exceptions.rs
//
// Exception bookkeeping for one snapshot: counts, manual resolution, and the
// bulk "apply to similar" operation the review tooling exposes.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::domain::error::DomainError;
use crate::domain::lookup::{ExceptionKind, ExceptionStatus, LookupException};
use crate::domain::validate::row::RowValidationResult;

/// Manual resolution verb. Accepting carries the entity identifier to bind,
/// so an accept without a value cannot be expressed at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Accept { value: String },
    Reject,
    ForCreation,
}

impl Resolution {
    fn status(&self) -> ExceptionStatus {
        match self {
            Self::Accept { .. } => ExceptionStatus::Accepted,
            Self::Reject => ExceptionStatus::Rejected,
            Self::ForCreation => ExceptionStatus::ForCreation,
        }
    }
}

/// Caller-specified notion of "similar" for bulk resolution. Every populated
/// criterion must match; an empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct SimilarityFilter {
    pub kind: Option<ExceptionKind>,
    pub field: Option<String>,
    pub reason: Option<String>,
}

impl SimilarityFilter {
    fn matches(&self, exception: &LookupException) -> bool {
        if let Some(kind) = self.kind
            && exception.kind != kind
        {
            return false;
        }
        if let Some(field) = &self.field
            && exception.field.as_deref() != Some(field.as_str())
        {
            return false;
        }
        if let Some(reason) = &self.reason
            && &exception.reason != reason
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub for_creation: usize,
}

/// Result of one bulk invocation. Records already terminal are skipped — not
/// an error — and reported here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    pub matched: usize,
    pub applied: usize,
    pub skipped_terminal: usize,
}

/// One row-level validation failure, carried alongside lookup exceptions so
/// the exceptions report renders without re-deriving state.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationFailure {
    pub row_index: usize,
    pub field: String,
    pub errors: Vec<String>,
}

pub fn validation_failures(rows: &[RowValidationResult]) -> Vec<ValidationFailure> {
    rows.iter()
        .flat_map(|row| {
            row.outcomes
                .iter()
                .filter(|o| !o.errors.is_empty())
                .map(|o| ValidationFailure {
                    row_index: row.row_index,
                    field: o.field.clone(),
                    errors: o.errors.clone(),
                })
        })
        .collect()
}

/// Aggregates a snapshot's lookup exceptions and drives their lifecycle.
#[derive(Debug, Clone, Default)]
pub struct ExceptionTracker {
    exceptions: Vec<LookupException>,
}

impl ExceptionTracker {
    pub fn new(exceptions: Vec<LookupException>) -> Self {
        Self { exceptions }
    }

    pub fn exceptions(&self) -> &[LookupException] {
        &self.exceptions
    }

    pub fn into_exceptions(self) -> Vec<LookupException> {
        self.exceptions
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for exception in &self.exceptions {
            match exception.status {
                ExceptionStatus::Pending => counts.pending += 1,
                ExceptionStatus::Accepted => counts.accepted += 1,
                ExceptionStatus::Rejected => counts.rejected += 1,
                ExceptionStatus::ForCreation => counts.for_creation += 1,
            }
        }
        counts
    }

    /// Rows whose exception has been manually handled in any way; a later
    /// automatic pass over the same snapshot must not re-trigger them.
    pub fn settled_rows(&self) -> HashSet<usize> {
        self.exceptions
            .iter()
            .filter(|e| e.status != ExceptionStatus::Pending)
            .map(|e| e.row_index)
            .collect()
    }

    /// Resolves one exception. Terminal records cannot be resolved twice.
    pub fn resolve(
        &mut self,
        id: usize,
        resolution: Resolution,
    ) -> Result<&LookupException, DomainError> {
        let Some(exception) = self.exceptions.iter_mut().find(|e| e.id == id) else {
            return Err(DomainError::ExceptionError(format!(
                "Exception {} not found",
                id
            )));
        };

        if exception.is_terminal() {
            return Err(DomainError::ExceptionError(format!(
                "Exception {} is already resolved",
                id
            )));
        }

        apply(exception, &resolution);
        info!(id, status = ?exception.status, "Exception resolved");
        Ok(exception)
    }

    /// Applies one resolution to every similar exception. All-or-nothing per
    /// invocation: terminal records are skipped (not an error) and counted.
    pub fn resolve_similar(
        &mut self,
        filter: &SimilarityFilter,
        resolution: Resolution,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome {
            matched: 0,
            applied: 0,
            skipped_terminal: 0,
        };

        for exception in self.exceptions.iter_mut().filter(|e| filter.matches(e)) {
            outcome.matched += 1;
            if exception.is_terminal() {
                outcome.skipped_terminal += 1;
                continue;
            }
            apply(exception, &resolution);
            outcome.applied += 1;
        }

        info!(
            matched = outcome.matched,
            applied = outcome.applied,
            skipped = outcome.skipped_terminal,
            "Bulk resolution applied"
        );
        outcome
    }
}

fn apply(exception: &mut LookupException, resolution: &Resolution) {
    exception.status = resolution.status();
    exception.resolution_value = match resolution {
        Resolution::Accept { value } => Some(value.clone()),
        _ => None,
    };
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::lookup::ExceptionKind;

    fn exception(id: usize, row: usize, kind: ExceptionKind, field: &str) -> LookupException {
        LookupException {
            id,
            row_index: row,
            kind,
            field: Some(field.to_string()),
            value: Some("value".into()),
            reason: match kind {
                ExceptionKind::NoMatch => "No match found in the directory".into(),
                ExceptionKind::Ambiguous => "Multiple directory candidates".into(),
                ExceptionKind::NoLookupKey => "No validated lookup key available".into(),
            },
            row_data: vec![],
            candidates: vec![],
            status: ExceptionStatus::Pending,
            resolution_value: None,
        }
    }

    fn tracker() -> ExceptionTracker {
        ExceptionTracker::new(vec![
            exception(1, 0, ExceptionKind::NoMatch, "SHAREHOLDER_ID_NUMBER"),
            exception(2, 1, ExceptionKind::NoMatch, "SHAREHOLDER_ID_NUMBER"),
            exception(3, 2, ExceptionKind::Ambiguous, "EMAIL"),
        ])
    }

    #[test]
    fn test_counts_by_status() {
        let mut tracker = tracker();
        tracker
            .resolve(1, Resolution::Accept { value: "u-1".into() })
            .unwrap();

        let counts = tracker.counts();
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.accepted, 1);
    }

    #[test]
    fn test_accept_binds_value_and_is_terminal() {
        let mut tracker = tracker();
        let resolved = tracker
            .resolve(1, Resolution::Accept { value: "u-1".into() })
            .unwrap();
        assert_eq!(resolved.resolution_value.as_deref(), Some("u-1"));

        let err = tracker.resolve(1, Resolution::Reject).unwrap_err();
        assert!(matches!(err, DomainError::ExceptionError(_)));
    }

    #[test]
    fn test_for_creation_can_still_be_settled_later() {
        let mut tracker = tracker();
        tracker.resolve(2, Resolution::ForCreation).unwrap();
        // Not terminal: a follow-up accept is legitimate once the entity exists.
        tracker
            .resolve(2, Resolution::Accept { value: "u-2".into() })
            .unwrap();
        assert_eq!(tracker.counts().accepted, 1);
    }

    #[test]
    fn test_bulk_resolution_skips_terminal_and_reports() {
        let mut tracker = tracker();
        tracker.resolve(1, Resolution::Reject).unwrap();

        let filter = SimilarityFilter {
            kind: Some(ExceptionKind::NoMatch),
            field: Some("SHAREHOLDER_ID_NUMBER".into()),
            reason: None,
        };
        let outcome = tracker.resolve_similar(&filter, Resolution::Reject);

        assert_eq!(outcome.matched, 2);
        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.skipped_terminal, 1);
        // The ambiguous EMAIL exception was untouched.
        assert_eq!(tracker.counts().pending, 1);
    }

    #[test]
    fn test_settled_rows_excludes_pending_only() {
        let mut tracker = tracker();
        tracker.resolve(3, Resolution::ForCreation).unwrap();

        let settled = tracker.settled_rows();
        assert_eq!(settled.len(), 1);
        assert!(settled.contains(&2));
    }

    #[test]
    fn test_validation_failures_flatten_row_outcomes() {
        use crate::domain::validate::row::{FieldOutcome, FieldStatus};

        let rows = vec![RowValidationResult {
            row_index: 0,
            valid: false,
            outcomes: vec![FieldOutcome {
                field: "BANK_NAME".into(),
                column: None,
                value: None,
                status: FieldStatus::MissingColumn,
                errors: vec!["Required field has no matching column".into()],
                canonical: None,
            }],
        }];

        let failures = validation_failures(&rows);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "BANK_NAME");
    }
}
