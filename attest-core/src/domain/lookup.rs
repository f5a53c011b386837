// attest-core/src/domain/lookup.rs
//
// Data model of the identity resolution trail: one attempt row per issued
// directory query, one exception per row that could not be bound to exactly
// one entity.

use serde::{Deserialize, Serialize};

/// One entity returned by the tenant directory for a lookup value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub identifier: String,
    pub display: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// Query issued, resolution moved on to a lower-priority key.
    Pending,
    /// Exactly one candidate; the row is bound.
    Matched,
    /// This query ended the row in an exception (none or ambiguous).
    Exception,
}

/// Audit record for one directory query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupAttempt {
    pub row_index: usize,
    pub field: String,
    pub value: String,
    pub candidate: Option<Candidate>,
    pub status: AttemptStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    /// Every lookup key was queried and none returned a candidate.
    NoMatch,
    /// A key returned several candidates; weaker keys are never consulted.
    Ambiguous,
    /// The row had no validated, non-empty lookup key; no query was issued.
    NoLookupKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Pending,
    Accepted,
    Rejected,
    ForCreation,
}

impl ExceptionStatus {
    /// Accepted / rejected are final; `for_creation` still awaits the entity
    /// to exist and may be revisited.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

/// A directory candidate annotated with how close it was to the lookup value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub identifier: String,
    pub display: String,
    pub similarity: f64,
}

/// A row that failed to resolve, with everything a reviewer needs to settle
/// it by hand: the full row data, the offending field/value, the reason, and
/// any candidates that were in play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupException {
    pub id: usize,
    pub row_index: usize,
    pub kind: ExceptionKind,
    pub field: Option<String>,
    pub value: Option<String>,
    pub reason: String,
    /// `(column, value)` copy of the row at resolution time.
    pub row_data: Vec<(String, String)>,
    pub candidates: Vec<ScoredCandidate>,
    pub status: ExceptionStatus,
    /// Identifier bound by a manual accept.
    pub resolution_value: Option<String>,
}

impl LookupException {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ExceptionStatus::Accepted.is_terminal());
        assert!(ExceptionStatus::Rejected.is_terminal());
        assert!(!ExceptionStatus::Pending.is_terminal());
        assert!(!ExceptionStatus::ForCreation.is_terminal());
    }
}
