// attest-core/src/application/resolution.rs
//
// Identity resolution: for every validated row, walk the schema's lookup
// keys in priority order and bind the row to exactly one directory entity,
// or record an exception a human can settle.

use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use tracing::{debug, warn};

use crate::domain::lookup::{
    AttemptStatus, ExceptionKind, ExceptionStatus, LookupAttempt, LookupException,
    ScoredCandidate,
};
use crate::domain::schema::SchemaDefinition;
use crate::domain::snapshot::Dataset;
use crate::domain::validate::row::RowValidationResult;
use crate::domain::validate::similarity;
use crate::ports::directory::{Candidate, Directory};

#[derive(Debug, Clone)]
pub struct ResolutionOptions {
    /// Cap on simultaneous in-flight rows (the directory sits behind a
    /// connection pool; do not stampede it).
    pub max_in_flight: usize,
    pub query_timeout: Duration,
    /// Wait before the single retry of a failed or timed-out query.
    pub retry_backoff: Duration,
}

impl Default for ResolutionOptions {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            query_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolutionOutcome {
    pub attempts: Vec<LookupAttempt>,
    pub exceptions: Vec<LookupException>,
}

impl ResolutionOutcome {
    pub fn matched_rows(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.status == AttemptStatus::Matched)
            .count()
    }
}

/// Resolves every row of the run. Row-parallel with a bounded fan-out; each
/// row only reads immutable inputs and owns its own attempt/exception rows,
/// so the final sort by row index makes the whole outcome deterministic in
/// shape. Rows listed in `settled_rows` (manual resolutions from an earlier
/// pass over the same snapshot) are never re-triggered.
pub async fn resolve_lookups(
    schema: &SchemaDefinition,
    dataset: &Dataset,
    rows: &[RowValidationResult],
    directory: &dyn Directory,
    options: &ResolutionOptions,
    settled_rows: &HashSet<usize>,
) -> ResolutionOutcome {
    println!(
        "🔗 Resolving {} row(s) against the directory ({} in flight max)...",
        rows.len(),
        options.max_in_flight
    );

    let mut row_outcomes: Vec<RowResolution> = futures::stream::iter(
        rows.iter()
            .filter(|r| !settled_rows.contains(&r.row_index))
            .map(|row| resolve_row(schema, dataset, row, directory, options)),
    )
    .buffer_unordered(options.max_in_flight.max(1))
    .collect()
    .await;

    // Worker completion order is nondeterministic; the outcome is not.
    row_outcomes.sort_by_key(|r| r.row_index);

    let mut outcome = ResolutionOutcome::default();
    let mut next_exception_id = 1usize;
    for row in row_outcomes {
        outcome.attempts.extend(row.attempts);
        if let Some(mut exception) = row.exception {
            exception.id = next_exception_id;
            next_exception_id += 1;
            outcome.exceptions.push(exception);
        }
    }

    println!(
        "   ✅ {} matched, ⚠️ {} exception(s)",
        outcome.matched_rows(),
        outcome.exceptions.len()
    );
    outcome
}

struct RowResolution {
    row_index: usize,
    attempts: Vec<LookupAttempt>,
    exception: Option<LookupException>,
}

async fn resolve_row(
    schema: &SchemaDefinition,
    dataset: &Dataset,
    row: &RowValidationResult,
    directory: &dyn Directory,
    options: &ResolutionOptions,
) -> RowResolution {
    // Only validated, non-empty values may be used as lookup keys. An empty
    // value never issues a query and never consumes the priority slot.
    let keys: Vec<(String, String)> = schema
        .lookup_keys()
        .iter()
        .filter_map(|key| {
            let outcome = row.outcome(key)?;
            if !outcome.is_valid() {
                return None;
            }
            let value = outcome.value.as_deref()?.trim();
            if value.is_empty() {
                None
            } else {
                Some((key.clone(), value.to_string()))
            }
        })
        .collect();

    if keys.is_empty() {
        debug!(row = row.row_index, "No usable lookup key; exception without query");
        return RowResolution {
            row_index: row.row_index,
            attempts: vec![],
            exception: Some(exception_for(
                row.row_index,
                dataset,
                ExceptionKind::NoLookupKey,
                None,
                None,
                "No validated lookup key available",
                vec![],
            )),
        };
    }

    let mut attempts: Vec<LookupAttempt> = Vec::new();
    let last_index = keys.len() - 1;

    for (i, (field, value)) in keys.iter().enumerate() {
        let candidates = query_with_retry(directory, field, value, options).await;

        match candidates.len() {
            1 => {
                // Bound. Lower-priority keys are not consulted.
                attempts.push(LookupAttempt {
                    row_index: row.row_index,
                    field: field.clone(),
                    value: value.clone(),
                    candidate: candidates.into_iter().next(),
                    status: AttemptStatus::Matched,
                });
                return RowResolution {
                    row_index: row.row_index,
                    attempts,
                    exception: None,
                };
            }
            0 => {
                let is_last = i == last_index;
                attempts.push(LookupAttempt {
                    row_index: row.row_index,
                    field: field.clone(),
                    value: value.clone(),
                    candidate: None,
                    status: if is_last {
                        AttemptStatus::Exception
                    } else {
                        AttemptStatus::Pending
                    },
                });
                if is_last {
                    return RowResolution {
                        row_index: row.row_index,
                        attempts,
                        exception: Some(exception_for(
                            row.row_index,
                            dataset,
                            ExceptionKind::NoMatch,
                            Some(field.clone()),
                            Some(value.clone()),
                            "No match found in the directory",
                            vec![],
                        )),
                    };
                }
                // Fall through to the next lower-priority key.
            }
            _ => {
                // Ambiguous is terminal: a weaker key must not override it.
                let scored = score_candidates(value, &candidates);
                attempts.push(LookupAttempt {
                    row_index: row.row_index,
                    field: field.clone(),
                    value: value.clone(),
                    candidate: None,
                    status: AttemptStatus::Exception,
                });
                return RowResolution {
                    row_index: row.row_index,
                    attempts,
                    exception: Some(exception_for(
                        row.row_index,
                        dataset,
                        ExceptionKind::Ambiguous,
                        Some(field.clone()),
                        Some(value.clone()),
                        "Multiple directory candidates",
                        scored,
                    )),
                };
            }
        }
    }

    // Unreachable: the last zero-candidate key returns above.
    RowResolution {
        row_index: row.row_index,
        attempts,
        exception: None,
    }
}

/// One query plus at most one retry after backoff. Timeouts and directory
/// errors are downgraded to zero candidates — they block this row's
/// finalization, never the batch.
async fn query_with_retry(
    directory: &dyn Directory,
    field: &str,
    value: &str,
    options: &ResolutionOptions,
) -> Vec<Candidate> {
    for attempt in 0..2u8 {
        match tokio::time::timeout(options.query_timeout, directory.query(field, value)).await {
            Ok(Ok(candidates)) => return candidates,
            Ok(Err(e)) => {
                warn!(field, value, attempt, error = %e, "Directory query failed");
            }
            Err(_) => {
                warn!(field, value, attempt, "Directory query timed out");
            }
        }
        if attempt == 0 {
            tokio::time::sleep(options.retry_backoff).await;
        }
    }
    vec![]
}

fn score_candidates(value: &str, candidates: &[Candidate]) -> Vec<ScoredCandidate> {
    candidates
        .iter()
        .map(|c| ScoredCandidate {
            identifier: c.identifier.clone(),
            display: c.display.clone(),
            similarity: similarity(value, &c.display),
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn exception_for(
    row_index: usize,
    dataset: &Dataset,
    kind: ExceptionKind,
    field: Option<String>,
    value: Option<String>,
    reason: &str,
    candidates: Vec<ScoredCandidate>,
) -> LookupException {
    LookupException {
        id: 0, // renumbered after the deterministic sort
        row_index,
        kind,
        field,
        value,
        reason: reason.to_string(),
        row_data: dataset.row_cells(row_index),
        candidates,
        status: ExceptionStatus::Pending,
        resolution_value: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::mapping::ColumnMapping;
    use crate::domain::schema::{FieldKind, FieldRule, SchemaDefinition};
    use crate::domain::validate::row::validate_rows;
    use crate::error::AttestError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    // --- MOCK DIRECTORY ---
    #[derive(Clone, Default)]
    struct MockDirectory {
        pub results: HashMap<(String, String), Vec<Candidate>>,
        pub queries: Arc<Mutex<Vec<(String, String)>>>,
        pub fail: bool,
    }

    impl MockDirectory {
        fn with(results: Vec<((&str, &str), Vec<Candidate>)>) -> Self {
            Self {
                results: results
                    .into_iter()
                    .map(|((f, v), c)| ((f.to_string(), v.to_string()), c))
                    .collect(),
                queries: Arc::new(Mutex::new(Vec::new())),
                fail: false,
            }
        }

        fn queried(&self) -> Vec<(String, String)> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Directory for MockDirectory {
        async fn query(&self, field: &str, value: &str) -> Result<Vec<Candidate>, AttestError> {
            self.queries
                .lock()
                .unwrap()
                .push((field.to_string(), value.to_string()));
            if self.fail {
                return Err(AttestError::InternalError("directory down".into()));
            }
            Ok(self
                .results
                .get(&(field.to_string(), value.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn candidate(id: &str) -> Candidate {
        Candidate {
            identifier: id.to_string(),
            display: format!("Entity {}", id),
        }
    }

    fn schema() -> SchemaDefinition {
        SchemaDefinition::new(
            "registry".into(),
            "Shareholder Registry".into(),
            75.0,
            vec![
                FieldRule {
                    name: "SHAREHOLDER_ID_NUMBER".into(),
                    kind: FieldKind::NationalId,
                    required: true,
                    slugs: vec![],
                    max_matches: 1,
                    description: None,
                },
                FieldRule {
                    name: "EMAIL".into(),
                    kind: FieldKind::Pattern {
                        regex: regex::Regex::new("^(?:[^@\\s]+@[^@\\s]+)$").unwrap(),
                    },
                    required: false,
                    slugs: vec![],
                    max_matches: 1,
                    description: None,
                },
            ],
            vec!["SHAREHOLDER_ID_NUMBER".into(), "EMAIL".into()],
        )
        .unwrap()
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::manual(vec![
            ("ID".to_string(), "SHAREHOLDER_ID_NUMBER".to_string()),
            ("Email".to_string(), "EMAIL".to_string()),
        ])
    }

    fn dataset(rows: Vec<Vec<&str>>) -> Dataset {
        Dataset::new(
            "input.csv".into(),
            vec!["ID".into(), "Email".into()],
            rows.into_iter()
                .map(|r| r.into_iter().map(String::from).collect())
                .collect(),
        )
    }

    fn options() -> ResolutionOptions {
        ResolutionOptions {
            max_in_flight: 4,
            query_timeout: Duration::from_millis(500),
            retry_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_single_candidate_binds_and_stops() {
        let ds = dataset(vec![vec!["6110310044087", "alice@example.com"]]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::with(vec![(
            ("SHAREHOLDER_ID_NUMBER", "6110310044087"),
            vec![candidate("u-1")],
        )]);

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        assert_eq!(outcome.matched_rows(), 1);
        assert!(outcome.exceptions.is_empty());
        // EMAIL was never consulted.
        assert_eq!(directory.queried().len(), 1);
    }

    #[tokio::test]
    async fn test_ambiguous_never_falls_through() {
        let ds = dataset(vec![vec!["6110310044087", "alice@example.com"]]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::with(vec![(
            ("SHAREHOLDER_ID_NUMBER", "6110310044087"),
            vec![candidate("u-1"), candidate("u-2")],
        )]);

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        assert_eq!(outcome.exceptions.len(), 1);
        let exception = &outcome.exceptions[0];
        assert_eq!(exception.kind, ExceptionKind::Ambiguous);
        assert_eq!(exception.candidates.len(), 2);
        // The weaker EMAIL key must not be queried after an ambiguous result.
        let queried = directory.queried();
        assert_eq!(queried.len(), 1);
        assert_eq!(queried[0].0, "SHAREHOLDER_ID_NUMBER");
    }

    #[tokio::test]
    async fn test_zero_candidates_falls_back_to_next_key() {
        let ds = dataset(vec![vec!["6110310044087", "alice@example.com"]]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::with(vec![
            (("SHAREHOLDER_ID_NUMBER", "6110310044087"), vec![]),
            (("EMAIL", "alice@example.com"), vec![candidate("u-9")]),
        ]);

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        assert_eq!(outcome.matched_rows(), 1);
        // The missed high-priority attempt is kept in the trail as pending.
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].status, AttemptStatus::Pending);
        assert_eq!(outcome.attempts[1].status, AttemptStatus::Matched);
    }

    #[tokio::test]
    async fn test_all_keys_exhausted_is_no_match() {
        let ds = dataset(vec![vec!["6110310044087", "alice@example.com"]]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::default();

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        assert_eq!(outcome.exceptions.len(), 1);
        assert_eq!(outcome.exceptions[0].kind, ExceptionKind::NoMatch);
        assert_eq!(directory.queried().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_key_field_is_skipped() {
        // Bad checksum: the ID field fails validation, EMAIL drives lookup.
        let ds = dataset(vec![vec!["6110310044088", "alice@example.com"]]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::with(vec![(
            ("EMAIL", "alice@example.com"),
            vec![candidate("u-7")],
        )]);

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        assert_eq!(outcome.matched_rows(), 1);
        let queried = directory.queried();
        assert_eq!(queried.len(), 1);
        assert_eq!(queried[0].0, "EMAIL");
    }

    #[tokio::test]
    async fn test_no_usable_key_skips_querying_entirely() {
        let ds = dataset(vec![vec!["6110310044088", ""]]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::default();

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        assert_eq!(outcome.exceptions.len(), 1);
        assert_eq!(outcome.exceptions[0].kind, ExceptionKind::NoLookupKey);
        assert!(directory.queried().is_empty());
        assert!(outcome.attempts.is_empty());
    }

    #[tokio::test]
    async fn test_failed_query_retries_once_then_no_match() {
        let ds = dataset(vec![vec!["6110310044087", ""]]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory {
            fail: true,
            ..MockDirectory::default()
        };

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        assert_eq!(outcome.exceptions.len(), 1);
        assert_eq!(outcome.exceptions[0].kind, ExceptionKind::NoMatch);
        // One key, queried twice (original call + single retry).
        assert_eq!(directory.queried().len(), 2);
    }

    #[tokio::test]
    async fn test_settled_rows_are_not_retriggered() {
        let ds = dataset(vec![
            vec!["6110310044087", ""],
            vec!["6110310044087", ""],
        ]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::with(vec![(
            ("SHAREHOLDER_ID_NUMBER", "6110310044087"),
            vec![candidate("u-1")],
        )]);

        let settled: HashSet<usize> = [0usize].into_iter().collect();
        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &settled).await;

        // Only row 1 was processed.
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].row_index, 1);
    }

    #[tokio::test]
    async fn test_exception_ids_are_sequential_by_row() {
        let ds = dataset(vec![
            vec!["6110310044087", ""],
            vec!["6110310044087", ""],
            vec!["6110310044087", ""],
        ]);
        let schema = schema();
        let rows = validate_rows(&schema, &mapping(), &ds);
        let directory = MockDirectory::default(); // everything misses

        let outcome =
            resolve_lookups(&schema, &ds, &rows, &directory, &options(), &HashSet::new()).await;

        let ids: Vec<usize> = outcome.exceptions.iter().map(|e| e.id).collect();
        let rows_order: Vec<usize> = outcome.exceptions.iter().map(|e| e.row_index).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(rows_order, vec![0, 1, 2]);
    }
}
