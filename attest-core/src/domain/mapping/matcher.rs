// attest-core/src/domain/mapping/matcher.rs
//
// Column-to-field inference in two explicit passes so each stays testable on
// its own:
//   1. Alias pass   — header names against field names and slugs.
//   2. Content pass — every field validator against every unclaimed column's
//                     sampled values, best pass rate wins.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::domain::error::DomainError;
use crate::domain::mapping::{BindingOrigin, ColumnBinding, ColumnMapping};
use crate::domain::schema::{FieldRule, SchemaDefinition, SchemaSet};
use crate::domain::snapshot::Dataset;
use crate::domain::validate::validate_value;

/// A column must validate on more than half of the sampled values before the
/// content pass may claim it for a field.
const MIN_CONTENT_PASS_RATE: f64 = 50.0;

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub schema_id: String,
    pub score: f64,
    pub mapping: ColumnMapping,
}

pub struct SchemaMatcher;

impl SchemaMatcher {
    /// Scores every known schema against the dataset and returns the winner,
    /// or `SchemaNotMatched` when nothing reaches its own pass threshold.
    /// Fatal for the run; the caller decides what to tell the operator.
    pub fn select(
        set: &SchemaSet,
        dataset: &Dataset,
        sample_rows: usize,
    ) -> Result<MatchOutcome, DomainError> {
        if set.is_empty() {
            return Err(DomainError::SchemaError(
                "No schema definitions loaded".into(),
            ));
        }

        let mut best: Option<MatchOutcome> = None;
        for schema in set.iter() {
            let (score, mapping) = Self::match_one(schema, dataset, sample_rows);
            info!(schema = %schema.id, score = %format!("{:.2}%", score), "Schema match score");

            let is_better = best.as_ref().is_none_or(|b| score > b.score);
            if is_better {
                best = Some(MatchOutcome {
                    schema_id: schema.id.clone(),
                    score,
                    mapping,
                });
            }
        }

        // set is non-empty, so best is always populated here.
        let Some(outcome) = best else {
            return Err(DomainError::SchemaError(
                "No schema definitions loaded".into(),
            ));
        };

        let threshold = set
            .get(&outcome.schema_id)
            .map(|s| s.pass_threshold)
            .unwrap_or(100.0);

        if outcome.score < threshold {
            return Err(DomainError::SchemaNotMatched {
                best_schema: outcome.schema_id,
                best_score: outcome.score,
                threshold,
            });
        }

        Ok(outcome)
    }

    /// Maps one schema against the dataset and scores the result.
    pub fn match_one(
        schema: &SchemaDefinition,
        dataset: &Dataset,
        sample_rows: usize,
    ) -> (f64, ColumnMapping) {
        let mut bindings: Vec<ColumnBinding> = Vec::new();
        let mut claimed: HashSet<usize> = HashSet::new();

        Self::alias_pass(schema, dataset, &mut bindings, &mut claimed);
        Self::content_pass(schema, dataset, sample_rows, &mut bindings, &mut claimed);

        let mapping = ColumnMapping::from_bindings(bindings);
        let score = Self::score(schema, &mapping);
        (score, mapping)
    }

    /// Pass 1: bind columns whose normalized header equals the field name or
    /// one of its slugs. Fields are visited in declaration order, so earlier
    /// fields claim contested headers.
    fn alias_pass(
        schema: &SchemaDefinition,
        dataset: &Dataset,
        bindings: &mut Vec<ColumnBinding>,
        claimed: &mut HashSet<usize>,
    ) {
        for rule in schema.fields() {
            let mut wanted: Vec<String> = vec![normalize_header(&rule.name)];
            wanted.extend(rule.slugs.iter().map(|s| normalize_header(s)));

            let mut bound = 0usize;
            for (idx, column) in dataset.columns.iter().enumerate() {
                if bound >= rule.max_matches {
                    break;
                }
                if claimed.contains(&idx) {
                    continue;
                }
                if wanted.contains(&normalize_header(column)) {
                    debug!(field = %rule.name, column = %column, "Alias match");
                    bindings.push(ColumnBinding {
                        column: column.clone(),
                        field: rule.name.clone(),
                        origin: BindingOrigin::Alias,
                        score: 100.0,
                    });
                    claimed.insert(idx);
                    bound += 1;
                }
            }
        }
    }

    /// Pass 2: for fields still short of bindings, run the field's validator
    /// over every unclaimed column's sample and take the best pass rate above
    /// the floor. Strictly-greater comparison in column order: a tie keeps
    /// the earliest column.
    fn content_pass(
        schema: &SchemaDefinition,
        dataset: &Dataset,
        sample_rows: usize,
        bindings: &mut Vec<ColumnBinding>,
        claimed: &mut HashSet<usize>,
    ) {
        for rule in schema.fields() {
            let mut bound = bindings.iter().filter(|b| b.field == rule.name).count();

            while bound < rule.max_matches {
                let mut best: Option<(usize, f64)> = None;
                for (idx, _) in dataset.columns.iter().enumerate() {
                    if claimed.contains(&idx) {
                        continue;
                    }
                    let rate = column_pass_rate(rule, dataset, idx, sample_rows);
                    if rate > MIN_CONTENT_PASS_RATE && best.is_none_or(|(_, b)| rate > b) {
                        best = Some((idx, rate));
                    }
                }

                match best {
                    Some((idx, rate)) => {
                        debug!(field = %rule.name, column = %dataset.columns[idx],
                               rate = %format!("{:.1}%", rate), "Content match");
                        bindings.push(ColumnBinding {
                            column: dataset.columns[idx].clone(),
                            field: rule.name.clone(),
                            origin: BindingOrigin::Content,
                            score: rate,
                        });
                        claimed.insert(idx);
                        bound += 1;
                    }
                    None => break,
                }
            }
        }
    }

    /// Required-field coverage when the schema declares required fields,
    /// all-field coverage otherwise.
    fn score(schema: &SchemaDefinition, mapping: &ColumnMapping) -> f64 {
        let required: Vec<&FieldRule> = schema.required_fields().collect();

        if required.is_empty() {
            if schema.fields().is_empty() {
                return 0.0;
            }
            return mapping.coverage(schema);
        }

        let matched = required
            .iter()
            .filter(|f| !mapping.columns_for(&f.name).is_empty())
            .count();
        matched as f64 / required.len() as f64 * 100.0
    }
}

/// Case-insensitive, whitespace-normalized header comparison key.
/// Underscores count as spaces so `ID_NUMBER` meets "Id Number".
fn normalize_header(header: &str) -> String {
    header
        .to_lowercase()
        .replace('_', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Percentage of sampled values the rule validates for this column. Optional
/// rules ignore empty cells (no evidence either way), required rules count
/// them against the column.
fn column_pass_rate(
    rule: &FieldRule,
    dataset: &Dataset,
    column_index: usize,
    sample_rows: usize,
) -> f64 {
    let sample = dataset.rows.iter().take(sample_rows.max(1));

    let mut total = 0usize;
    let mut valid = 0usize;
    for row in sample {
        let cell = row.get(column_index).map(String::as_str).unwrap_or("");
        if cell.trim().is_empty() && !rule.required {
            continue;
        }
        total += 1;
        if validate_value(rule, cell).valid {
            valid += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        valid as f64 / total as f64 * 100.0
    }
}
