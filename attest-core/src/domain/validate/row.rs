// attest-core/src/domain/validate/row.rs

use serde::{Deserialize, Serialize};

use crate::domain::mapping::ColumnMapping;
use crate::domain::schema::SchemaDefinition;
use crate::domain::snapshot::Dataset;
use crate::domain::validate::validate_value;

pub const REASON_NO_MATCHING_COLUMN: &str = "Required field has no matching column";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldStatus {
    #[serde(rename = "MATCH")]
    Match,
    #[serde(rename = "MISMATCH")]
    Mismatch,
    #[serde(rename = "MISSING_COLUMN")]
    MissingColumn,
}

/// Verdict of one schema field on one row. Exactly one of these exists per
/// field per row, whatever the source column count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOutcome {
    pub field: String,
    /// First bound column, if any.
    pub column: Option<String>,
    pub value: Option<String>,
    pub status: FieldStatus,
    pub errors: Vec<String>,
    /// Canonical name resolved by a fuzzy-list validator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
}

impl FieldOutcome {
    pub fn is_valid(&self) -> bool {
        self.status == FieldStatus::Match
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowValidationResult {
    pub row_index: usize,
    pub valid: bool,
    pub outcomes: Vec<FieldOutcome>,
}

impl RowValidationResult {
    pub fn outcome(&self, field: &str) -> Option<&FieldOutcome> {
        self.outcomes.iter().find(|o| o.field == field)
    }
}

/// Derived run statistics. Always computed from the results, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationStats {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub invalid_rows: usize,
    pub success_rate: f64,
}

pub fn stats(results: &[RowValidationResult]) -> ValidationStats {
    let total = results.len();
    let valid = results.iter().filter(|r| r.valid).count();
    ValidationStats {
        total_rows: total,
        valid_rows: valid,
        invalid_rows: total - valid,
        success_rate: if total == 0 {
            0.0
        } else {
            valid as f64 / total as f64 * 100.0
        },
    }
}

/// Fraction of rows on which `field` validated, for the mapping report.
pub fn field_success_rate(results: &[RowValidationResult], field: &str) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let ok = results
        .iter()
        .filter(|r| r.outcome(field).is_some_and(FieldOutcome::is_valid))
        .count();
    ok as f64 / results.len() as f64 * 100.0
}

/// Validates every row of the dataset. Deterministic: fields are visited in
/// schema declaration order, rows in dataset order, so identical input always
/// produces an identical result sequence.
pub fn validate_rows(
    schema: &SchemaDefinition,
    mapping: &ColumnMapping,
    dataset: &Dataset,
) -> Vec<RowValidationResult> {
    (0..dataset.row_count())
        .map(|row_index| validate_row(schema, mapping, dataset, row_index))
        .collect()
}

pub fn validate_row(
    schema: &SchemaDefinition,
    mapping: &ColumnMapping,
    dataset: &Dataset,
    row_index: usize,
) -> RowValidationResult {
    let mut outcomes = Vec::with_capacity(schema.fields().len());

    for rule in schema.fields() {
        let columns = mapping.columns_for(&rule.name);

        let outcome = if columns.is_empty() {
            if rule.required {
                FieldOutcome {
                    field: rule.name.clone(),
                    column: None,
                    value: None,
                    status: FieldStatus::MissingColumn,
                    errors: vec![REASON_NO_MATCHING_COLUMN.to_string()],
                    canonical: None,
                }
            } else {
                // An optional field with no column simply has no value.
                FieldOutcome {
                    field: rule.name.clone(),
                    column: None,
                    value: None,
                    status: FieldStatus::Match,
                    errors: vec![],
                    canonical: None,
                }
            }
        } else {
            // Multi-column fields: every non-empty occurrence must pass on
            // its own; emptiness overall is judged by the rule's required
            // flag against the first column.
            let mut errors: Vec<String> = Vec::new();
            let mut canonical = None;
            let mut any_non_empty = false;

            for column in &columns {
                let cell = dataset.cell(row_index, column).unwrap_or("");
                if cell.trim().is_empty() {
                    continue;
                }
                any_non_empty = true;
                let verdict = validate_value(rule, cell);
                if canonical.is_none() {
                    canonical = verdict.canonical.clone();
                }
                for reason in verdict.errors {
                    errors.push(if columns.len() > 1 {
                        format!("{}: {}", column, reason)
                    } else {
                        reason
                    });
                }
            }

            if !any_non_empty && rule.required {
                errors.push("Required field is empty".to_string());
            }

            let first_column = columns[0].to_string();
            let value = dataset
                .cell(row_index, &first_column)
                .map(|v| v.to_string());

            FieldOutcome {
                field: rule.name.clone(),
                column: Some(first_column),
                value,
                status: if errors.is_empty() {
                    FieldStatus::Match
                } else {
                    FieldStatus::Mismatch
                },
                errors,
                canonical,
            }
        };

        outcomes.push(outcome);
    }

    // Row validity depends on required fields only; an optional mismatch is
    // reported but never flips the row.
    let valid = schema
        .required_fields()
        .all(|rule| match outcomes.iter().find(|o| o.field == rule.name) {
            Some(outcome) => outcome.is_valid(),
            None => false,
        });

    RowValidationResult {
        row_index,
        valid,
        outcomes,
    }
}
