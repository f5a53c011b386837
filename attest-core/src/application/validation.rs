// attest-core/src/application/validation.rs

use tracing::info;

use crate::domain::mapping::{ColumnMapping, SchemaMatcher};
use crate::domain::schema::{SchemaDefinition, SchemaSet};
use crate::domain::snapshot::Dataset;
use crate::domain::validate::row::{RowValidationResult, ValidationStats, stats, validate_rows};
use crate::error::AttestError;

/// Everything one validation pass produced. Superseded wholesale by a re-run,
/// never patched in place.
#[derive(Debug, Clone)]
pub struct ValidationRun {
    pub schema_id: String,
    pub document_type: String,
    pub match_score: f64,
    pub mapping: ColumnMapping,
    pub rows: Vec<RowValidationResult>,
}

impl ValidationRun {
    /// Derived metrics; nothing here is stored twice.
    pub fn stats(&self) -> ValidationStats {
        stats(&self.rows)
    }
}

/// Full automatic pass: pick the best-fit schema, then validate every row
/// against it. `SchemaNotMatched` is fatal for the run and propagates.
pub fn run_validation(
    set: &SchemaSet,
    dataset: &Dataset,
    sample_rows: usize,
) -> Result<ValidationRun, AttestError> {
    println!("🔍 Matching {} schema(s) against '{}'...", set.len(), dataset.source);
    let outcome = SchemaMatcher::select(set, dataset, sample_rows)?;

    let Some(schema) = set.get(&outcome.schema_id) else {
        return Err(AttestError::InternalError(format!(
            "Winning schema '{}' vanished from the set",
            outcome.schema_id
        )));
    };

    info!(schema = %schema.id, score = %format!("{:.2}%", outcome.score), "Schema selected");
    println!(
        "📋 Document type: {} (score {:.1}%)",
        schema.document_type, outcome.score
    );

    Ok(build_run(schema, outcome.score, outcome.mapping, dataset))
}

/// Validation against an externally supplied mapping (manual override).
/// The mapping is taken as-is; the matcher is not consulted.
pub fn run_validation_with_mapping(
    schema: &SchemaDefinition,
    mapping: ColumnMapping,
    dataset: &Dataset,
) -> ValidationRun {
    info!(schema = %schema.id, "Validating with manual mapping override");
    // A manual mapping is trusted at face value, like the original system's
    // 100%-scored manual entries.
    build_run(schema, 100.0, mapping, dataset)
}

fn build_run(
    schema: &SchemaDefinition,
    match_score: f64,
    mapping: ColumnMapping,
    dataset: &Dataset,
) -> ValidationRun {
    println!("🧪 Validating {} row(s)...", dataset.row_count());
    let rows = validate_rows(schema, &mapping, dataset);

    ValidationRun {
        schema_id: schema.id.clone(),
        document_type: schema.document_type.clone(),
        match_score,
        mapping,
        rows,
    }
}
