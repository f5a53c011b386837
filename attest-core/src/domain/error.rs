// attest-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("No schema matched the dataset (best: '{best_schema}' at {best_score:.1}%, threshold {threshold:.1}%)")]
    #[diagnostic(
        code(attest::domain::schema_not_matched),
        help("Check the column headers against the schema slugs, or lower the schema pass_threshold.")
    )]
    SchemaNotMatched {
        best_schema: String,
        best_score: f64,
        threshold: f64,
    },

    #[error("Stale snapshot: report declares hash '{declared}' but live content hashes to '{actual}'")]
    #[diagnostic(
        code(attest::domain::stale_snapshot),
        help("Re-freeze the snapshot before regenerating reports.")
    )]
    StaleSnapshot { declared: String, actual: String },

    #[error("Snapshot '{0}' not found in the store")]
    #[diagnostic(code(attest::domain::snapshot_not_found))]
    SnapshotNotFound(String),

    #[error("Schema Error: {0}")]
    #[diagnostic(code(attest::domain::schema))]
    SchemaError(String),

    #[error("Unknown reference list '{list}' in field '{field}'")]
    #[diagnostic(code(attest::domain::unknown_list))]
    UnknownList { field: String, list: String },

    #[error("Unknown enum '{name}' in field '{field}'")]
    #[diagnostic(code(attest::domain::unknown_enum))]
    UnknownEnum { field: String, name: String },

    #[error("Lookup key '{0}' is not a field of the schema")]
    #[diagnostic(code(attest::domain::unknown_lookup_key))]
    UnknownLookupKey(String),

    #[error("Exception Error: {0}")]
    #[diagnostic(code(attest::domain::exception))]
    ExceptionError(String),

    #[error("Store Error: {0}")]
    #[diagnostic(code(attest::domain::store))]
    StoreError(String),
}
