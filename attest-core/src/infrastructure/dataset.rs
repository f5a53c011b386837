// attest-core/src/infrastructure/dataset.rs

use std::path::Path;
use tracing::info;

use crate::domain::snapshot::Dataset;
use crate::infrastructure::error::InfrastructureError;

/// Loads a delimited file into the working dataset. Headers become columns;
/// every cell stays a raw string — typing is the validators' job. Short rows
/// are padded so cell addressing never goes out of bounds.
pub fn load_csv_dataset(path: &Path) -> Result<Dataset, InfrastructureError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(InfrastructureError::CsvError)?;

    let columns: Vec<String> = reader
        .headers()
        .map_err(InfrastructureError::CsvError)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(InfrastructureError::CsvError)?;
        let mut row: Vec<String> = record.iter().map(String::from).collect();
        row.resize(columns.len(), String::new());
        rows.push(row);
    }

    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    info!(source = %source, rows = rows.len(), columns = columns.len(), "Dataset loaded");
    Ok(Dataset::new(source, columns, rows))
}
