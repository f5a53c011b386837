// attest-core/src/domain/mapping/mod.rs

pub mod matcher;

use serde::{Deserialize, Serialize};

use crate::domain::schema::SchemaDefinition;

pub use matcher::{MatchOutcome, SchemaMatcher};

// =============================================================================
//  1. COLUMN MAPPING
// =============================================================================

/// How a column ended up bound to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// Header matched the field name or one of its slugs.
    Alias,
    /// Statistical fallback: the column's sampled values validated best.
    Content,
    /// Installed by an external override, taken as-is.
    Manual,
}

/// One `source column -> schema field` edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnBinding {
    pub column: String,
    pub field: String,
    pub origin: BindingOrigin,
    /// Pass rate (content) or 100 (alias/manual). Kept for the mapping report.
    pub score: f64,
}

/// The column -> field mapping for one dataset. Column names are unique;
/// field names may repeat when the field allows multiple matches (address
/// lines). Created once by the Schema Matcher (or a manual override) and
/// read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    bindings: Vec<ColumnBinding>,
}

impl ColumnMapping {
    pub(crate) fn from_bindings(bindings: Vec<ColumnBinding>) -> Self {
        Self { bindings }
    }

    /// Builds a mapping from externally supplied `(column, field)` pairs.
    /// Later duplicates of an already-bound column are dropped, keeping the
    /// first occurrence (column keys stay unique).
    pub fn manual(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut bindings: Vec<ColumnBinding> = Vec::new();
        for (column, field) in pairs {
            if bindings.iter().any(|b| b.column == column) {
                continue;
            }
            bindings.push(ColumnBinding {
                column,
                field,
                origin: BindingOrigin::Manual,
                score: 100.0,
            });
        }
        Self { bindings }
    }

    pub fn bindings(&self) -> &[ColumnBinding] {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Columns bound to `field`, in binding order.
    pub fn columns_for(&self, field: &str) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|b| b.field == field)
            .map(|b| b.column.as_str())
            .collect()
    }

    pub fn field_for(&self, column: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.column == column)
            .map(|b| b.field.as_str())
    }

    /// Percentage of schema fields with at least one bound column.
    pub fn coverage(&self, schema: &SchemaDefinition) -> f64 {
        if schema.fields().is_empty() {
            return 0.0;
        }
        let mapped = schema
            .fields()
            .iter()
            .filter(|f| !self.columns_for(&f.name).is_empty())
            .count();
        mapped as f64 / schema.fields().len() as f64 * 100.0
    }

    pub fn unmapped_fields(&self, schema: &SchemaDefinition) -> Vec<String> {
        schema
            .fields()
            .iter()
            .filter(|f| self.columns_for(&f.name).is_empty())
            .map(|f| f.name.clone())
            .collect()
    }
}

// =============================================================================
//  2. MAPPING ARTIFACT (produced document)
// =============================================================================

/// One row of the mapping artifact consumed by downstream rendering and by
/// manual override tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingEntry {
    pub column: String,
    #[serde(rename = "type")]
    pub field: String,
    pub validation: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub slug: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDocument {
    pub document_type: String,
    pub entries: Vec<MappingEntry>,
}

/// Flattens a schema + mapping into the artifact document, one entry per
/// bound column, in binding order.
pub fn build_mapping_document(schema: &SchemaDefinition, mapping: &ColumnMapping) -> MappingDocument {
    let entries = mapping
        .bindings()
        .iter()
        .filter_map(|binding| {
            schema.field(&binding.field).map(|rule| MappingEntry {
                column: binding.column.clone(),
                field: rule.name.clone(),
                validation: rule.kind.validate_type().to_string(),
                required: rule.required,
                description: rule.description.clone(),
                slug: if rule.slugs.is_empty() {
                    vec![rule.name.clone()]
                } else {
                    rule.slugs.clone()
                },
            })
        })
        .collect();

    MappingDocument {
        document_type: schema.document_type.clone(),
        entries,
    }
}
