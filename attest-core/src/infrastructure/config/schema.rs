// attest-core/src/infrastructure/config/schema.rs

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, instrument, warn};
use walkdir::WalkDir;

use crate::domain::error::DomainError;
use crate::domain::ports::SchemaSource;
use crate::domain::schema::{
    FieldKind, FieldRule, ReferenceEntry, ReferenceList, SchemaDefinition, SchemaSet,
};
use crate::infrastructure::error::InfrastructureError;

const SCHEMA_EXTENSIONS: [&str; 2] = ["yaml", "yml"];

// =============================================================================
//  1. DOCUMENT CONTRACT (DTOs)
// =============================================================================

#[derive(Debug, Deserialize)]
struct SchemaDoc {
    #[serde(rename = "type")]
    document_type: String,

    #[serde(default = "default_pass_threshold")]
    pass_threshold: f64,

    /// serde_yaml::Mapping keeps the file's field declaration order; a
    /// HashMap here would shuffle it and break outcome ordering downstream.
    schema: serde_yaml::Mapping,

    #[serde(default)]
    lists: HashMap<String, Vec<ReferenceEntryDoc>>,

    #[serde(default)]
    enums: HashMap<String, Vec<String>>,

    #[serde(default)]
    lookup: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReferenceEntryDoc {
    name: String,
    #[serde(default)]
    aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct FieldRuleDoc {
    #[serde(default)]
    required: bool,

    #[serde(default)]
    slug: Vec<String>,

    #[serde(default = "default_max_matches")]
    max_matches: usize,

    #[serde(default)]
    description: Option<String>,

    #[serde(flatten)]
    kind: FieldKindDoc,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "validate_type")]
enum FieldKindDoc {
    #[serde(rename = "REGEX")]
    Regex { regex: String },

    #[serde(rename = "LEV_DISTANCE")]
    LevDistance {
        list: String,
        #[serde(default = "default_distance")]
        distance: f64,
    },

    #[serde(rename = "SA_ID_NUMBER")]
    SaIdNumber,

    #[serde(rename = "BANK_ACCOUNT_NUMBER")]
    BankAccountNumber,

    #[serde(rename = "POSTAL_CODE")]
    PostalCode,

    #[serde(rename = "ENUM")]
    Enum {
        #[serde(rename = "enum")]
        name: String,
    },

    #[serde(rename = "UNIX_DATE")]
    UnixDate,

    #[serde(rename = "DECIMAL_AMOUNT")]
    DecimalAmount,

    #[serde(rename = "FREE_FORM")]
    FreeForm {
        #[serde(default = "default_min_length")]
        min_length: usize,
    },
}

fn default_pass_threshold() -> f64 {
    75.0
}
fn default_max_matches() -> usize {
    1
}
fn default_distance() -> f64 {
    80.0
}
fn default_min_length() -> usize {
    2
}

// =============================================================================
//  2. COMPILATION (DTO -> Domain)
// =============================================================================

/// Parses one schema document and compiles it into the immutable domain
/// definition: regexes anchored and compiled once, list/enum references
/// resolved, lookup keys checked.
pub fn compile_schema(id: &str, content: &str) -> Result<SchemaDefinition, InfrastructureError> {
    let doc: SchemaDoc = serde_yaml::from_str(content).map_err(InfrastructureError::YamlError)?;

    let mut fields = Vec::with_capacity(doc.schema.len());
    for (key, value) in &doc.schema {
        let Some(field_name) = key.as_str() else {
            return Err(InfrastructureError::ConfigError(format!(
                "Schema '{}': field names must be strings",
                id
            )));
        };

        let rule_doc: FieldRuleDoc = serde_yaml::from_value(value.clone())
            .map_err(InfrastructureError::YamlError)?;

        let kind = compile_kind(id, field_name, rule_doc.kind, &doc)?;
        fields.push(FieldRule {
            name: field_name.to_string(),
            kind,
            required: rule_doc.required,
            slugs: rule_doc.slug,
            max_matches: rule_doc.max_matches.max(1),
            description: rule_doc.description,
        });
    }

    SchemaDefinition::new(
        id.to_string(),
        doc.document_type,
        doc.pass_threshold,
        fields,
        doc.lookup,
    )
    .map_err(|e| InfrastructureError::ConfigError(e.to_string()))
}

fn compile_kind(
    schema_id: &str,
    field: &str,
    kind: FieldKindDoc,
    doc: &SchemaDoc,
) -> Result<FieldKind, InfrastructureError> {
    Ok(match kind {
        FieldKindDoc::Regex { regex } => {
            // Anchor here, once: validators then use plain is_match for
            // full-match semantics.
            let anchored = format!("^(?:{})$", regex);
            let compiled = Regex::new(&anchored).map_err(|e| {
                InfrastructureError::ConfigError(format!(
                    "Schema '{}', field '{}': invalid regex: {}",
                    schema_id, field, e
                ))
            })?;
            FieldKind::Pattern { regex: compiled }
        }

        FieldKindDoc::LevDistance { list, distance } => {
            let Some(entries) = doc.lists.get(&list) else {
                return Err(InfrastructureError::ConfigError(
                    DomainError::UnknownList {
                        field: field.to_string(),
                        list,
                    }
                    .to_string(),
                ));
            };
            FieldKind::FuzzyList {
                list: ReferenceList {
                    name: list,
                    entries: entries
                        .iter()
                        .map(|e| ReferenceEntry {
                            name: e.name.clone(),
                            aliases: e.aliases.clone(),
                        })
                        .collect(),
                },
                distance,
            }
        }

        FieldKindDoc::Enum { name } => {
            let Some(values) = doc.enums.get(&name) else {
                return Err(InfrastructureError::ConfigError(
                    DomainError::UnknownEnum {
                        field: field.to_string(),
                        name,
                    }
                    .to_string(),
                ));
            };
            FieldKind::Enum {
                name,
                values: values.clone(),
            }
        }

        FieldKindDoc::SaIdNumber => FieldKind::NationalId,
        FieldKindDoc::BankAccountNumber => FieldKind::BankAccount,
        FieldKindDoc::PostalCode => FieldKind::PostalCode,
        FieldKindDoc::UnixDate => FieldKind::Date,
        FieldKindDoc::DecimalAmount => FieldKind::DecimalAmount,
        FieldKindDoc::FreeForm { min_length } => FieldKind::FreeForm { min_length },
    })
}

// =============================================================================
//  3. ADAPTER (Port Implementation)
// =============================================================================

pub struct SchemaAdapter;

impl SchemaSource for SchemaAdapter {
    fn load(&self, schemas_dir: &Path) -> Result<SchemaSet, DomainError> {
        load_schema_dir(schemas_dir).map_err(|e| DomainError::SchemaError(e.to_string()))
    }
}

/// Scans the directory for schema documents. A document that fails to parse
/// is skipped with a warning (one bad tenant file must not sink the others);
/// an empty result is an error because nothing can be matched.
#[instrument(skip(schemas_dir))]
pub fn load_schema_dir(schemas_dir: &Path) -> Result<SchemaSet, InfrastructureError> {
    if !schemas_dir.exists() {
        return Err(InfrastructureError::ConfigNotFound(format!(
            "Schemas directory {:?} does not exist",
            schemas_dir
        )));
    }

    let mut paths: Vec<_> = WalkDir::new(schemas_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path().is_file()
                && e.path()
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| SCHEMA_EXTENSIONS.contains(&ext))
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort(); // load order must be stable across platforms

    let mut schemas = Vec::new();
    for path in paths {
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("schema")
            .to_string();

        let content = fs::read_to_string(&path).map_err(InfrastructureError::Io)?;
        match compile_schema(&id, &content) {
            Ok(schema) => {
                info!(schema = %id, fields = schema.fields().len(), "Schema loaded");
                schemas.push(schema);
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Skipping unparseable schema document");
            }
        }
    }

    if schemas.is_empty() {
        return Err(InfrastructureError::ConfigError(format!(
            "No usable schema documents in {:?}",
            schemas_dir
        )));
    }

    Ok(SchemaSet::new(schemas))
}
