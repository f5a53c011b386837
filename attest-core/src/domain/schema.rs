// attest-core/src/domain/schema.rs

use regex::Regex;

use crate::domain::error::DomainError;

// =============================================================================
//  1. REFERENCE DATA (fuzzy lists / enums)
// =============================================================================

/// One canonical entry of a reference list, with the alternative spellings
/// the tenant accepts for it.
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub name: String,
    pub aliases: Vec<String>,
}

/// A named list of canonical names used by LEV_DISTANCE fields.
#[derive(Debug, Clone)]
pub struct ReferenceList {
    pub name: String,
    pub entries: Vec<ReferenceEntry>,
}

// =============================================================================
//  2. FIELD RULES
// =============================================================================

/// Closed set of validation kinds. One variant per `validate_type`, each
/// carrying only the parameters its validator needs. Adding a kind means
/// adding a variant here and one pure function in `domain::validate`.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Full-match against a regex (anchored at load time).
    Pattern { regex: Regex },
    /// Similarity match against a reference list, threshold in [0, 100].
    FuzzyList { list: ReferenceList, distance: f64 },
    /// National ID number: 13 digits, embedded birth date, Luhn check digit.
    NationalId,
    BankAccount,
    PostalCode,
    /// Case-sensitive membership of a named value set.
    Enum { name: String, values: Vec<String> },
    /// Any of the accepted calendar formats, or a bounded Unix timestamp.
    Date,
    /// Non-negative, at most two fractional digits.
    DecimalAmount,
    /// Free-form text of a minimum trimmed length. Combined with
    /// `max_matches` > 1 this covers multi-column fields (address lines).
    FreeForm { min_length: usize },
}

impl FieldKind {
    /// The `validate_type` token this variant was loaded from.
    pub fn validate_type(&self) -> &'static str {
        match self {
            Self::Pattern { .. } => "REGEX",
            Self::FuzzyList { .. } => "LEV_DISTANCE",
            Self::NationalId => "SA_ID_NUMBER",
            Self::BankAccount => "BANK_ACCOUNT_NUMBER",
            Self::PostalCode => "POSTAL_CODE",
            Self::Enum { .. } => "ENUM",
            Self::Date => "UNIX_DATE",
            Self::DecimalAmount => "DECIMAL_AMOUNT",
            Self::FreeForm { .. } => "FREE_FORM",
        }
    }
}

/// Validation rule for one schema field. Immutable once the schema is loaded.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    /// Alternative column headers this field may appear under in source files.
    pub slugs: Vec<String>,
    /// How many source columns may independently bind to this field.
    pub max_matches: usize,
    pub description: Option<String>,
}

// =============================================================================
//  3. SCHEMA DEFINITION
// =============================================================================

/// One known document type: ordered field rules, the acceptance threshold for
/// the Schema Matcher, and the lookup keys in priority order.
#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub id: String,
    pub document_type: String,
    /// Percentage of required fields that must map for this schema to win.
    pub pass_threshold: f64,
    fields: Vec<FieldRule>,
    lookup_keys: Vec<String>,
}

impl SchemaDefinition {
    pub fn new(
        id: String,
        document_type: String,
        pass_threshold: f64,
        fields: Vec<FieldRule>,
        lookup_keys: Vec<String>,
    ) -> Result<Self, DomainError> {
        if !(0.0..=100.0).contains(&pass_threshold) {
            return Err(DomainError::SchemaError(format!(
                "pass_threshold {} out of range [0, 100] in schema '{}'",
                pass_threshold, id
            )));
        }
        for key in &lookup_keys {
            if !fields.iter().any(|f| &f.name == key) {
                return Err(DomainError::UnknownLookupKey(key.clone()));
            }
        }
        Ok(Self {
            id,
            document_type,
            pass_threshold,
            fields,
            lookup_keys,
        })
    }

    /// Field rules in declaration order.
    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &FieldRule> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Lookup key field names, highest priority first.
    pub fn lookup_keys(&self) -> &[String] {
        &self.lookup_keys
    }
}

/// The set of schema definitions known to the engine, in load order.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    schemas: Vec<SchemaDefinition>,
}

impl SchemaSet {
    pub fn new(schemas: Vec<SchemaDefinition>) -> Self {
        Self { schemas }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaDefinition> {
        self.schemas.iter()
    }

    pub fn get(&self, id: &str) -> Option<&SchemaDefinition> {
        self.schemas.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn free_form_field(name: &str, required: bool) -> FieldRule {
        FieldRule {
            name: name.to_string(),
            kind: FieldKind::FreeForm { min_length: 1 },
            required,
            slugs: vec![],
            max_matches: 1,
            description: None,
        }
    }

    #[test]
    fn test_schema_rejects_unknown_lookup_key() {
        let err = SchemaDefinition::new(
            "s1".into(),
            "Test".into(),
            75.0,
            vec![free_form_field("NAME", true)],
            vec!["EMAIL".into()],
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::UnknownLookupKey(k) if k == "EMAIL"));
    }

    #[test]
    fn test_schema_rejects_out_of_range_threshold() {
        let err = SchemaDefinition::new(
            "s1".into(),
            "Test".into(),
            120.0,
            vec![free_form_field("NAME", true)],
            vec![],
        )
        .unwrap_err();

        assert!(matches!(err, DomainError::SchemaError(_)));
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let schema = SchemaDefinition::new(
            "s1".into(),
            "Test".into(),
            75.0,
            vec![
                free_form_field("B_FIELD", true),
                free_form_field("A_FIELD", false),
            ],
            vec!["B_FIELD".into()],
        )
        .unwrap();

        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["B_FIELD", "A_FIELD"]);
    }
}
