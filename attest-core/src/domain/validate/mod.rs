// attest-core/src/domain/validate/mod.rs
//
// Field Validator Library. Every function here is pure: raw string in,
// verdict out. Malformed input is never an error — it is an invalid verdict
// with a reason the reports can show as-is.

pub mod national_id;
pub mod row;

use chrono::NaiveDate;
use regex::Regex;

use crate::domain::schema::{FieldKind, FieldRule, ReferenceList};

pub use national_id::validate_national_id;

/// Accepted calendar formats, tried in order before the Unix fallback.
const DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%m-%d-%Y", "%d.%m.%Y", "%m.%d.%Y", "%Y/%m/%d",
    "%d %b %Y", "%d %B %Y",
];

/// Unix timestamps after this (2999-12-31 ish) are garbage, not dates.
const MAX_UNIX_TIMESTAMP: f64 = 32_503_680_000.0;

/// Verdict of one validator over one raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldVerdict {
    pub valid: bool,
    pub errors: Vec<String>,
    /// For fuzzy-list matches: the canonical name the value resolved to.
    pub canonical: Option<String>,
}

impl FieldVerdict {
    pub fn pass() -> Self {
        Self {
            valid: true,
            errors: vec![],
            canonical: None,
        }
    }

    pub fn pass_as(canonical: String) -> Self {
        Self {
            valid: true,
            errors: vec![],
            canonical: Some(canonical),
        }
    }

    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            errors: vec![reason.into()],
            canonical: None,
        }
    }
}

/// Applies the rule's validator to a raw cell value.
///
/// Emptiness is handled here, once: an empty value fails a required field and
/// passes an optional one, whatever the kind.
pub fn validate_value(rule: &FieldRule, raw: &str) -> FieldVerdict {
    let value = raw.trim();
    if value.is_empty() {
        if rule.required {
            return FieldVerdict::fail("Required field is empty");
        }
        return FieldVerdict::pass();
    }

    match &rule.kind {
        FieldKind::Pattern { regex } => pattern(value, regex),
        FieldKind::FuzzyList { list, distance } => fuzzy_list(value, list, *distance),
        FieldKind::NationalId => validate_national_id(value),
        FieldKind::BankAccount => bank_account(value),
        FieldKind::PostalCode => postal_code(value),
        FieldKind::Enum { name, values } => enum_member(value, name, values),
        FieldKind::Date => date(value),
        FieldKind::DecimalAmount => decimal_amount(value),
        FieldKind::FreeForm { min_length } => free_form(value, *min_length),
    }
}

// --- INDIVIDUAL VALIDATORS ---

fn pattern(value: &str, regex: &Regex) -> FieldVerdict {
    // Patterns are anchored when the schema loads, so is_match == full match.
    if regex.is_match(value) {
        FieldVerdict::pass()
    } else {
        FieldVerdict::fail(format!("Value does not match pattern: {}", regex.as_str()))
    }
}

/// Lowercase, trim, collapse runs of whitespace. Similarity must not care
/// about casing or spacing ("sasol" scores the same as "SASOL").
fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized Levenshtein similarity in [0, 100].
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize(a), &normalize(b)) * 100.0
}

/// Best (score, canonical name) over every entry name and alias of the list.
pub fn best_list_match<'a>(value: &str, list: &'a ReferenceList) -> Option<(f64, &'a str)> {
    let mut best: Option<(f64, &'a str)> = None;
    for entry in &list.entries {
        let mut score = similarity(value, &entry.name);
        for alias in &entry.aliases {
            let alias_score = similarity(value, alias);
            if alias_score > score {
                score = alias_score;
            }
        }
        match best {
            Some((b, _)) if b >= score => {}
            _ => best = Some((score, entry.name.as_str())),
        }
    }
    best
}

fn fuzzy_list(value: &str, list: &ReferenceList, distance: f64) -> FieldVerdict {
    match best_list_match(value, list) {
        Some((score, name)) if score >= distance => FieldVerdict::pass_as(name.to_string()),
        Some((score, name)) => FieldVerdict::fail(format!(
            "No close match in list '{}' (best: {}, score: {:.1}%)",
            list.name, name, score
        )),
        None => FieldVerdict::fail(format!("Reference list '{}' is empty", list.name)),
    }
}

fn bank_account(value: &str) -> FieldVerdict {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != ',')
        .collect();

    let shape_ok = (6..=12).contains(&cleaned.len())
        && cleaned.chars().all(|c| c.is_ascii_digit() || c == '*');

    if shape_ok {
        FieldVerdict::pass()
    } else {
        FieldVerdict::fail("Invalid bank account number")
    }
}

fn postal_code(value: &str) -> FieldVerdict {
    let cleaned: String = value.chars().filter(|c| !c.is_whitespace()).collect();

    let shape_ok = (4..=10).contains(&cleaned.len())
        && cleaned.chars().all(|c| c.is_ascii_digit() || c == '-');

    if shape_ok {
        FieldVerdict::pass()
    } else {
        FieldVerdict::fail("Invalid postal code")
    }
}

fn enum_member(value: &str, name: &str, values: &[String]) -> FieldVerdict {
    // Exact, case-sensitive. No fuzziness on enums.
    if values.iter().any(|v| v == value) {
        FieldVerdict::pass()
    } else {
        FieldVerdict::fail(format!("Value not in allowed list: {}", name))
    }
}

fn date(value: &str) -> FieldVerdict {
    for fmt in DATE_FORMATS {
        if NaiveDate::parse_from_str(value, fmt).is_ok() {
            return FieldVerdict::pass();
        }
    }

    // Unix timestamp fallback, bounded to [1970, 3000).
    if let Ok(ts) = value.parse::<f64>()
        && ts.is_finite()
        && (0.0..=MAX_UNIX_TIMESTAMP).contains(&ts)
    {
        return FieldVerdict::pass();
    }

    FieldVerdict::fail("Invalid date format")
}

fn decimal_amount(value: &str) -> FieldVerdict {
    // Strip currency symbols, grouping commas and inner spaces first.
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && !"$£€".contains(*c))
        .collect();

    let mut parts = cleaned.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next();

    let whole_ok = !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit());
    let frac_ok = match frac {
        None => true,
        Some(f) => (1..=2).contains(&f.len()) && f.chars().all(|c| c.is_ascii_digit()),
    };

    if whole_ok && frac_ok {
        FieldVerdict::pass()
    } else {
        FieldVerdict::fail("Invalid decimal amount (expected a non-negative value, max 2 decimals)")
    }
}

fn free_form(value: &str, min_length: usize) -> FieldVerdict {
    if value.len() >= min_length {
        FieldVerdict::pass()
    } else {
        FieldVerdict::fail(format!("Value shorter than {} characters", min_length))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::schema::ReferenceEntry;

    fn rule(kind: FieldKind, required: bool) -> FieldRule {
        FieldRule {
            name: "FIELD".into(),
            kind,
            required,
            slugs: vec![],
            max_matches: 1,
            description: None,
        }
    }

    fn banks() -> ReferenceList {
        ReferenceList {
            name: "banks".into(),
            entries: vec![
                ReferenceEntry {
                    name: "Standard Bank".into(),
                    aliases: vec!["SBSA".into(), "Standard Bank of South Africa".into()],
                },
                ReferenceEntry {
                    name: "Sasol".into(),
                    aliases: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_empty_value_required_vs_optional() {
        let required = rule(FieldKind::Date, true);
        let optional = rule(FieldKind::Date, false);

        assert!(!validate_value(&required, "  ").valid);
        assert!(validate_value(&optional, "").valid);
    }

    #[test]
    fn test_pattern_full_match_only() {
        let re = Regex::new("^(?:[A-Z]{3}\\d{2})$").unwrap();
        let r = rule(FieldKind::Pattern { regex: re }, true);

        assert!(validate_value(&r, "ABC12").valid);
        // A prefix match is not enough.
        assert!(!validate_value(&r, "ABC123").valid);
    }

    #[test]
    fn test_fuzzy_match_is_case_and_whitespace_insensitive() {
        // Casing must not change the score, even for partial matches.
        let lower = similarity("sasol ltd", "Sasol Limited");
        let upper = similarity("SASOL LTD", "Sasol Limited");
        assert_eq!(lower, upper);
        assert!(lower < 100.0);

        let spaced = similarity("  standard   bank ", "Standard Bank");
        assert_eq!(spaced, 100.0);
    }

    #[test]
    fn test_fuzzy_list_returns_canonical_name() {
        let r = rule(
            FieldKind::FuzzyList {
                list: banks(),
                distance: 80.0,
            },
            true,
        );

        let verdict = validate_value(&r, "SBSA");
        assert!(verdict.valid);
        assert_eq!(verdict.canonical.as_deref(), Some("Standard Bank"));
    }

    #[test]
    fn test_fuzzy_list_below_threshold() {
        let r = rule(
            FieldKind::FuzzyList {
                list: banks(),
                distance: 80.0,
            },
            true,
        );

        let verdict = validate_value(&r, "Totally Different Name");
        assert!(!verdict.valid);
        assert_eq!(verdict.errors.len(), 1);
    }

    #[test]
    fn test_enum_is_case_sensitive() {
        let r = rule(
            FieldKind::Enum {
                name: "account_types".into(),
                values: vec!["CHEQUE".into(), "SAVINGS".into()],
            },
            true,
        );

        assert!(validate_value(&r, "CHEQUE").valid);
        assert!(!validate_value(&r, "cheque").valid);
    }

    #[test]
    fn test_date_rejects_day_31_in_30_day_month() {
        let r = rule(FieldKind::Date, true);

        assert!(validate_value(&r, "2023-04-30").valid);
        assert!(!validate_value(&r, "31/04/2023").valid);
        assert!(!validate_value(&r, "2023-04-31").valid);
    }

    #[test]
    fn test_date_accepts_named_month_and_timestamp() {
        let r = rule(FieldKind::Date, true);

        assert!(validate_value(&r, "15 Mar 2021").valid);
        assert!(validate_value(&r, "1672531200").valid);
        // Year 3000+ is not a plausible timestamp.
        assert!(!validate_value(&r, "99999999999").valid);
    }

    #[test]
    fn test_decimal_amount_rules() {
        let r = rule(FieldKind::DecimalAmount, true);

        assert!(validate_value(&r, "123.45").valid);
        assert!(validate_value(&r, "$ 1,250.00").valid);
        assert!(validate_value(&r, "0").valid);
        assert!(!validate_value(&r, "-12.00").valid);
        assert!(!validate_value(&r, "12.345").valid);
        assert!(!validate_value(&r, "abc").valid);
    }

    #[test]
    fn test_bank_account_and_postal_code_shapes() {
        let account = rule(FieldKind::BankAccount, true);
        assert!(validate_value(&account, "62-1234-5678").valid);
        assert!(validate_value(&account, "123456****").valid);
        assert!(!validate_value(&account, "12345").valid);

        let postal = rule(FieldKind::PostalCode, true);
        assert!(validate_value(&postal, "0181").valid);
        assert!(!validate_value(&postal, "AB1").valid);
    }

    #[test]
    fn test_free_form_min_length() {
        let r = rule(FieldKind::FreeForm { min_length: 4 }, true);

        assert!(validate_value(&r, "12 Long Street").valid);
        assert!(!validate_value(&r, "ab").valid);
    }
}
