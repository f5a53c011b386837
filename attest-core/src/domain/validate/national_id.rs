// attest-core/src/domain/validate/national_id.rs

use chrono::NaiveDate;

use super::FieldVerdict;

/// Validates a South African ID number.
///
/// Format after stripping spaces and hyphens: `YYMMDD SSSS C A Z` — a birth
/// date, a gender sequence, citizenship, a historical race digit, and a Luhn
/// check digit over the first twelve digits. Each structural layer gets its
/// own reason so exceptions are actionable without re-deriving anything.
pub fn validate_national_id(value: &str) -> FieldVerdict {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect();

    if cleaned.len() != 13 || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return FieldVerdict::fail("ID number must be exactly 13 digits");
    }

    let digits: Vec<u32> = cleaned.chars().filter_map(|c| c.to_digit(10)).collect();

    if !embedded_date_is_valid(&digits) {
        return FieldVerdict::fail("ID number embeds an invalid birth date");
    }

    if !luhn_is_valid(&digits) {
        return FieldVerdict::fail("ID number checksum mismatch");
    }

    FieldVerdict::pass()
}

/// The two-digit year is century-ambiguous; the date is structurally valid if
/// it is a real calendar date in either the 1900s or the 2000s (Feb 29 only
/// has to exist in one of them).
fn embedded_date_is_valid(digits: &[u32]) -> bool {
    let yy = (digits[0] * 10 + digits[1]) as i32;
    let month = digits[2] * 10 + digits[3];
    let day = digits[4] * 10 + digits[5];

    NaiveDate::from_ymd_opt(1900 + yy, month, day).is_some()
        || NaiveDate::from_ymd_opt(2000 + yy, month, day).is_some()
}

/// Standard Luhn over all 13 digits: doubling every second digit from the
/// right, the total must be divisible by ten.
fn luhn_is_valid(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();

    sum % 10 == 0
}
