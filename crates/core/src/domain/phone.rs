//! Phone canonicalization used by identity matching and lead records.
//!
//! Every phone that touches the store goes through [`normalize_phone`] so
//! that history lookups and duplicate detection compare apples to apples.

/// Digits kept as the canonical matching key.
pub const CANONICAL_DIGITS: usize = 10;

/// Country prefixes recognized in 11-digit numbers.
const COUNTRY_PREFIXES: [char; 2] = ['7', '8'];

/// Normalizes a raw phone string to its canonical 10-digit form.
///
/// Strips everything that is not a digit. Fewer than ten digits means the
/// text was not a usable phone at all and the result is `None`. An 11-digit
/// number starting with a recognized country prefix drops the leading digit;
/// anything longer keeps the trailing ten.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < CANONICAL_DIGITS {
        return None;
    }
    if digits.len() == CANONICAL_DIGITS {
        return Some(digits);
    }
    if digits.len() == CANONICAL_DIGITS + 1 && digits.starts_with(COUNTRY_PREFIXES) {
        return Some(digits[1..].to_string());
    }
    // Unrecognized prefixes and longer international forms: trailing ten.
    Some(digits[digits.len() - CANONICAL_DIGITS..].to_string())
}

/// Human-readable rendering of a canonical phone for staff notifications.
pub fn format_phone(normalized: &str) -> String {
    if normalized.len() != CANONICAL_DIGITS {
        return normalized.to_string();
    }
    format!(
        "+7 ({}) {}-{}-{}",
        &normalized[0..3],
        &normalized[3..6],
        &normalized[6..8],
        &normalized[8..10]
    )
}

#[cfg(test)]
mod tests {
    use super::{format_phone, normalize_phone};

    #[test]
    fn strips_punctuation_from_ten_digit_numbers() {
        assert_eq!(normalize_phone("(912) 345-67-89"), Some("9123456789".to_string()));
    }

    #[test]
    fn eleven_digits_with_country_prefix_keep_trailing_ten() {
        assert_eq!(normalize_phone("+7 912 345-67-89"), Some("9123456789".to_string()));
        assert_eq!(normalize_phone("89123456789"), Some("9123456789".to_string()));
    }

    #[test]
    fn longer_numbers_keep_trailing_ten() {
        assert_eq!(normalize_phone("007 912 345 67 89"), Some("9123456789".to_string()));
    }

    #[test]
    fn short_fragments_are_not_phones() {
        assert_eq!(normalize_phone("345-67-89"), None);
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("call me maybe"), None);
    }

    #[test]
    fn formats_canonical_numbers_for_staff() {
        assert_eq!(format_phone("9123456789"), "+7 (912) 345-67-89");
        assert_eq!(format_phone("345"), "345");
    }
}
