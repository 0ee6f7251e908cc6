//! EAN-13 normalization

use eanscout_common::{Error, Result};

/// Digits in a normalized EAN
pub const EAN_LENGTH: usize = 13;

/// Strip every non-digit character; the remainder must be exactly 13 digits.
///
/// No check-digit validation is performed.
pub fn normalize_ean(raw: &str) -> Result<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() == EAN_LENGTH {
        Ok(digits)
    } else {
        Err(Error::InvalidEan(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_separators_and_letters() {
        assert_eq!(normalize_ean("359-6655-503845X").unwrap(), "3596655503845");
        assert_eq!(normalize_ean(" 3596655503845 ").unwrap(), "3596655503845");
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(normalize_ean("123"), Err(Error::InvalidEan(_))));
        assert!(matches!(
            normalize_ean("35966555038450"),
            Err(Error::InvalidEan(_))
        ));
        assert!(matches!(normalize_ean(""), Err(Error::InvalidEan(_))));
    }

    #[test]
    fn test_bad_check_digit_still_accepted() {
        assert_eq!(normalize_ean("1234567890123").unwrap(), "1234567890123");
    }
}
