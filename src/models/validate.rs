// Form input validation. Failures are resolved at the form boundary and
// never reach the stage engine.

use crate::error::{CrmError, CrmResult};

pub fn non_empty(value: &str, field_name: &str) -> CrmResult<()> {
    if value.trim().is_empty() {
        Err(CrmError::validation(format!("{} cannot be empty", field_name)))
    } else {
        Ok(())
    }
}

/// Loose email check: one '@', non-empty local part, dotted domain, no spaces
pub fn email(value: &str) -> CrmResult<()> {
    let invalid = || CrmError::validation(format!("Invalid email: '{}'", value));
    if value.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    let (local, domain) = value.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err(invalid()),
    }
}

/// Phone numbers: digits with optional leading '+', spaces, dots, dashes
pub fn phone(value: &str) -> CrmResult<()> {
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let allowed = value
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '.' || c == '-' || (c == '+' && i == 0));
    if allowed && (6..=15).contains(&digits) {
        Ok(())
    } else {
        Err(CrmError::validation(format!("Invalid phone number: '{}'", value)))
    }
}

pub fn probability(value: i64) -> CrmResult<()> {
    if (0..=100).contains(&value) {
        Ok(())
    } else {
        Err(CrmError::validation(format!(
            "Invalid probability: {}. Probability must be between 0 and 100.",
            value
        )))
    }
}

/// Largest accepted amount, in euros
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

pub fn non_negative_amount(value: i64, field_name: &str) -> CrmResult<()> {
    if value < 0 {
        Err(CrmError::validation(format!("{} cannot be negative", field_name)))
    } else if value > MAX_AMOUNT {
        Err(CrmError::validation(format!("{} cannot exceed {}", field_name, MAX_AMOUNT)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_empty() {
        assert!(non_empty("Dupont", "last name").is_ok());
        assert!(non_empty("", "last name").is_err());
        assert!(non_empty("   ", "last name").is_err());
    }

    #[test]
    fn test_email() {
        assert!(email("marie@agence.fr").is_ok());
        assert!(email("marie.dupont@mail.agence.fr").is_ok());
        assert!(email("marie").is_err());
        assert!(email("@agence.fr").is_err());
        assert!(email("marie@agence").is_err());
        assert!(email("marie @agence.fr").is_err());
        assert!(email("a@b@c.fr").is_err());
    }

    #[test]
    fn test_phone() {
        assert!(phone("06 12 34 56 78").is_ok());
        assert!(phone("+33 6 12 34 56 78").is_ok());
        assert!(phone("06.12.34.56.78").is_ok());
        assert!(phone("12").is_err());
        assert!(phone("06 12 ab").is_err());
        assert!(phone("06+12345678").is_err());
    }

    #[test]
    fn test_probability_bounds() {
        assert!(probability(0).is_ok());
        assert!(probability(100).is_ok());
        assert!(probability(-1).is_err());
        assert!(probability(101).is_err());
    }

    #[test]
    fn test_amount_bounds() {
        assert!(non_negative_amount(0, "Amount").is_ok());
        assert!(non_negative_amount(MAX_AMOUNT, "Amount").is_ok());
        assert!(non_negative_amount(-1, "Amount").is_err());
        assert!(non_negative_amount(MAX_AMOUNT + 1, "Amount").is_err());
        assert!(non_negative_amount(i64::MAX, "Budget").is_err());
    }
}
