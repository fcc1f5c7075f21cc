// Error helpers and argument validators for consistent messages and exit codes

use crate::error::CrmError;
use crate::models::validate::MAX_AMOUNT;
use crate::models::StageSet;
use crate::utils::did_you_mean;
use std::process;

/// Exit with a user error (exit code 1)
pub fn user_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Whether an error chain should be reported as internal (exit 2).
///
/// Backend transport failures and raw database errors are internal;
/// permission, validation and lookup failures are the user's.
pub fn is_internal(err: &anyhow::Error) -> bool {
    for cause in err.chain() {
        if let Some(crm) = cause.downcast_ref::<CrmError>() {
            return crm.kind().is_internal();
        }
        if cause.downcast_ref::<rusqlite::Error>().is_some() {
            return true;
        }
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return true;
        }
    }
    false
}

pub fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("{} cannot be empty", field_name))
    } else {
        Ok(())
    }
}

/// Whole euros; accepts `350000`, `350_000` and `350 000`
pub fn parse_amount(value: &str) -> Result<i64, String> {
    let cleaned: String = value.chars().filter(|c| !matches!(c, '_' | ' ' | '€')).collect();
    let amount = cleaned
        .parse::<i64>()
        .map_err(|_| format!("Invalid amount: '{}'. Amount must be a whole number of euros.", value))?;
    if amount < 0 {
        return Err(format!("Invalid amount: {}. Amount cannot be negative.", amount));
    }
    if amount > MAX_AMOUNT {
        return Err(format!("Invalid amount: {}. Amount cannot exceed {}.", amount, MAX_AMOUNT));
    }
    Ok(amount)
}

/// Percentage between 0 and 100, with or without a trailing `%`
pub fn parse_probability(value: &str) -> Result<i64, String> {
    let probability = value
        .trim()
        .trim_end_matches('%')
        .parse::<i64>()
        .map_err(|_| format!("Invalid probability: '{}'. Probability must be a number.", value))?;
    if !(0..=100).contains(&probability) {
        return Err(format!("Invalid probability: {}. Probability must be between 0 and 100.", probability));
    }
    Ok(probability)
}

/// Stage value or label (case-insensitive), with a suggestion when unknown
pub fn parse_stage<S: StageSet>(value: &str) -> Result<S, String> {
    let wanted = value.trim().to_lowercase();
    if let Some(stage) = S::from_str(&wanted) {
        return Ok(stage);
    }
    if let Some(stage) = S::ALL.iter().copied().find(|s| s.label().to_lowercase() == wanted) {
        return Ok(stage);
    }
    let known: Vec<&str> = S::ALL.iter().map(|s| s.as_str()).collect();
    Err(format!(
        "Unknown stage '{}'. Stages: {}.{}",
        value,
        known.join(", "),
        did_you_mean(&wanted, &known)
    ))
}

/// Closed enum value (activity type, priority...) with a suggestion when unknown
pub fn parse_choice<T: Copy>(
    value: &str,
    field: &str,
    all: &[T],
    as_str: impl Fn(&T) -> &'static str,
) -> Result<T, String> {
    let wanted = value.trim().to_lowercase();
    if let Some(found) = all.iter().find(|v| as_str(*v) == wanted) {
        return Ok(*found);
    }
    let known: Vec<&str> = all.iter().map(&as_str).collect();
    Err(format!(
        "Invalid {}: '{}'. Valid values: {}.{}",
        field,
        value,
        known.join(", "),
        did_you_mean(&wanted, &known)
    ))
}
