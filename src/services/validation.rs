//! Input validation for forms submitted through the HTTP API.
//!
//! Validators normalize as they check: they return the trimmed value that
//! should be stored, so callers never persist surrounding whitespace.

use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

use super::amount::{AMOUNT_SCALE, AmountError, AmountInput};

pub const NAME_MAX_LEN: usize = 100;
pub const NOTES_MAX_LEN: usize = 500;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

/// Largest amount a `NUMERIC(14, 2)` column holds.
pub const AMOUNT_MAX: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{2,31}$").expect("username regex"));

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$").expect("phone regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: &'static str },
    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{field} must be at least {min} characters")]
    TooShort { field: &'static str, min: usize },
    #[error("{field} has an invalid format")]
    Format { field: &'static str },
    #[error(transparent)]
    Amount(#[from] AmountError),
    #[error("amount must be greater than zero")]
    NonPositive,
    #[error("amount exceeds the maximum of 999,999,999,999.99")]
    TooLarge,
    #[error("amount has more than two decimal places")]
    Precision,
    #[error("sender and recipient must be different clients")]
    SameClient,
}

impl crate::frame::ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Required { .. } => "E_REQUIRED",
            Self::TooLong { .. } => "E_TOO_LONG",
            Self::TooShort { .. } => "E_TOO_SHORT",
            Self::Format { .. } => "E_FORMAT",
            Self::Amount(inner) => inner.error_code(),
            Self::NonPositive => "E_AMOUNT_NON_POSITIVE",
            Self::TooLarge => "E_AMOUNT_TOO_LARGE",
            Self::Precision => "E_AMOUNT_PRECISION",
            Self::SameClient => "E_SAME_CLIENT",
        }
    }
}

/// Trimmed, non-empty, bounded-length text.
///
/// # Errors
///
/// Returns [`ValidationError`] if the value is blank or too long.
pub fn required_text(field: &'static str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::Required { field });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_owned())
}

/// Optional free text: blank becomes `None`.
///
/// # Errors
///
/// Returns [`ValidationError::TooLong`] past `max` characters.
pub fn optional_text(field: &'static str, raw: Option<&str>, max: usize) -> Result<Option<String>, ValidationError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) if value.chars().count() > max => Err(ValidationError::TooLong { field, max }),
        Some(value) => Ok(Some(value.to_owned())),
    }
}

/// # Errors
///
/// Returns [`ValidationError`] unless 3-32 chars of letters, digits, `.`, `_`, `-`.
pub fn username(raw: &str) -> Result<String, ValidationError> {
    let value = required_text("username", raw, 32)?;
    if !USERNAME_RE.is_match(&value) {
        return Err(ValidationError::Format { field: "username" });
    }
    Ok(value.to_ascii_lowercase())
}

/// # Errors
///
/// Returns [`ValidationError::Format`] for anything not shaped like `a@b.c`.
pub fn email(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(value) = optional_text("email", raw, 254)? else {
        return Ok(None);
    };
    if !EMAIL_RE.is_match(&value) {
        return Err(ValidationError::Format { field: "email" });
    }
    Ok(Some(value.to_ascii_lowercase()))
}

/// # Errors
///
/// Returns [`ValidationError::Format`] unless digits with optional `+`, spaces, dots, dashes, parentheses.
pub fn phone(raw: Option<&str>) -> Result<Option<String>, ValidationError> {
    let Some(value) = optional_text("phone", raw, 20)? else {
        return Ok(None);
    };
    if !PHONE_RE.is_match(&value) {
        return Err(ValidationError::Format { field: "phone" });
    }
    Ok(Some(value))
}

/// # Errors
///
/// Returns [`ValidationError`] when the password is outside the length bounds.
pub fn password(raw: &str) -> Result<(), ValidationError> {
    let len = raw.chars().count();
    if len < PASSWORD_MIN_LEN {
        return Err(ValidationError::TooShort { field: "password", min: PASSWORD_MIN_LEN });
    }
    if len > PASSWORD_MAX_LEN {
        return Err(ValidationError::TooLong { field: "password", max: PASSWORD_MAX_LEN });
    }
    Ok(())
}

/// A positive amount that fits the amount columns.
///
/// # Errors
///
/// Returns [`ValidationError`] if the value is zero, negative, too large or too precise.
pub fn amount_value(value: Decimal) -> Result<Decimal, ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositive);
    }
    if value > AMOUNT_MAX {
        return Err(ValidationError::TooLarge);
    }
    if value.normalize().scale() > AMOUNT_SCALE {
        return Err(ValidationError::Precision);
    }
    Ok(value)
}

/// Bound-check an amount from a JSON body.
///
/// # Errors
///
/// Returns [`ValidationError`] for unparsable or out-of-range input.
pub fn amount(input: &AmountInput) -> Result<Decimal, ValidationError> {
    amount_value(input.to_decimal()?)
}

/// Status labels are short free text; blank means `completed`.
///
/// # Errors
///
/// Returns [`ValidationError::TooLong`] past 20 characters.
pub fn status(raw: Option<&str>) -> Result<String, ValidationError> {
    Ok(optional_text("status", raw, 20)?.map_or_else(|| "completed".to_owned(), |s| s.to_ascii_lowercase()))
}

#[cfg(test)]
#[path = "validation_test.rs"]
mod tests;
