//! Money amounts: parsing user input and formatting for display and export.
//!
//! Input accepts either `.` or `,` as the decimal separator and tolerates
//! grouping characters. When both appear, the last one is the decimal
//! separator (`1.234,56` and `1,234.56` are the same amount). A lone comma
//! is always a decimal separator. Output is always `1,234.56`.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;

/// Scale stored by the `NUMERIC(14, 2)` amount columns.
pub const AMOUNT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("invalid amount: {0}")]
    Invalid(String),
}

impl crate::frame::ErrorCode for AmountError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_AMOUNT_EMPTY",
            Self::Invalid(_) => "E_AMOUNT_INVALID",
        }
    }
}

/// Parse a user-entered amount.
///
/// # Errors
///
/// Returns [`AmountError`] if the string is blank or is not a number.
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'' && *c != '\u{a0}')
        .collect();
    if compact.is_empty() {
        return Err(AmountError::Empty);
    }

    let normalized = match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (None, Some(_)) if compact.matches(',').count() == 1 => compact.replace(',', "."),
        (None, Some(_)) => compact.replace(',', ""),
        _ => compact.clone(),
    };
    if normalized.matches('.').count() > 1 {
        return Err(AmountError::Invalid(raw.to_owned()));
    }

    normalized
        .parse::<Decimal>()
        .map_err(|_| AmountError::Invalid(raw.to_owned()))
}

/// Amount as submitted in a JSON body: a number, or text in any accepted notation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum AmountInput {
    Text(String),
    Number(Decimal),
}

impl AmountInput {
    /// # Errors
    ///
    /// Returns [`AmountError`] when text input does not parse.
    pub fn to_decimal(&self) -> Result<Decimal, AmountError> {
        match self {
            AmountInput::Text(raw) => parse_amount(raw),
            AmountInput::Number(value) => Ok(*value),
        }
    }
}

impl From<Decimal> for AmountInput {
    fn from(value: Decimal) -> Self {
        AmountInput::Number(value)
    }
}

/// Round to the stored scale (half away from zero).
#[must_use]
pub fn round_amount(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Format with thousands grouping and exactly two decimals: `-1,234.50`.
#[must_use]
pub fn format_amount(value: Decimal) -> String {
    let rounded = round_amount(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if negative { format!("-{grouped}.{frac_part}") } else { format!("{grouped}.{frac_part}") }
}

#[cfg(test)]
#[path = "amount_test.rs"]
mod tests;
