use super::*;
use rust_decimal_macros::dec;

// =============================================================================
// parse_amount
// =============================================================================

#[test]
fn parse_plain_and_comma_decimals() {
    assert_eq!(parse_amount("150.5").unwrap(), dec!(150.5));
    assert_eq!(parse_amount("150,5").unwrap(), dec!(150.5));
    assert_eq!(parse_amount("  42 ").unwrap(), dec!(42));
}

#[test]
fn parse_grouped_amounts_either_convention() {
    assert_eq!(parse_amount("1,234.56").unwrap(), dec!(1234.56));
    assert_eq!(parse_amount("1.234,56").unwrap(), dec!(1234.56));
    assert_eq!(parse_amount("1 234 567,89").unwrap(), dec!(1234567.89));
    assert_eq!(parse_amount("1,234,567").unwrap(), dec!(1234567));
    assert_eq!(parse_amount("1'000.25").unwrap(), dec!(1000.25));
}

#[test]
fn parse_negative_amount() {
    assert_eq!(parse_amount("-75.10").unwrap(), dec!(-75.10));
}

#[test]
fn parse_rejects_blank_and_garbage() {
    assert_eq!(parse_amount("   "), Err(AmountError::Empty));
    assert!(matches!(parse_amount("abc"), Err(AmountError::Invalid(_))));
    assert!(matches!(parse_amount("1.2.3"), Err(AmountError::Invalid(_))));
    assert!(matches!(parse_amount("12€"), Err(AmountError::Invalid(_))));
}

// =============================================================================
// format_amount
// =============================================================================

#[test]
fn format_groups_thousands_with_two_decimals() {
    assert_eq!(format_amount(dec!(0)), "0.00");
    assert_eq!(format_amount(dec!(150.5)), "150.50");
    assert_eq!(format_amount(dec!(1234.5)), "1,234.50");
    assert_eq!(format_amount(dec!(1234567.891)), "1,234,567.89");
    assert_eq!(format_amount(dec!(100000)), "100,000.00");
}

#[test]
fn format_negative_and_rounding() {
    assert_eq!(format_amount(dec!(-1234.5)), "-1,234.50");
    assert_eq!(format_amount(dec!(2.005)), "2.01");
    assert_eq!(format_amount(dec!(-0.001)), "0.00");
}

#[test]
fn parse_then_format_preserves_value() {
    for raw in ["150.50", "1,234.56", "1.234,56", "0.99", "987654.321", "12,50"] {
        let parsed = parse_amount(raw).unwrap();
        let reparsed = parse_amount(&format_amount(parsed)).unwrap();
        assert_eq!(reparsed, round_amount(parsed), "round trip failed for {raw:?}");
    }
}
