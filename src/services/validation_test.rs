use super::*;
use crate::frame::ErrorCode;
use rust_decimal_macros::dec;

#[test]
fn required_text_trims_and_bounds() {
    assert_eq!(required_text("first_name", "  Jean ", 10).unwrap(), "Jean");
    assert_eq!(required_text("first_name", "   ", 10), Err(ValidationError::Required { field: "first_name" }));
    assert_eq!(
        required_text("first_name", "abcdefghijk", 10),
        Err(ValidationError::TooLong { field: "first_name", max: 10 })
    );
}

#[test]
fn length_counts_characters_not_bytes() {
    assert!(required_text("last_name", "Éloïse", 6).is_ok());
}

#[test]
fn optional_text_blank_is_none() {
    assert_eq!(optional_text("notes", None, 5).unwrap(), None);
    assert_eq!(optional_text("notes", Some("  "), 5).unwrap(), None);
    assert_eq!(optional_text("notes", Some(" ok "), 5).unwrap(), Some("ok".to_owned()));
    assert!(optional_text("notes", Some("too long"), 5).is_err());
}

#[test]
fn username_rules() {
    assert_eq!(username("Jean.Dupont").unwrap(), "jean.dupont");
    assert_eq!(username("ab"), Err(ValidationError::Format { field: "username" }));
    assert_eq!(username("_leading"), Err(ValidationError::Format { field: "username" }));
    assert_eq!(username("has space"), Err(ValidationError::Format { field: "username" }));
}

#[test]
fn email_rules() {
    assert_eq!(email(Some("Jean@Example.com")).unwrap(), Some("jean@example.com".to_owned()));
    assert_eq!(email(Some("")).unwrap(), None);
    assert_eq!(email(Some("not-an-email")), Err(ValidationError::Format { field: "email" }));
    assert_eq!(email(Some("a@b")), Err(ValidationError::Format { field: "email" }));
}

#[test]
fn phone_rules() {
    assert_eq!(phone(Some("+33 6 12 34 56 78")).unwrap(), Some("+33 6 12 34 56 78".to_owned()));
    assert_eq!(phone(Some("(514) 555-0199")), Err(ValidationError::Format { field: "phone" }));
    assert_eq!(phone(Some("514-555-0199")).unwrap(), Some("514-555-0199".to_owned()));
    assert_eq!(phone(Some("12")), Err(ValidationError::Format { field: "phone" }));
    assert_eq!(phone(None).unwrap(), None);
}

#[test]
fn password_bounds() {
    assert!(password("correct horse").is_ok());
    assert_eq!(password("short"), Err(ValidationError::TooShort { field: "password", min: 8 }));
    assert!(matches!(password(&"x".repeat(129)), Err(ValidationError::TooLong { .. })));
}

#[test]
fn amount_bounds() {
    assert_eq!(amount_value(dec!(150.5)).unwrap(), dec!(150.5));
    assert_eq!(amount_value(dec!(0)), Err(ValidationError::NonPositive));
    assert_eq!(amount_value(dec!(-3)), Err(ValidationError::NonPositive));
    assert_eq!(amount_value(dec!(1.234)), Err(ValidationError::Precision));
    assert_eq!(amount_value(dec!(1.230)).unwrap(), dec!(1.23));
    assert_eq!(amount_value(AMOUNT_MAX).unwrap(), dec!(999999999999.99));
    assert_eq!(amount_value(dec!(1000000000000)), Err(ValidationError::TooLarge));
}

#[test]
fn amount_text_parses_then_checks() {
    assert_eq!(amount(&AmountInput::Text("1.234,50".into())).unwrap(), dec!(1234.50));
    let err = amount(&AmountInput::Text("abc".into())).unwrap_err();
    assert_eq!(err.error_code(), "E_AMOUNT_INVALID");
    assert_eq!(amount(&AmountInput::Text("0,00".into())), Err(ValidationError::NonPositive));
}

#[test]
fn amount_input_accepts_numbers_and_text() {
    let number: AmountInput = serde_json::from_str("150.5").unwrap();
    assert_eq!(amount(&number).unwrap(), dec!(150.5));
    let text: AmountInput = serde_json::from_str("\"1 000,25\"").unwrap();
    assert_eq!(amount(&text).unwrap(), dec!(1000.25));
    let negative: AmountInput = serde_json::from_str("-4").unwrap();
    assert_eq!(amount(&negative), Err(ValidationError::NonPositive));
}

#[test]
fn status_defaults_to_completed() {
    assert_eq!(status(None).unwrap(), "completed");
    assert_eq!(status(Some(" Pending ")).unwrap(), "pending");
    assert!(status(Some(&"x".repeat(21))).is_err());
}
