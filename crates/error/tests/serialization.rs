use keel_error::{ErrorCode, KeelError, SqlErrorType};
use serde_json::Value;

#[test]
fn test_json_serialization() {
    let error = KeelError::new(ErrorCode::ColumnNotFound, "Column 'revenu' not found")
        .at_position(7)
        .with_suggestion("Check the column names against the table schema");

    let json = error.to_json();
    let v: Value = serde_json::from_str(&json).expect("valid json");

    assert_eq!(v["error_code"], "KEEL-3002");
    assert_eq!(v["detail"], "Column 'revenu' not found");
    assert_eq!(v["sql_error_type"], "execution");
    assert_eq!(v["position"], 7);
    assert_eq!(
        v["suggestions"][0],
        "Check the column names against the table schema"
    );
}

#[test]
fn test_error_code_parsing() {
    let code: ErrorCode = "KEEL-4002".to_string().try_into().unwrap();
    assert_eq!(code, ErrorCode::TooManyQueries);
}

#[test]
fn test_optional_fields_omitted() {
    let error = KeelError::new(ErrorCode::EngineFailure, "boom");
    let v: Value = serde_json::from_str(&error.to_json()).expect("valid json");

    assert!(v.get("position").is_none());
    assert!(v.get("suggestions").is_none());
}

#[test]
fn test_classification_survives_round_trip() {
    for code in [
        ErrorCode::SyntaxError,
        ErrorCode::DisallowedStatement,
        ErrorCode::QueryTimeout,
        ErrorCode::TooManyQueries,
    ] {
        let error = KeelError::new(code, "x");
        let back: KeelError = serde_json::from_str(&error.to_json()).unwrap();
        assert_eq!(back.code, code);
        assert_eq!(back.sql_error_type, code.sql_error_type());
    }
}

#[test]
fn test_timeout_helpers() {
    let timeout = KeelError::new(ErrorCode::QueryTimeout, "Query timed out after 30.0s");
    assert!(timeout.is_timeout());
    assert_eq!(timeout.http_status(), 504);
    assert_eq!(timeout.sql_error_type, SqlErrorType::Timeout);
}
