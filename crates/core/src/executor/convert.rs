//! Engine error wrapping: raw DuckDB failures become classified, scrubbed
//! pipeline errors. `security` never originates here.

use keel_common::scrubber;
use keel_error::{ErrorCode, KeelError};

pub(crate) fn classify(err: duckdb::Error) -> KeelError {
    classify_message(&err.to_string())
}

fn classify_message(raw: &str) -> KeelError {
    let message = scrubber::scrub(raw);
    let lower = message.to_lowercase();

    if lower.contains("parser error") || lower.contains("syntax error") {
        KeelError::new(ErrorCode::SyntaxError, message)
            .with_suggestion("Check the SQL syntax near the reported token")
    } else if lower.contains("catalog error") && lower.contains("table") {
        KeelError::new(ErrorCode::TableNotFound, message)
            .with_suggestion("Check available tables")
    } else if lower.contains("column") && (lower.contains("binder error") || lower.contains("not found"))
    {
        KeelError::new(ErrorCode::ColumnNotFound, message)
            .with_suggestion("Check the column names against the table schema")
    } else if lower.contains("conversion error")
        || lower.contains("cannot be cast")
        || lower.contains("type mismatch")
    {
        KeelError::new(ErrorCode::TypeMismatch, message)
    } else if lower.contains("timed out") || lower.contains("timeout") {
        // Engine-native timeout, recognized by message marker only
        KeelError::new(ErrorCode::QueryTimeout, message)
    } else {
        KeelError::new(ErrorCode::EngineFailure, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_error::SqlErrorType;

    #[test]
    fn test_missing_table_is_execution() {
        let err = classify_message("Catalog Error: Table with name orders does not exist!");
        assert_eq!(err.code, ErrorCode::TableNotFound);
        assert_eq!(err.sql_error_type, SqlErrorType::Execution);
        assert!(err.message.contains("orders"));
    }

    #[test]
    fn test_missing_column_is_execution() {
        let err =
            classify_message("Binder Error: Referenced column \"regon\" not found in FROM clause!");
        assert_eq!(err.code, ErrorCode::ColumnNotFound);
        assert_eq!(err.sql_error_type, SqlErrorType::Execution);
    }

    #[test]
    fn test_parser_error_is_syntax() {
        let err = classify_message("Parser Error: syntax error at or near \"FORM\"");
        assert_eq!(err.sql_error_type, SqlErrorType::Syntax);
    }

    #[test]
    fn test_engine_timeout_marker_sniffed() {
        let err = classify_message("Execution timed out");
        assert_eq!(err.sql_error_type, SqlErrorType::Timeout);
    }

    #[test]
    fn test_unclassified_is_engine_failure() {
        let err = classify_message("Out of Memory Error: could not allocate block");
        assert_eq!(err.code, ErrorCode::EngineFailure);
        assert_eq!(err.sql_error_type, SqlErrorType::Execution);
    }

    #[test]
    fn test_message_is_scrubbed() {
        let err = classify_message(
            "Conversion Error: could not parse 'bob@corp.io' as INTEGER",
        );
        assert!(!err.message.contains("bob@corp.io"));
        assert!(err.message.contains("[EMAIL]"));
    }
}
