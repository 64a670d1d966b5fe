//! # keel-error
//!
//! Unified error types for the Keel SQL execution pipeline.
//!
//! All errors are designed to cross a serialization boundary intact:
//! - Numeric error codes (KEEL-XXXX)
//! - A stable SQL error classification (`sql_error_type`)
//! - Actionable suggestions the caller can surface verbatim

mod code;

pub use code::{ErrorCode, SqlErrorType};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all pipeline operations.
///
/// Serializes to the structured shape transport layers hand to clients:
/// `{error_code, detail, sql_error_type, position?, suggestions}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeelError {
    /// Numeric error code (e.g., "KEEL-2001")
    #[serde(rename = "error_code")]
    pub code: ErrorCode,

    /// Human-readable error message
    #[serde(rename = "detail")]
    pub message: String,

    /// Classification for status mapping and telemetry
    pub sql_error_type: SqlErrorType,

    /// Byte offset into the offending SQL, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,

    /// Actionable suggestions for correcting the request
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub suggestions: Vec<String>,
}

impl KeelError {
    /// Create a new error with code and message. The classification is
    /// derived from the code's range.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            sql_error_type: code.sql_error_type(),
            position: None,
            suggestions: Vec::new(),
        }
    }

    /// Attach the byte offset where the problem was detected
    pub fn at_position(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }

    /// Add an actionable suggestion
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// HTTP status a transport layer should respond with
    pub fn http_status(&self) -> u16 {
        self.sql_error_type.http_status()
    }

    /// True when the failure was a deadline expiry
    pub fn is_timeout(&self) -> bool {
        self.sql_error_type == SqlErrorType::Timeout
    }

    /// Serialize to JSON for API responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize KeelError: {}", e);
            format!(
                r#"{{"error_code":"{}","detail":"Serialization failed"}}"#,
                self.code
            )
        })
    }
}

impl fmt::Display for KeelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(first) = self.suggestions.first() {
            write!(f, " (Suggestion: {})", first)?;
        }
        Ok(())
    }
}

impl std::error::Error for KeelError {}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, KeelError>;
