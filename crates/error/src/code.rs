use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following KEEL-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Syntax errors (malformed SQL, caught before or by the engine)
/// - **2000-2999**: Security rejections (untrusted input attempting disallowed operations)
/// - **3000-3999**: Execution errors (valid-looking SQL the engine cannot run)
/// - **4000-4999**: Resource errors (deadlines and admission limits)
/// - **5000-5999**: Internal/System errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Syntax Errors (1000-1999) ===
    /// KEEL-1001: SQL failed to parse
    SyntaxError = 1001,
    /// KEEL-1002: Empty or whitespace-only statement
    EmptyStatement = 1002,

    // === Security Rejections (2000-2999) ===
    /// KEEL-2001: Statement kind is not a read-only query
    DisallowedStatement = 2001,
    /// KEEL-2002: Multiple statements stacked behind one request
    StackedStatements = 2002,
    /// KEEL-2003: Dangerous function or construct detected
    DangerousPattern = 2003,

    // === Execution Errors (3000-3999) ===
    /// KEEL-3001: Table not found in the catalog
    TableNotFound = 3001,
    /// KEEL-3002: Column not found or unresolvable reference
    ColumnNotFound = 3002,
    /// KEEL-3003: Type mismatch or invalid conversion
    TypeMismatch = 3003,
    /// KEEL-3004: Engine rejected the query at runtime
    EngineFailure = 3004,

    // === Resource Errors (4000-4999) ===
    /// KEEL-4001: Execution deadline exceeded
    QueryTimeout = 4001,
    /// KEEL-4002: Concurrent query limit reached
    TooManyQueries = 4002,

    // === Internal Errors (5000-5999) ===
    /// KEEL-5001: Unexpected internal state
    Internal = 5001,
    /// KEEL-5002: Configuration could not be loaded or applied
    ConfigError = 5002,

    /// KEEL-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "KEEL-2001")
    pub fn as_str(&self) -> String {
        format!("KEEL-{:04}", self.as_u16())
    }

    /// The SQL error classification this code belongs to.
    pub fn sql_error_type(&self) -> SqlErrorType {
        match self {
            Self::QueryTimeout => SqlErrorType::Timeout,
            Self::TooManyQueries => SqlErrorType::ConcurrencyLimit,
            _ => match self.as_u16() {
                1000..=1999 => SqlErrorType::Syntax,
                2000..=2999 => SqlErrorType::Security,
                3000..=3999 => SqlErrorType::Execution,
                _ => SqlErrorType::Internal,
            },
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        // Parse "KEEL-XXXX" format
        let num: u16 = s
            .strip_prefix("KEEL-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::SyntaxError),
            1002 => Ok(Self::EmptyStatement),
            2001 => Ok(Self::DisallowedStatement),
            2002 => Ok(Self::StackedStatements),
            2003 => Ok(Self::DangerousPattern),
            3001 => Ok(Self::TableNotFound),
            3002 => Ok(Self::ColumnNotFound),
            3003 => Ok(Self::TypeMismatch),
            3004 => Ok(Self::EngineFailure),
            4001 => Ok(Self::QueryTimeout),
            4002 => Ok(Self::TooManyQueries),
            5001 => Ok(Self::Internal),
            5002 => Ok(Self::ConfigError),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level SQL error classification exposed to transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum SqlErrorType {
    Syntax,
    Security,
    Execution,
    Timeout,
    ConcurrencyLimit,
    Internal,
}

impl SqlErrorType {
    /// HTTP status a transport layer should map this classification to.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Syntax | Self::Execution => 400,
            Self::Security => 403,
            Self::Timeout => 504,
            Self::ConcurrencyLimit => 429,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for SqlErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Syntax => "syntax",
            Self::Security => "security",
            Self::Execution => "execution",
            Self::Timeout => "timeout",
            Self::ConcurrencyLimit => "concurrency_limit",
            Self::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_formatting() {
        assert_eq!(ErrorCode::SyntaxError.as_str(), "KEEL-1001");
        assert_eq!(ErrorCode::DisallowedStatement.as_str(), "KEEL-2001");
        assert_eq!(ErrorCode::Unknown.as_str(), "KEEL-9999");
    }

    #[test]
    fn test_error_code_parsing() {
        assert_eq!(
            ErrorCode::try_from("KEEL-3001".to_string()).unwrap(),
            ErrorCode::TableNotFound
        );
        assert_eq!(
            ErrorCode::try_from("KEEL-9999".to_string()).unwrap(),
            ErrorCode::Unknown
        );
    }

    #[test]
    fn test_error_code_parsing_errors() {
        assert!(ErrorCode::try_from("INVALID".to_string()).is_err());
        assert!(ErrorCode::try_from("KEEL-0000".to_string()).is_err());
        assert!(ErrorCode::try_from("KEEL-ABC".to_string()).is_err());
    }

    #[test]
    fn test_sql_error_types() {
        assert_eq!(ErrorCode::SyntaxError.sql_error_type(), SqlErrorType::Syntax);
        assert_eq!(
            ErrorCode::DangerousPattern.sql_error_type(),
            SqlErrorType::Security
        );
        assert_eq!(
            ErrorCode::TableNotFound.sql_error_type(),
            SqlErrorType::Execution
        );
        assert_eq!(ErrorCode::QueryTimeout.sql_error_type(), SqlErrorType::Timeout);
        assert_eq!(
            ErrorCode::TooManyQueries.sql_error_type(),
            SqlErrorType::ConcurrencyLimit
        );
        assert_eq!(ErrorCode::Internal.sql_error_type(), SqlErrorType::Internal);
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(SqlErrorType::Syntax.http_status(), 400);
        assert_eq!(SqlErrorType::Security.http_status(), 403);
        assert_eq!(SqlErrorType::Timeout.http_status(), 504);
        assert_eq!(SqlErrorType::ConcurrencyLimit.http_status(), 429);
        assert_eq!(SqlErrorType::Internal.http_status(), 500);
    }
}
