//! Statement validation: the first line of defense for untrusted SQL.
//!
//! Pure functions over the input string, no I/O and no shared state, safe to
//! call concurrently without synchronization. Anything that is not a single
//! read-only query is rejected before it can touch the engine.

mod rules;
mod shape;

pub use rules::{scan, SecurityViolation, Severity, ViolationKind};
pub use shape::ParsedQueryShape;

use keel_error::{ErrorCode, KeelError};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// The outcome of validating one raw SQL string. Produced once per input,
/// never persisted.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Canonical rendering of the accepted statement; `None` on rejection
    pub normalized_sql: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub violations: Vec<SecurityViolation>,
    pub parsed: Option<ParsedQueryShape>,
}

impl ValidationResult {
    fn rejected(errors: Vec<String>, warnings: Vec<String>, violations: Vec<SecurityViolation>) -> Self {
        Self {
            is_valid: false,
            normalized_sql: None,
            errors,
            warnings,
            violations,
            parsed: None,
        }
    }
}

/// Validate one raw SQL string.
///
/// Comments are stripped before inspection; the dangerous-pattern rules run
/// against the stripped text regardless of statement kind; only a single
/// read-only query (optionally introduced by a CTE prefix) is accepted.
pub fn validate(sql: &str) -> ValidationResult {
    if sql.trim().is_empty() {
        return ValidationResult::rejected(
            vec!["Empty or whitespace-only statement".to_string()],
            Vec::new(),
            Vec::new(),
        );
    }

    let (stripped, mut warnings) = strip_comments(sql);

    let mut violations = rules::scan(&stripped);
    if let Some(position) = find_statement_terminator(&stripped) {
        violations.push(SecurityViolation {
            kind: ViolationKind::StackedStatements,
            description: "Multiple statements in one request".to_string(),
            severity: Severity::Error,
            position: Some(position),
        });
    }

    let mut errors = Vec::new();
    let mut normalized_sql = None;
    let mut parsed = None;

    match Parser::parse_sql(&GenericDialect {}, &stripped) {
        Err(e) => errors.push(format!("SQL parse error: {}", e)),
        Ok(statements) => match statements.as_slice() {
            [] => errors.push("No executable statement found".to_string()),
            [Statement::Query(query)] => {
                let statement = Statement::Query(query.clone());
                parsed = Some(shape::extract(&statement, query));
                normalized_sql = Some(statement.to_string());
            }
            [other] => violations.push(SecurityViolation {
                kind: ViolationKind::DisallowedStatement,
                description: format!(
                    "Only read-only queries are permitted, found {}",
                    statement_kind_name(other)
                ),
                severity: Severity::Error,
                position: Some(0),
            }),
            _ => {
                // The lexical scan normally catches stacking first
                if !violations
                    .iter()
                    .any(|v| v.kind == ViolationKind::StackedStatements)
                {
                    violations.push(SecurityViolation {
                        kind: ViolationKind::StackedStatements,
                        description: "Multiple statements in one request".to_string(),
                        severity: Severity::Error,
                        position: None,
                    });
                }
            }
        },
    }

    for violation in &violations {
        if violation.severity == Severity::Warning {
            warnings.push(violation.description.clone());
        }
    }

    let is_valid = errors.is_empty()
        && !violations
            .iter()
            .any(|v| v.severity == Severity::Error);

    ValidationResult {
        normalized_sql: if is_valid { normalized_sql } else { None },
        parsed: if is_valid { parsed } else { None },
        is_valid,
        errors,
        warnings,
        violations,
    }
}

/// Typed-error adapter over [`validate`] for callers composing with `?`.
/// Returns the normalized SQL on success.
pub fn try_validate(sql: &str) -> keel_error::Result<String> {
    let report = validate(sql);
    if report.is_valid {
        if let Some(normalized) = report.normalized_sql {
            return Ok(normalized);
        }
    }
    Err(rejection_error(&report))
}

/// Convert a failed report into the structured error a caller receives.
pub fn rejection_error(report: &ValidationResult) -> KeelError {
    if let Some(violation) = report
        .violations
        .iter()
        .find(|v| v.severity == Severity::Error)
    {
        let code = match violation.kind {
            ViolationKind::DisallowedStatement => ErrorCode::DisallowedStatement,
            ViolationKind::StackedStatements => ErrorCode::StackedStatements,
            _ => ErrorCode::DangerousPattern,
        };
        let mut err = KeelError::new(code, violation.description.clone())
            .with_suggestion("Rewrite the request as a single read-only SELECT statement");
        if let Some(position) = violation.position {
            err = err.at_position(position);
        }
        return err;
    }

    if let Some(message) = report.errors.first() {
        let code = if message.contains("Empty or whitespace-only") {
            ErrorCode::EmptyStatement
        } else {
            ErrorCode::SyntaxError
        };
        return KeelError::new(code, message.clone())
            .with_suggestion("Check the SQL syntax near the reported location");
    }

    KeelError::new(ErrorCode::Unknown, "Validation failed")
}

/// Strip `--`, `#` and `/* */` comments, string-literal aware. Block
/// comments nest (DuckDB semantics). Each comment is replaced by a single
/// space so token boundaries survive. Returns the stripped text plus any
/// warnings raised while scanning.
fn strip_comments(sql: &str) -> (String, Vec<String>) {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut warnings = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b'\'' | b'"' => {
                let quote = c;
                let start = i;
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        // Doubled quote is an escaped quote, keep scanning
                        if i + 1 < bytes.len() && bytes[i + 1] == quote {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                out.push_str(&sql[start..i]);
            }
            b'-' if i + 1 < bytes.len() && bytes[i + 1] == b'-' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                out.push(' ');
            }
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                out.push(' ');
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                let mut depth = 1;
                i += 2;
                while i < bytes.len() && depth > 0 {
                    if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'*' {
                        depth += 1;
                        i += 2;
                    } else if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                        depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                if depth > 0 {
                    warnings.push("Unterminated block comment".to_string());
                }
                out.push(' ');
            }
            _ => {
                // Multi-byte UTF-8 sequences pass through untouched
                let ch_len = utf8_len(c);
                out.push_str(&sql[i..i + ch_len]);
                i += ch_len;
            }
        }
    }

    (out, warnings)
}

fn utf8_len(first_byte: u8) -> usize {
    match first_byte {
        b if b < 0x80 => 1,
        b if b >= 0xF0 => 4,
        b if b >= 0xE0 => 3,
        _ => 2,
    }
}

/// Find a statement terminator followed by more content (string-aware).
/// A single trailing `;` is tolerated.
fn find_statement_terminator(stripped: &str) -> Option<usize> {
    let bytes = stripped.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"') => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == quote {
                        if i + 1 < bytes.len() && bytes[i + 1] == quote {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            b';' => {
                if stripped[i + 1..].trim().is_empty() {
                    return None;
                }
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn statement_kind_name(statement: &Statement) -> &'static str {
    match statement {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::CreateView { .. } => "CREATE VIEW",
        Statement::CreateIndex { .. } => "CREATE INDEX",
        Statement::CreateSchema { .. } => "CREATE SCHEMA",
        Statement::AlterTable { .. } => "ALTER TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        Statement::Copy { .. } => "COPY",
        Statement::Call { .. } => "CALL",
        Statement::StartTransaction { .. } => "START TRANSACTION",
        Statement::Commit { .. } => "COMMIT",
        Statement::Rollback { .. } => "ROLLBACK",
        Statement::SetVariable { .. } => "SET",
        Statement::Pragma { .. } => "PRAGMA",
        Statement::Install { .. } => "INSTALL",
        Statement::Load { .. } => "LOAD",
        Statement::Explain { .. } => "EXPLAIN",
        Statement::AttachDatabase { .. } => "ATTACH",
        Statement::Grant { .. } => "GRANT",
        Statement::Revoke { .. } => "REVOKE",
        Statement::Merge { .. } => "MERGE",
        Statement::Analyze { .. } => "ANALYZE",
        _ => "a non-query statement",
    }
}
