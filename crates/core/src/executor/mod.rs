//! Deadline-aware, row-capped execution against embedded DuckDB.
//!
//! The engine call is the one blocking operation in the pipeline. It runs on
//! the blocking thread pool, raced against the caller's deadline; DuckDB has
//! no cooperative cancellation hook we rely on, so a call that outlives its
//! deadline is classified as a timeout and **abandoned** (it finishes in the
//! background on its private connection clone), never silently retried.

mod convert;
mod value;

use std::time::{Duration, Instant};

use keel_error::{ErrorCode, KeelError, Result};
use parking_lot::Mutex;
use sqlparser::ast::{Expr, Statement, Value as AstValue};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::models::ExecutionResult;

/// Executes validated SQL against one DuckDB database.
///
/// The root connection is only ever locked long enough to clone a private
/// per-call connection, so statements never interleave on a single
/// connection and an abandoned call cannot block later queries.
pub struct Executor {
    conn: Mutex<duckdb::Connection>,
}

impl Executor {
    pub fn open_in_memory() -> Result<Self> {
        duckdb::Connection::open_in_memory()
            .map(Self::from_connection)
            .map_err(open_error)
    }

    pub fn open(path: &str) -> Result<Self> {
        duckdb::Connection::open(path)
            .map(Self::from_connection)
            .map_err(open_error)
    }

    pub fn from_connection(conn: duckdb::Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Run one statement under a deadline and a row cap.
    ///
    /// The statement is asked for `row_limit + 1` rows so truncation is
    /// detected without a second COUNT query; the surplus row is trimmed and
    /// reported via `truncated`. Fails with a syntax/execution
    /// classification from the engine or a structural `timeout` from the
    /// deadline race.
    pub async fn execute(
        &self,
        sql: &str,
        timeout: Duration,
        row_limit: usize,
    ) -> Result<ExecutionResult> {
        let started = Instant::now();
        let capped_sql = apply_row_limit(sql, row_limit)?;
        debug!(target: "executor", sql = %capped_sql, row_limit, "executing statement");

        let conn = self
            .conn
            .lock()
            .try_clone()
            .map_err(|e| KeelError::new(ErrorCode::Internal, format!("Connection clone failed: {}", e)))?;

        let task = tokio::task::spawn_blocking(move || run_query(&conn, &capped_sql, row_limit));

        match tokio::time::timeout(timeout, task).await {
            Err(_) => Err(KeelError::new(
                ErrorCode::QueryTimeout,
                format!("Query timed out after {:.1}s", timeout.as_secs_f64()),
            )
            .with_suggestion("Simplify the query or raise the timeout")),
            Ok(Err(join_err)) => Err(KeelError::new(
                ErrorCode::Internal,
                format!("Execution task failed: {}", join_err),
            )),
            Ok(Ok(Err(e))) => Err(e),
            Ok(Ok(Ok((columns, rows, truncated)))) => {
                let runtime_ms = started.elapsed().as_secs_f64() * 1000.0;
                Ok(ExecutionResult {
                    row_count: rows.len(),
                    columns,
                    rows,
                    runtime_ms,
                    truncated,
                })
            }
        }
    }
}

fn open_error(e: duckdb::Error) -> KeelError {
    KeelError::new(ErrorCode::Internal, format!("Failed to open database: {}", e))
}

type QueryOutput = (Vec<String>, Vec<Vec<serde_json::Value>>, bool);

fn run_query(conn: &duckdb::Connection, sql: &str, row_limit: usize) -> Result<QueryOutput> {
    let mut stmt = conn.prepare(sql).map_err(convert::classify)?;
    let mut rows = stmt.query([]).map_err(convert::classify)?;

    let columns: Vec<String> = rows
        .as_ref()
        .map(|s| s.column_names().into_iter().map(Into::into).collect())
        .unwrap_or_default();
    let width = columns.len();

    let mut out: Vec<Vec<serde_json::Value>> = Vec::new();
    while let Some(row) = rows.next().map_err(convert::classify)? {
        let mut cells = Vec::with_capacity(width);
        for idx in 0..width {
            let cell = row.get_ref(idx).map_err(convert::classify)?;
            cells.push(value::to_json(cell));
        }
        out.push(cells);
        if out.len() > row_limit {
            break;
        }
    }

    let truncated = out.len() > row_limit;
    if truncated {
        out.truncate(row_limit);
    }

    Ok((columns, out, truncated))
}

/// Apply the row-limiting policy at the AST level: no outer LIMIT means
/// append `row_limit + 1`; an existing numeric LIMIT keeps the smaller of
/// itself and `row_limit + 1`. A non-literal LIMIT expression is replaced by
/// the cap.
fn apply_row_limit(sql: &str, row_limit: usize) -> Result<String> {
    let mut statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|e| KeelError::new(ErrorCode::SyntaxError, format!("SQL parse error: {}", e)))?;

    if statements.len() != 1 {
        return Err(KeelError::new(
            ErrorCode::Internal,
            "Executor expects exactly one statement",
        ));
    }

    match statements.remove(0) {
        Statement::Query(mut query) => {
            let fetch = row_limit as u64 + 1;
            let new_limit = match query.limit.take() {
                Some(Expr::Value(AstValue::Number(n, long))) => {
                    let existing: u64 = n.parse().unwrap_or(fetch);
                    Expr::Value(AstValue::Number(existing.min(fetch).to_string(), long))
                }
                _ => Expr::Value(AstValue::Number(fetch.to_string(), false)),
            };
            query.limit = Some(new_limit);
            Ok(Statement::Query(query).to_string())
        }
        _ => Err(KeelError::new(
            ErrorCode::DisallowedStatement,
            "Executor only accepts read-only queries",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_error::SqlErrorType;
    use serde_json::json;

    #[test]
    fn test_limit_appended_when_absent() {
        let sql = apply_row_limit("SELECT * FROM t", 100).unwrap();
        assert!(sql.ends_with("LIMIT 101"), "{}", sql);
    }

    #[test]
    fn test_smaller_existing_limit_kept() {
        let sql = apply_row_limit("SELECT * FROM t LIMIT 10", 100).unwrap();
        assert!(sql.ends_with("LIMIT 10"), "{}", sql);
    }

    #[test]
    fn test_larger_existing_limit_capped() {
        let sql = apply_row_limit("SELECT * FROM t LIMIT 5000", 100).unwrap();
        assert!(sql.ends_with("LIMIT 101"), "{}", sql);
    }

    #[tokio::test]
    async fn test_select_one_scenario() {
        let executor = Executor::open_in_memory().unwrap();
        let result = executor
            .execute("SELECT 1 AS n", Duration::from_secs(5), 100)
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["n"]);
        assert_eq!(result.rows, vec![vec![json!(1)]]);
        assert_eq!(result.row_count, 1);
        assert!(!result.truncated);
        assert!(result.runtime_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_rectangular_output() {
        let executor = Executor::open_in_memory().unwrap();
        let result = executor
            .execute(
                "SELECT 1 AS a, 'x' AS b, NULL AS c UNION ALL SELECT 2, 'y', NULL",
                Duration::from_secs(5),
                100,
            )
            .await
            .unwrap();

        assert_eq!(result.columns.len(), 3);
        for row in &result.rows {
            assert_eq!(row.len(), result.columns.len());
        }
    }

    #[tokio::test]
    async fn test_truncation_law() {
        let executor = Executor::open_in_memory().unwrap();
        let result = executor
            .execute("SELECT * FROM range(10000)", Duration::from_secs(10), 5000)
            .await
            .unwrap();

        assert_eq!(result.row_count, 5000);
        assert_eq!(result.rows.len(), 5000);
        assert!(result.truncated);

        let exact = executor
            .execute("SELECT * FROM range(10)", Duration::from_secs(10), 5000)
            .await
            .unwrap();
        assert_eq!(exact.row_count, 10);
        assert!(!exact.truncated);
    }

    #[tokio::test]
    async fn test_missing_table_is_execution_error() {
        let executor = Executor::open_in_memory().unwrap();
        let err = executor
            .execute("SELECT * FROM missing_table", Duration::from_secs(5), 100)
            .await
            .unwrap_err();

        assert_eq!(err.sql_error_type, SqlErrorType::Execution);
        assert!(err.message.contains("missing_table"));
    }

    #[tokio::test]
    async fn test_timeout_classified_structurally() {
        let executor = Executor::open_in_memory().unwrap();
        // A cross-join aggregation large enough to outlive a 50ms deadline
        let err = executor
            .execute(
                "SELECT sum(a.range * b.range) FROM range(100000) a, range(20000) b",
                Duration::from_millis(50),
                100,
            )
            .await
            .unwrap_err();

        assert_eq!(err.sql_error_type, SqlErrorType::Timeout);
        assert_eq!(err.code, ErrorCode::QueryTimeout);
    }

    #[tokio::test]
    async fn test_temporal_values_are_iso8601() {
        let executor = Executor::open_in_memory().unwrap();
        let result = executor
            .execute(
                "SELECT DATE '2024-06-30' AS d, TIMESTAMP '2024-06-30 12:00:00' AS ts",
                Duration::from_secs(5),
                10,
            )
            .await
            .unwrap();

        assert_eq!(result.rows[0][0], json!("2024-06-30"));
        assert_eq!(result.rows[0][1], json!("2024-06-30T12:00:00.000000"));
    }
}
