use serde::{Deserialize, Serialize};

/// One statement's worth of tabular output, normalized for serialization.
///
/// Rectangular by construction: every row holds exactly `columns.len()`
/// cells. `row_count` equals `rows.len()`; when `truncated` is set, the
/// engine produced more rows than the caller's cap and the surplus was
/// dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Column names in result order; may repeat if the projection repeats
    pub columns: Vec<String>,
    /// Row-major cell values: null, boolean, number or string
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
    pub runtime_ms: f64,
    pub truncated: bool,
}

/// A single request into the pipeline, with optional per-call overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    pub sql: String,
    /// Per-call deadline override, seconds
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Per-call row cap override
    #[serde(default)]
    pub row_limit: Option<usize>,
}

impl QueryRequest {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            timeout_seconds: None,
            row_limit: None,
        }
    }
}

/// Pipeline output: the result plus whether it was served from cache.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResponse {
    #[serde(flatten)]
    pub result: ExecutionResult,
    pub cache_hit: bool,
}
