//! Pipeline orchestration.
//!
//! `QueryPipeline` is the single entry point callers use:
//!
//! 1. Cache lookup keyed on the raw request (may short-circuit everything)
//! 2. Validation — rejected SQL never touches the engine
//! 3. Admission — excess load rejected immediately
//! 4. Execution under deadline and row cap
//! 5. Outcome recorded in the monitor; successes cached, failures never
//!
//! All collaborators are injected at construction and shared by handle;
//! there is no global mutable state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use keel_common::config::{AppConfig, QueryLimits};
use keel_error::{KeelError, Result};
use tracing::info;

use crate::admission::ConcurrencyAdmission;
use crate::cache::{normalize_question, ResponseCaches};
use crate::executor::Executor;
use crate::models::{PipelineResponse, QueryRequest};
use crate::monitor::{PerformanceMonitor, QueryEvent};
use crate::validator;

pub struct PipelineOptions {
    pub executor: Executor,
    pub caches: Arc<ResponseCaches>,
    pub monitor: Arc<PerformanceMonitor>,
    pub limits: QueryLimits,
}

pub struct QueryPipeline {
    executor: Executor,
    admission: ConcurrencyAdmission,
    caches: Arc<ResponseCaches>,
    monitor: Arc<PerformanceMonitor>,
    limits: QueryLimits,
}

impl QueryPipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Self {
            executor: options.executor,
            admission: ConcurrencyAdmission::new(options.limits.max_concurrent_queries),
            caches: options.caches,
            monitor: options.monitor,
            limits: options.limits,
        }
    }

    /// Build a pipeline from configuration: file-backed database when
    /// `database_path` is set, in-memory otherwise.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let executor = match &config.database_path {
            Some(path) => Executor::open(path)?,
            None => Executor::open_in_memory()?,
        };
        Ok(Self::new(PipelineOptions {
            executor,
            caches: Arc::new(ResponseCaches::new(config.cache)),
            monitor: Arc::new(PerformanceMonitor::new(config.monitor)),
            limits: config.limits,
        }))
    }

    /// Run one request through the full pipeline.
    pub async fn run(&self, request: QueryRequest) -> Result<PipelineResponse> {
        // Keyed on the pre-validation request identity
        let cache_key = request.sql.trim().to_string();
        if let Some(result) = self.caches.query_results.get(&cache_key) {
            info!(target: "queries", sql = %cache_key, cache_hit = true, "served from cache");
            return Ok(PipelineResponse {
                result,
                cache_hit: true,
            });
        }

        let timeout = Duration::from_secs(
            request
                .timeout_seconds
                .unwrap_or(self.limits.query_timeout_seconds),
        );
        let row_limit = request.row_limit.unwrap_or(self.limits.max_result_rows);

        let report = validator::validate(&request.sql);
        let normalized = match (report.is_valid, report.normalized_sql.clone()) {
            (true, Some(normalized)) => normalized,
            _ => {
                let err = validator::rejection_error(&report);
                self.record_failure(&request.sql, 0.0, &err);
                return Err(err);
            }
        };

        let ticket = match self.admission.admit() {
            Ok(ticket) => ticket,
            Err(err) => {
                self.record_failure(&request.sql, 0.0, &err);
                return Err(err);
            }
        };

        let started = Instant::now();
        let outcome = self.executor.execute(&normalized, timeout, row_limit).await;
        drop(ticket);

        match outcome {
            Ok(result) => {
                self.monitor.record(QueryEvent {
                    sql: normalized,
                    runtime_ms: result.runtime_ms,
                    success: true,
                    error_message: None,
                    row_count: Some(result.row_count),
                    truncated: result.truncated,
                    timed_out: false,
                });
                self.caches.query_results.put(cache_key, result.clone());
                Ok(PipelineResponse {
                    result,
                    cache_hit: false,
                })
            }
            Err(err) => {
                let runtime_ms = started.elapsed().as_secs_f64() * 1000.0;
                self.record_failure(&normalized, runtime_ms, &err);
                Err(err)
            }
        }
    }

    /// Pass-through cache for assembled conversational responses, keyed by
    /// the normalized question.
    pub fn cached_response(&self, question: &str) -> Option<String> {
        self.caches.responses.get(&normalize_question(question))
    }

    pub fn store_response(&self, question: &str, response: String) {
        self.caches.responses.put(normalize_question(question), response);
    }

    /// Pass-through cache for the external language-model collaborator's
    /// completions; this pipeline never calls the model itself.
    pub fn cached_completion(&self, prompt: &str) -> Option<String> {
        self.caches.completions.get(prompt)
    }

    pub fn store_completion(&self, prompt: &str, completion: String) {
        self.caches.completions.put(prompt, completion);
    }

    pub fn active_queries(&self) -> usize {
        self.admission.active_count()
    }

    pub fn caches(&self) -> &ResponseCaches {
        &self.caches
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    fn record_failure(&self, sql: &str, runtime_ms: f64, err: &KeelError) {
        self.monitor.record(QueryEvent {
            sql: sql.to_string(),
            runtime_ms,
            success: false,
            error_message: Some(err.message.clone()),
            row_count: None,
            truncated: false,
            timed_out: err.is_timeout(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_common::config::CacheSettings;
    use keel_common::config::MonitorSettings;

    fn pipeline() -> QueryPipeline {
        QueryPipeline::new(PipelineOptions {
            executor: Executor::open_in_memory().unwrap(),
            caches: Arc::new(ResponseCaches::new(CacheSettings::default())),
            monitor: Arc::new(PerformanceMonitor::new(MonitorSettings::default())),
            limits: QueryLimits::default(),
        })
    }

    #[tokio::test]
    async fn test_success_is_recorded_and_cached() {
        let pipeline = pipeline();
        let response = pipeline.run(QueryRequest::new("SELECT 1 AS n")).await.unwrap();
        assert!(!response.cache_hit);
        assert_eq!(response.result.row_count, 1);

        let stats = pipeline.monitor().stats();
        assert_eq!(stats.aggregate.successful_queries, 1);
        assert_eq!(pipeline.caches().query_results.stats().entries, 1);
    }

    #[tokio::test]
    async fn test_second_run_hits_cache() {
        let pipeline = pipeline();
        pipeline.run(QueryRequest::new("SELECT 1 AS n")).await.unwrap();
        let second = pipeline.run(QueryRequest::new("SELECT 1 AS n")).await.unwrap();
        assert!(second.cache_hit);

        // The engine ran once: only one execution recorded
        assert_eq!(pipeline.monitor().stats().aggregate.total_queries, 1);
    }

    #[tokio::test]
    async fn test_rejection_recorded_never_cached() {
        let pipeline = pipeline();
        let err = pipeline
            .run(QueryRequest::new("DROP TABLE users"))
            .await
            .unwrap_err();
        assert_eq!(err.sql_error_type, keel_error::SqlErrorType::Security);

        let stats = pipeline.monitor().stats();
        assert_eq!(stats.aggregate.failed_queries, 1);
        assert_eq!(pipeline.caches().query_results.stats().entries, 0);
    }

    #[tokio::test]
    async fn test_response_cache_normalizes_questions() {
        let pipeline = pipeline();
        pipeline.store_response("What were sales last month?", "42".to_string());
        assert_eq!(
            pipeline.cached_response("  what were sales LAST month?! "),
            Some("42".to_string())
        );
    }
}
