//! Execution telemetry: bounded history rings plus running aggregates.
//!
//! Every attempt, success or failure, is recorded in completion order. SQL
//! text is scrubbed and truncated before storage so the rings stay bounded
//! and never retain user secrets.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use keel_common::config::MonitorSettings;
use keel_common::scrubber;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

/// One recorded execution attempt, as reported by the pipeline.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub sql: String,
    pub runtime_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub row_count: Option<usize>,
    pub truncated: bool,
    /// Set by the timeout guard when it, not the engine, aborted the call
    pub timed_out: bool,
}

/// What the rings store: the event, scrubbed and stamped.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub sql: String,
    pub runtime_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub row_count: Option<usize>,
    pub truncated: bool,
    pub timestamp: DateTime<Utc>,
}

/// Upper bounds of the latency histogram buckets, milliseconds. The final
/// bucket is unbounded.
pub const LATENCY_BUCKET_BOUNDS_MS: [f64; 7] =
    [10.0, 50.0, 100.0, 250.0, 500.0, 1_000.0, 5_000.0];

/// Running counters and extrema. Reset only by an explicit operator action.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct AggregateMetrics {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub slow_queries: u64,
    pub timeouts: u64,
    pub min_runtime_ms: f64,
    pub max_runtime_ms: f64,
    pub total_runtime_ms: f64,
    pub avg_runtime_ms: f64,
    /// Counts per [`LATENCY_BUCKET_BOUNDS_MS`] bucket, plus one overflow bucket
    pub latency_buckets: [u64; 8],
}

/// Snapshot returned by [`PerformanceMonitor::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStats {
    pub aggregate: AggregateMetrics,
    pub recent: Vec<ExecutionRecord>,
    pub slow: Vec<ExecutionRecord>,
    pub errors: Vec<ExecutionRecord>,
}

#[derive(Default)]
struct MonitorState {
    aggregate: AggregateMetrics,
    recent: VecDeque<ExecutionRecord>,
    slow: VecDeque<ExecutionRecord>,
    errors: VecDeque<ExecutionRecord>,
}

pub struct PerformanceMonitor {
    settings: MonitorSettings,
    state: Mutex<MonitorState>,
}

impl PerformanceMonitor {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(MonitorState::default()),
        }
    }

    /// Record one completed attempt. Ring insertion order is completion
    /// order; each independently bounded ring evicts its oldest entry.
    ///
    /// Timeout counting prefers the structural `timed_out` flag; matching a
    /// timeout marker in the error message is a documented heuristic
    /// fallback for engine-native timeouts only.
    pub fn record(&self, event: QueryEvent) {
        let timed_out = event.timed_out
            || event
                .error_message
                .as_deref()
                .is_some_and(|m| m.to_lowercase().contains("timed out") || m.to_lowercase().contains("timeout"));
        let slow = event.runtime_ms >= self.settings.slow_query_ms;

        info!(
            target: "queries",
            sql = %event.sql,
            runtime_ms = event.runtime_ms,
            success = event.success,
            rows = event.row_count,
            truncated = event.truncated,
            slow,
            timed_out,
            "query recorded"
        );

        let record = ExecutionRecord {
            sql: self.storable_sql(&event.sql),
            runtime_ms: event.runtime_ms,
            success: event.success,
            error_message: event.error_message.as_deref().map(scrubber::scrub),
            row_count: event.row_count,
            truncated: event.truncated,
            timestamp: Utc::now(),
        };

        let mut state = self.state.lock();
        let agg = &mut state.aggregate;
        agg.total_queries += 1;
        if event.success {
            agg.successful_queries += 1;
        } else {
            agg.failed_queries += 1;
        }
        if slow {
            agg.slow_queries += 1;
        }
        if timed_out {
            agg.timeouts += 1;
        }
        if agg.total_queries == 1 || event.runtime_ms < agg.min_runtime_ms {
            agg.min_runtime_ms = event.runtime_ms;
        }
        if event.runtime_ms > agg.max_runtime_ms {
            agg.max_runtime_ms = event.runtime_ms;
        }
        agg.total_runtime_ms += event.runtime_ms;
        agg.avg_runtime_ms = agg.total_runtime_ms / agg.total_queries as f64;
        let bucket = LATENCY_BUCKET_BOUNDS_MS
            .iter()
            .position(|bound| event.runtime_ms < *bound)
            .unwrap_or(LATENCY_BUCKET_BOUNDS_MS.len());
        agg.latency_buckets[bucket] += 1;

        let capacity = self.settings.history_capacity;
        push_bounded(&mut state.recent, record.clone(), capacity);
        if slow {
            push_bounded(&mut state.slow, record.clone(), capacity);
        }
        if !event.success {
            push_bounded(&mut state.errors, record, capacity);
        }
    }

    pub fn stats(&self) -> MonitorStats {
        let state = self.state.lock();
        MonitorStats {
            aggregate: state.aggregate,
            recent: state.recent.iter().cloned().collect(),
            slow: state.slow.iter().cloned().collect(),
            errors: state.errors.iter().cloned().collect(),
        }
    }

    /// Explicit operator reset; nothing else clears the aggregates.
    pub fn reset(&self) {
        *self.state.lock() = MonitorState::default();
    }

    fn storable_sql(&self, sql: &str) -> String {
        let scrubbed = scrubber::scrub(sql);
        let max = self.settings.max_stored_sql_len;
        if scrubbed.len() > max {
            let mut cut = max;
            while !scrubbed.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}…", &scrubbed[..cut])
        } else {
            scrubbed
        }
    }
}

fn push_bounded(ring: &mut VecDeque<ExecutionRecord>, record: ExecutionRecord, capacity: usize) {
    if ring.len() >= capacity {
        ring.pop_front();
    }
    ring.push_back(record);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(slow_ms: f64, capacity: usize) -> PerformanceMonitor {
        PerformanceMonitor::new(MonitorSettings {
            slow_query_ms: slow_ms,
            history_capacity: capacity,
            max_stored_sql_len: 100,
        })
    }

    fn event(runtime_ms: f64, success: bool) -> QueryEvent {
        QueryEvent {
            sql: "SELECT 1".to_string(),
            runtime_ms,
            success,
            error_message: if success {
                None
            } else {
                Some("Catalog Error".to_string())
            },
            row_count: success.then_some(1),
            truncated: false,
            timed_out: false,
        }
    }

    #[test]
    fn test_aggregate_accounting() {
        let monitor = monitor(500.0, 10);
        monitor.record(event(10.0, true));
        monitor.record(event(30.0, true));
        monitor.record(event(20.0, false));

        let stats = monitor.stats();
        assert_eq!(stats.aggregate.total_queries, 3);
        assert_eq!(stats.aggregate.successful_queries, 2);
        assert_eq!(stats.aggregate.failed_queries, 1);
        assert_eq!(
            stats.aggregate.total_queries,
            stats.aggregate.successful_queries + stats.aggregate.failed_queries
        );
        assert_eq!(stats.aggregate.min_runtime_ms, 10.0);
        assert_eq!(stats.aggregate.max_runtime_ms, 30.0);
        assert!((stats.aggregate.avg_runtime_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_slow_query_classification() {
        let monitor = monitor(100.0, 10);
        monitor.record(event(50.0, true));
        monitor.record(event(150.0, true));

        let stats = monitor.stats();
        assert_eq!(stats.aggregate.slow_queries, 1);
        assert_eq!(stats.slow.len(), 1);
        assert_eq!(stats.slow[0].runtime_ms, 150.0);
    }

    #[test]
    fn test_structural_timeout_flag() {
        let monitor = monitor(500.0, 10);
        let mut timed_out = event(1000.0, false);
        timed_out.error_message = Some("deadline exceeded".to_string());
        timed_out.timed_out = true;
        monitor.record(timed_out);

        assert_eq!(monitor.stats().aggregate.timeouts, 1);
    }

    #[test]
    fn test_heuristic_timeout_fallback() {
        let monitor = monitor(500.0, 10);
        let mut engine_timeout = event(1000.0, false);
        engine_timeout.error_message = Some("Execution timed out".to_string());
        monitor.record(engine_timeout);

        assert_eq!(monitor.stats().aggregate.timeouts, 1);
    }

    #[test]
    fn test_latency_histogram_buckets() {
        let monitor = monitor(500.0, 10);
        monitor.record(event(5.0, true)); // < 10ms
        monitor.record(event(75.0, true)); // < 100ms
        monitor.record(event(9_999.0, true)); // overflow

        let buckets = monitor.stats().aggregate.latency_buckets;
        assert_eq!(buckets[0], 1);
        assert_eq!(buckets[2], 1);
        assert_eq!(buckets[7], 1);
        assert_eq!(buckets.iter().sum::<u64>(), 3);
    }

    #[test]
    fn test_rings_bounded_oldest_first() {
        let monitor = monitor(500.0, 3);
        for i in 0..5 {
            monitor.record(event(i as f64, true));
        }

        let stats = monitor.stats();
        assert_eq!(stats.recent.len(), 3);
        assert_eq!(stats.recent[0].runtime_ms, 2.0);
        assert_eq!(stats.recent[2].runtime_ms, 4.0);
    }

    #[test]
    fn test_failures_ring_and_errors_scrubbed() {
        let monitor = monitor(500.0, 10);
        let mut failed = event(5.0, false);
        failed.error_message = Some("could not parse 'a@b.io'".to_string());
        monitor.record(failed);

        let stats = monitor.stats();
        assert_eq!(stats.errors.len(), 1);
        assert!(stats.errors[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("[EMAIL]"));
    }

    #[test]
    fn test_long_sql_truncated_for_storage() {
        let monitor = monitor(500.0, 10);
        let mut long = event(1.0, true);
        long.sql = format!("SELECT {}", "x, ".repeat(200));
        monitor.record(long);

        let stats = monitor.stats();
        assert!(stats.recent[0].sql.len() <= 104); // 100 bytes + ellipsis
    }

    #[test]
    fn test_reset_clears_everything() {
        let monitor = monitor(500.0, 10);
        monitor.record(event(10.0, true));
        monitor.reset();

        let stats = monitor.stats();
        assert_eq!(stats.aggregate.total_queries, 0);
        assert!(stats.recent.is_empty());
    }

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;
        let monitor = Arc::new(monitor(500.0, 50));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let monitor = monitor.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        monitor.record(event(1.0, true));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(monitor.stats().aggregate.total_queries, 400);
    }
}
