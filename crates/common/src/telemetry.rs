//! Tracing subscriber wiring for the pipeline.
//!
//! Stdout gets a standard fmt layer filtered by `RUST_LOG`. When a query log
//! directory is configured, per-execution records emitted on the `queries`
//! target are additionally appended as daily-rolled JSONL files, keeping the
//! human-readable stream and the audit stream separate.

use anyhow::Result;

use crate::config::LogSettings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_tracing(settings: &LogSettings) -> Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());

    let registry = tracing_subscriber::registry().with(stdout_layer);

    if let Some(dir) = &settings.queries_log_dir {
        std::fs::create_dir_all(dir)?;
        let queries_appender = tracing_appender::rolling::daily(dir, "queries.jsonl");
        let queries_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(queries_appender)
            .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
                metadata.target() == "queries"
            }));

        registry.with(queries_layer).try_init().ok();
    } else {
        registry.try_init().ok();
    }

    Ok(())
}
