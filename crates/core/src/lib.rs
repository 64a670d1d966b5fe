//! Keel Core: the safety and performance envelope around untrusted SQL.
//!
//! Takes a free-form SQL string (typically produced by a natural-language
//! translator) and turns it into a bounded, observable, cacheable result set
//! against an embedded DuckDB database.
//!
//! # Architecture
//!
//! ```text
//! SQL text ──► Validator ──► Admission ──► Executor (+ deadline)
//!                 │              │              │
//!              rejection      429-class      ExecutionResult
//!                 │           rejection         │
//!                 └──────────────┴──────► PerformanceMonitor ──► ResponseCaches
//! ```
//!
//! A cache lookup keyed on the raw request may short-circuit the whole
//! pipeline before validation runs. See [`pipeline::QueryPipeline`].

pub mod admission;
pub mod cache;
pub mod executor;
pub mod models;
pub mod monitor;
pub mod pipeline;
pub mod validator;
