//! Observability infrastructure.
//!
//! Provides:
//! - Structured logging via `tracing`

pub mod tracing;
