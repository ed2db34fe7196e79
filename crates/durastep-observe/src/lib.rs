//! Observability setup for durastep: structured logging with optional
//! OpenTelemetry span export.

pub mod tracing_setup;
