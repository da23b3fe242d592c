//! Observability for the chat service.
//!
//! Prometheus metrics are recorded through the `metrics` facade and rendered
//! by `metrics-exporter-prometheus` at `/metrics`.

pub mod metrics;
