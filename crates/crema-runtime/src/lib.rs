//! `crema-runtime` – the run-forever side of the controller.
//!
//! The control core in `crema-control` runs one cycle at a time.  This crate
//! strings cycles together and does the opportunistic work between them:
//! telemetry, link upkeep and remote commands.
//!
//! # Modules
//!
//! - [`gate`] – [`TelemetryGate`][gate::TelemetryGate]: rate-limited,
//!   connection-aware publishing of the four telemetry channels.
//! - [`link`] – [`LinkScheduler`][link::LinkScheduler]: one bounded reconnect
//!   attempt per retry interval while the transport is down.
//! - [`supervisor`] – [`Supervisor`][supervisor::Supervisor]: applies queued
//!   commands, runs the cycle, then gate, link and pump, until shut down.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod gate;
pub mod link;
pub mod supervisor;
pub mod telemetry;

pub use gate::{PublishOutcome, TelemetryGate, TelemetrySnapshot};
pub use link::{LinkScheduler, LinkStatus};
pub use supervisor::{CycleOutcome, Supervisor};
pub use telemetry::{TracerProviderGuard, init_tracing};
