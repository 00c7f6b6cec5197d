//! `crema-types` – shared vocabulary of the boiler controller.
//!
//! Every other crate in the workspace talks in terms of these types: the
//! temperature [`Sample`], the stepped [`RateEstimate`], the per-cycle
//! [`ControlMode`], the bus [`Event`] envelope and the workspace-wide
//! [`CremaError`].  Configuration snapshots live in [`config`].

pub mod config;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use config::{ControlConfig, SensorConfig, TelemetryConfig, TransportKind};

/// A validated boiler temperature reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Boiler temperature in degrees Celsius.
    pub celsius: f32,
    /// Monotonic timestamp in milliseconds since an arbitrary epoch.
    pub timestamp_ms: u64,
}

impl Sample {
    pub fn new(celsius: f32, timestamp_ms: u64) -> Self {
        Self {
            celsius,
            timestamp_ms,
        }
    }
}

/// Rate of change of the boiler temperature, refreshed once per estimation
/// interval.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RateEstimate {
    /// Degrees Celsius per second.  Zero until the first interval completes.
    pub celsius_per_sec: f32,
    /// Start of the window this estimate was derived from.
    pub window_start_ms: u64,
}

/// Heating strategy in force for one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Bang-bang: the heater is driven for the whole window.
    FullPower,
    /// The PID adapter decides the duty.
    ClosedLoop,
    /// Temperature is above target; duty is pinned to the cap.
    OvershootCap,
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::FullPower => write!(f, "full_power"),
            ControlMode::ClosedLoop => write!(f, "closed_loop"),
            ControlMode::OvershootCap => write!(f, "overshoot_cap"),
        }
    }
}

/// Why a sensor reading was rejected.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaultKind {
    /// NaN, infinite, or outside the plausible physical range.
    #[error("reading {value} is outside the plausible range")]
    OutOfRange { value: f32 },

    /// The driver could not produce a value at all.
    #[error("sensor read failed: {0}")]
    ReadFailed(String),
}

/// Commands that may arrive from the telemetry link.
///
/// They are queued by the transport and applied between control cycles,
/// never in the middle of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum RemoteCommand {
    SetSetpoint(f32),
}

/// One named telemetry channel and its decimal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// e.g. `"espresso/temp"`
    pub topic: String,
    /// e.g. `"104.87"`
    pub payload: String,
}

/// Unified event wrapper for the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Publishing client, e.g. `"crema-3fa1c2d0"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current wall time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Telemetry(TelemetryRecord),
    Command(RemoteCommand),
    SensorFault { component: String, fault: FaultKind },
}

/// Workspace error type spanning sensor faults, actuator failures, link
/// problems and configuration mistakes.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CremaError {
    #[error("Sensor Fault: {0}")]
    SensorFault(FaultKind),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Transport Error: {0}")]
    Transport(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    #[error("Channel Error: {0}")]
    Channel(String),
}

impl From<FaultKind> for CremaError {
    fn from(fault: FaultKind) -> Self {
        CremaError::SensorFault(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_estimate_defaults_to_zero() {
        let rate = RateEstimate::default();
        assert_eq!(rate.celsius_per_sec, 0.0);
        assert_eq!(rate.window_start_ms, 0);
    }

    #[test]
    fn control_mode_display_matches_serde_name() {
        for mode in [
            ControlMode::FullPower,
            ControlMode::ClosedLoop,
            ControlMode::OvershootCap,
        ] {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{mode}\""));
        }
    }

    #[test]
    fn remote_command_wire_shape() {
        let cmd = RemoteCommand::SetSetpoint(93.5);
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"command":"set_setpoint","value":93.5}"#);
        let back: RemoteCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn event_envelope_keeps_source_and_payload() {
        let event = Event::new(
            "crema-test",
            EventPayload::Telemetry(TelemetryRecord {
                topic: "espresso/temp".to_string(),
                payload: "104.50".to_string(),
            }),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.source, "crema-test");
        match back.payload {
            EventPayload::Telemetry(record) => assert_eq!(record.payload, "104.50"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn sensor_fault_converts_into_crema_error() {
        let err: CremaError = FaultKind::OutOfRange { value: 200.0 }.into();
        assert!(err.to_string().contains("Sensor Fault"));
        assert!(err.to_string().contains("200"));

        let hw = CremaError::HardwareFault {
            component: "boiler_ssr".to_string(),
            details: "gpio write failed".to_string(),
        };
        assert!(hw.to_string().contains("boiler_ssr"));
    }
}
