//! Immutable configuration snapshots.
//!
//! The control loop owns a [`ControlConfig`] by value.  Live changes (a remote
//! setpoint command, for instance) build a new snapshot and hand it over
//! between cycles; nothing edits a snapshot that is in use.

use serde::{Deserialize, Serialize};

use crate::CremaError;

// ─────────────────────────────────────────────────────────────────────────────
// ControlConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning of the hybrid control algorithm.
///
/// Duty values are expressed in the same unit as the window: milliseconds of
/// heater ON-time per `window_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Boiler target temperature in °C.
    #[serde(default = "default_setpoint")]
    pub setpoint: f32,

    /// Proportional gain (duty-ms per °C of error).
    #[serde(default = "default_kp")]
    pub kp: f32,

    /// Integral gain (duty-ms per °C·s).
    #[serde(default = "default_ki")]
    pub ki: f32,

    /// Derivative gain (duty-ms per °C/s).
    #[serde(default = "default_kd")]
    pub kd: f32,

    /// Length of one time-proportional control window.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Below `setpoint - full_power_band` the heater runs flat out.
    #[serde(default = "default_full_power_band")]
    pub full_power_band: f32,

    /// Cooling at or faster than this rate (°C/s, negative) forces full power.
    #[serde(default = "default_rapid_drop_threshold")]
    pub rapid_drop_threshold: f32,

    /// Above `setpoint + overshoot_band` the duty is capped.
    #[serde(default = "default_overshoot_band")]
    pub overshoot_band: f32,

    /// Fraction of the window the heater may stay on while capped.
    #[serde(default = "default_overshoot_cap_fraction")]
    pub overshoot_cap_fraction: f32,

    /// Spacing between two rate-of-change estimates.
    #[serde(default = "default_estimation_interval_ms")]
    pub estimation_interval_ms: u64,
}

fn default_setpoint() -> f32 {
    105.0
}
fn default_kp() -> f32 {
    120.0
}
fn default_ki() -> f32 {
    2.0
}
fn default_kd() -> f32 {
    40.0
}
fn default_window_ms() -> u64 {
    1000
}
fn default_full_power_band() -> f32 {
    15.0
}
fn default_rapid_drop_threshold() -> f32 {
    -0.5
}
fn default_overshoot_band() -> f32 {
    0.1
}
fn default_overshoot_cap_fraction() -> f32 {
    0.01
}
fn default_estimation_interval_ms() -> u64 {
    3000
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            setpoint: default_setpoint(),
            kp: default_kp(),
            ki: default_ki(),
            kd: default_kd(),
            window_ms: default_window_ms(),
            full_power_band: default_full_power_band(),
            rapid_drop_threshold: default_rapid_drop_threshold(),
            overshoot_band: default_overshoot_band(),
            overshoot_cap_fraction: default_overshoot_cap_fraction(),
            estimation_interval_ms: default_estimation_interval_ms(),
        }
    }
}

impl ControlConfig {
    /// The full window expressed as a duty value.
    pub fn window_duty(&self) -> f32 {
        self.window_ms as f32
    }

    /// Duty applied while the overshoot cap holds.
    pub fn overshoot_cap_duty(&self) -> f32 {
        self.window_duty() * self.overshoot_cap_fraction
    }

    /// Return a copy of this snapshot with a different setpoint.
    pub fn with_setpoint(&self, setpoint: f32) -> Self {
        Self {
            setpoint,
            ..self.clone()
        }
    }

    /// Check the snapshot for values the control loop cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`CremaError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), CremaError> {
        let finite = [
            ("setpoint", self.setpoint),
            ("kp", self.kp),
            ("ki", self.ki),
            ("kd", self.kd),
            ("full_power_band", self.full_power_band),
            ("rapid_drop_threshold", self.rapid_drop_threshold),
            ("overshoot_band", self.overshoot_band),
            ("overshoot_cap_fraction", self.overshoot_cap_fraction),
        ];
        if let Some((name, _)) = finite.iter().find(|(_, v)| !v.is_finite()) {
            return Err(CremaError::Config(format!("{name} must be a finite number")));
        }
        if self.window_ms == 0 {
            return Err(CremaError::Config("window_ms must be positive".to_string()));
        }
        if self.estimation_interval_ms == 0 {
            return Err(CremaError::Config(
                "estimation_interval_ms must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.overshoot_cap_fraction) {
            return Err(CremaError::Config(format!(
                "overshoot_cap_fraction {} is outside [0, 1]",
                self.overshoot_cap_fraction
            )));
        }
        if self.rapid_drop_threshold >= 0.0 {
            return Err(CremaError::Config(format!(
                "rapid_drop_threshold {} must be negative",
                self.rapid_drop_threshold
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SensorConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Plausible physical range of the boiler probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_min_celsius")]
    pub min_celsius: f32,
    #[serde(default = "default_max_celsius")]
    pub max_celsius: f32,
}

fn default_min_celsius() -> f32 {
    0.0
}
fn default_max_celsius() -> f32 {
    150.0
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            min_celsius: default_min_celsius(),
            max_celsius: default_max_celsius(),
        }
    }
}

impl SensorConfig {
    /// `true` when `value` is finite and inside `[min_celsius, max_celsius]`.
    pub fn is_plausible(&self, value: f32) -> bool {
        value.is_finite() && value >= self.min_celsius && value <= self.max_celsius
    }

    /// # Errors
    ///
    /// Returns [`CremaError::Config`] for an empty or non-finite range.
    pub fn validate(&self) -> Result<(), CremaError> {
        if !self.min_celsius.is_finite() || !self.max_celsius.is_finite() {
            return Err(CremaError::Config("sensor range must be finite".to_string()));
        }
        if self.min_celsius >= self.max_celsius {
            return Err(CremaError::Config(format!(
                "sensor range [{}, {}] is empty",
                self.min_celsius, self.max_celsius
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TelemetryConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Which transport carries telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process broker on the event bus.
    #[default]
    Bus,
    /// Line-oriented TCP link to `broker`.
    Tcp,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Bus => write!(f, "bus"),
            TransportKind::Tcp => write!(f, "tcp"),
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = CremaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bus" => Ok(TransportKind::Bus),
            "tcp" => Ok(TransportKind::Tcp),
            other => Err(CremaError::Config(format!("unknown transport {other:?}"))),
        }
    }
}

/// Telemetry cadence and link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Broker address, `host:port`.
    #[serde(default = "default_broker")]
    pub broker: String,

    #[serde(default)]
    pub transport: TransportKind,

    /// Prefix of the four telemetry channels.
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,

    /// Prefix of the randomized per-connection client identifier.
    #[serde(default = "default_client_id_prefix")]
    pub client_id_prefix: String,

    #[serde(default = "default_publish_interval_ms")]
    pub publish_interval_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    /// Upper bound on a single connect attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_broker() -> String {
    "127.0.0.1:1883".to_string()
}
fn default_topic_prefix() -> String {
    "espresso".to_string()
}
fn default_client_id_prefix() -> String {
    "crema".to_string()
}
fn default_publish_interval_ms() -> u64 {
    2000
}
fn default_reconnect_interval_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    200
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            transport: TransportKind::default(),
            topic_prefix: default_topic_prefix(),
            client_id_prefix: default_client_id_prefix(),
            publish_interval_ms: default_publish_interval_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl TelemetryConfig {
    /// Full topic name for `channel`, e.g. `"espresso/temp"`.
    pub fn topic(&self, channel: &str) -> String {
        if self.topic_prefix.is_empty() {
            channel.to_string()
        } else {
            format!("{}/{}", self.topic_prefix, channel)
        }
    }
}
