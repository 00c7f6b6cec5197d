//! Configuration file – reads/writes `~/.crema/config.toml`.
//!
//! ```toml
//! [control]
//! setpoint = 105.0
//! kp = 120.0
//!
//! [sensor]
//! max_celsius = 150.0
//!
//! [telemetry]
//! transport = "tcp"
//! broker = "192.168.1.20:1883"
//!
//! [simulation]
//! initial_celsius = 20.0
//! ```
//!
//! Every table and field is optional; missing values take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use crema_hal::sim::BoilerModel;
use crema_types::{ControlConfig, CremaError, SensorConfig, TelemetryConfig, TransportKind};
use serde::{Deserialize, Serialize};

/// Parameters of the simulated boiler the CLI drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Water temperature at start-up.
    #[serde(default = "default_initial_celsius")]
    pub initial_celsius: f32,
    #[serde(default = "default_ambient_celsius")]
    pub ambient_celsius: f32,
    #[serde(default = "default_heater_watts")]
    pub heater_watts: f32,
    /// J/°C.
    #[serde(default = "default_heat_capacity")]
    pub heat_capacity: f32,
    /// W/°C.
    #[serde(default = "default_loss_coefficient")]
    pub loss_coefficient: f32,
}

fn default_initial_celsius() -> f32 {
    20.0
}
fn default_ambient_celsius() -> f32 {
    20.0
}
fn default_heater_watts() -> f32 {
    1000.0
}
fn default_heat_capacity() -> f32 {
    1600.0
}
fn default_loss_coefficient() -> f32 {
    2.0
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            initial_celsius: default_initial_celsius(),
            ambient_celsius: default_ambient_celsius(),
            heater_watts: default_heater_watts(),
            heat_capacity: default_heat_capacity(),
            loss_coefficient: default_loss_coefficient(),
        }
    }
}

impl SimulationConfig {
    pub fn model(&self) -> BoilerModel {
        BoilerModel {
            heater_watts: self.heater_watts,
            heat_capacity: self.heat_capacity,
            loss_coefficient: self.loss_coefficient,
            ambient_celsius: self.ambient_celsius,
        }
    }
}

/// Everything the `crema` binary reads from its configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Reject a configuration the controller cannot run with.
    pub fn validate(&self) -> Result<(), CremaError> {
        self.control.validate()?;
        self.sensor.validate()?;
        if !self.sensor.is_plausible(self.control.setpoint) {
            return Err(CremaError::Config(format!(
                "setpoint {} is outside the sensor range [{}, {}]",
                self.control.setpoint, self.sensor.min_celsius, self.sensor.max_celsius
            )));
        }
        if self.simulation.heat_capacity <= 0.0 || !self.simulation.heat_capacity.is_finite() {
            return Err(CremaError::Config(
                "simulation.heat_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Return the path to `~/.crema/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".crema").join("config.toml")
}

/// Load the config from `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, CremaError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        CremaError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| CremaError::Serialization(format!("failed to parse config: {e}")))?;
    Ok(Some(cfg))
}

/// Load the file (or defaults when it is absent), apply `CREMA_*` overrides
/// and validate the result.
pub fn resolve(path: &Path) -> Result<Config, CremaError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Apply `CREMA_*` environment variable overrides to `cfg`.
///
/// Supported variables:
///
/// | Variable | Config field |
/// |---|---|
/// | `CREMA_SETPOINT` | `control.setpoint` |
/// | `CREMA_BROKER` | `telemetry.broker` |
/// | `CREMA_TRANSPORT` | `telemetry.transport` (`bus` or `tcp`) |
/// | `CREMA_PUBLISH_INTERVAL_MS` | `telemetry.publish_interval_ms` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("CREMA_SETPOINT")
        && let Ok(setpoint) = v.trim().parse::<f32>()
    {
        cfg.control = cfg.control.with_setpoint(setpoint);
    }
    if let Ok(v) = std::env::var("CREMA_BROKER")
        && !v.trim().is_empty()
    {
        cfg.telemetry.broker = v.trim().to_string();
    }
    if let Ok(v) = std::env::var("CREMA_TRANSPORT")
        && let Ok(kind) = v.parse::<TransportKind>()
    {
        cfg.telemetry.transport = kind;
    }
    if let Ok(v) = std::env::var("CREMA_PUBLISH_INTERVAL_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
    {
        cfg.telemetry.publish_interval_ms = ms;
    }
}

/// Render `cfg` as TOML.
pub fn to_toml(cfg: &Config) -> Result<String, CremaError> {
    toml::to_string_pretty(cfg)
        .map_err(|e| CremaError::Serialization(format!("failed to serialize config: {e}")))
}

/// Save the config to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), CremaError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            CremaError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
    }
    let raw = to_toml(cfg)?;
    fs::write(path, raw).map_err(|e| {
        CremaError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}
