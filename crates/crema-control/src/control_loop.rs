//! [`ControlLoop`] – one full control cycle.
//!
//! ```text
//! SensorReader ──fault──▶ bypass PID, duty 0 ─────────────┐
//!      │ ok                                                ▼
//!      └─▶ RateEstimator ─▶ arbitrate ─▶ (PidAdapter) ─▶ OutputModulator
//! ```
//!
//! The loop holds exclusive ownership of its configuration snapshot.  A new
//! snapshot is swapped in whole via [`ControlLoop::reconfigure`], between
//! cycles.

use std::sync::Arc;

use crema_hal::{Clock, Relay, StatusIndicator, TemperatureSensor};
use crema_types::{
    ControlConfig, ControlMode, CremaError, FaultKind, RateEstimate, Sample, SensorConfig,
};
use tracing::{debug, error, warn};

use crate::arbiter::{Arbitration, arbitrate};
use crate::modulator::OutputModulator;
use crate::pid::PidAdapter;
use crate::rate::RateEstimator;
use crate::reader::SensorReader;

/// Drivers the loop needs, bundled for construction.
pub struct ControlHardware {
    pub sensor: Box<dyn TemperatureSensor>,
    pub relay: Box<dyn Relay>,
    pub indicator: Box<dyn StatusIndicator>,
    pub clock: Arc<dyn Clock>,
}

/// What happened in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    /// Start of the cycle.
    pub timestamp_ms: u64,
    /// `None` when the sensor faulted.
    pub sample: Option<Sample>,
    pub rate: RateEstimate,
    /// `None` when the sensor faulted.
    pub mode: Option<ControlMode>,
    /// Duty actually applied, in window units.
    pub duty: f32,
    pub fault: Option<FaultKind>,
    /// Set when the relay refused a command during this window.
    pub output_error: Option<CremaError>,
}

pub struct ControlLoop {
    config: ControlConfig,
    reader: SensorReader,
    rate: RateEstimator,
    pid: PidAdapter,
    modulator: OutputModulator,
    clock: Arc<dyn Clock>,
}

impl ControlLoop {
    /// # Errors
    ///
    /// Returns [`CremaError::Config`] when either snapshot fails validation.
    pub fn new(
        config: ControlConfig,
        sensor_config: SensorConfig,
        hardware: ControlHardware,
    ) -> Result<Self, CremaError> {
        config.validate()?;
        sensor_config.validate()?;

        let ControlHardware {
            sensor,
            relay,
            indicator,
            clock,
        } = hardware;

        Ok(Self {
            reader: SensorReader::new(sensor, sensor_config, clock.clone()),
            rate: RateEstimator::new(config.estimation_interval_ms),
            pid: PidAdapter::new(&config),
            modulator: OutputModulator::new(relay, indicator, clock.clone(), config.window_ms),
            clock,
            config,
        })
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    /// Swap in a new configuration snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CremaError::Config`] and keeps the current snapshot when the
    /// new one is invalid.
    pub fn reconfigure(&mut self, config: ControlConfig) -> Result<(), CremaError> {
        config.validate()?;
        self.pid.reconfigure(&config);
        self.rate.set_interval(config.estimation_interval_ms);
        self.modulator.set_window(config.window_ms);
        self.config = config;
        Ok(())
    }

    /// Run one cycle.  Blocks for one control window.
    pub fn cycle(&mut self) -> CycleReport {
        let timestamp_ms = self.clock.now_ms();

        let sample = match self.reader.read() {
            Ok(sample) => sample,
            Err(fault) => {
                warn!(
                    sensor = self.reader.sensor_id(),
                    %fault,
                    "sensor fault; heater held off for this window"
                );
                self.pid.bypass();
                let (duty, output_error) = self.actuate(0.0);
                return CycleReport {
                    timestamp_ms,
                    sample: None,
                    rate: self.rate.current(),
                    mode: None,
                    duty,
                    fault: Some(fault),
                    output_error,
                };
            }
        };

        let rate = self.rate.update(sample);
        let decision = arbitrate(&sample, &rate, &self.config);
        let requested = match decision {
            Arbitration::ClosedLoop => self.pid.compute(sample.celsius),
            Arbitration::FullPower { duty } | Arbitration::OvershootCap { duty, .. } => {
                self.pid.bypass();
                duty
            }
        };

        if let Arbitration::OvershootCap { overridden, .. } = decision {
            debug!(%overridden, "overshoot cap engaged");
        }
        debug!(
            celsius = sample.celsius,
            rate = rate.celsius_per_sec,
            setpoint = self.config.setpoint,
            mode = %decision.mode(),
            duty = requested,
            "control cycle"
        );

        let (duty, output_error) = self.actuate(requested);
        CycleReport {
            timestamp_ms,
            sample: Some(sample),
            rate,
            mode: Some(decision.mode()),
            duty,
            fault: None,
            output_error,
        }
    }

    /// Leave the heater off.  Call before dropping the loop.
    pub fn shutdown(&mut self) {
        self.modulator.force_off();
    }

    fn actuate(&mut self, duty: f32) -> (f32, Option<CremaError>) {
        match self.modulator.apply(duty) {
            Ok(applied) => (applied, None),
            Err(e) => {
                error!(error = %e, "heater output failed; relay forced off");
                (0.0, Some(e))
            }
        }
    }
}
