//! [`SensorReader`] – validated temperature acquisition.
//!
//! A reading that is not a finite number or lies outside the configured
//! plausible range is a fault, and so is a driver error.  The control loop
//! answers every fault the same way: heater off for that window, no control
//! computation, try again next cycle.

use std::sync::Arc;

use crema_hal::{Clock, TemperatureSensor};
use crema_types::{FaultKind, Sample, SensorConfig};

pub struct SensorReader {
    sensor: Box<dyn TemperatureSensor>,
    range: SensorConfig,
    clock: Arc<dyn Clock>,
}

impl SensorReader {
    pub fn new(sensor: Box<dyn TemperatureSensor>, range: SensorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            sensor,
            range,
            clock,
        }
    }

    /// Read the probe and stamp the value with the current time.
    ///
    /// # Errors
    ///
    /// - [`FaultKind::OutOfRange`] for NaN, infinite or implausible values.
    /// - [`FaultKind::ReadFailed`] when the driver itself failed.
    pub fn read(&mut self) -> Result<Sample, FaultKind> {
        let timestamp_ms = self.clock.now_ms();
        let value = self
            .sensor
            .read_celsius()
            .map_err(|e| FaultKind::ReadFailed(e.to_string()))?;
        if !self.range.is_plausible(value) {
            return Err(FaultKind::OutOfRange { value });
        }
        Ok(Sample::new(value, timestamp_ms))
    }

    pub fn sensor_id(&self) -> &str {
        self.sensor.id()
    }
}
