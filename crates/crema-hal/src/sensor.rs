//! Generic `TemperatureSensor` trait for the boiler probe.

use crema_types::CremaError;

/// Raw temperature acquisition.
///
/// Drivers return whatever the hardware produced, NaN included; range
/// validation is the control loop's job, not the driver's.
pub trait TemperatureSensor: Send {
    /// Stable identifier, e.g. `"boiler_probe"`.
    fn id(&self) -> &str;

    /// Read the current temperature in °C.
    ///
    /// # Errors
    ///
    /// Returns [`CremaError::HardwareFault`] when the driver could not talk
    /// to the probe at all.
    fn read_celsius(&mut self) -> Result<f32, CremaError>;
}
