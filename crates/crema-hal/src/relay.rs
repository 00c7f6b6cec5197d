//! Generic `Relay` trait for the heater's solid-state relay and any other
//! discrete on/off output.

use crema_types::CremaError;

/// A discrete on/off hardware output.
///
/// The output modulator drives the boiler SSR through this trait: ON for the
/// duty portion of a window, OFF for the rest.
pub trait Relay: Send {
    /// Stable identifier for this relay, e.g. `"boiler_ssr"`.
    fn id(&self) -> &str;

    /// Drive the relay to `active` (`true` = energised / heating,
    /// `false` = de-energised).
    ///
    /// # Errors
    ///
    /// Returns [`CremaError::HardwareFault`] if the command cannot be applied.
    fn set_state(&mut self, active: bool) -> Result<(), CremaError>;

    /// Return the relay's current state (`true` = energised).
    fn state(&self) -> bool;
}

