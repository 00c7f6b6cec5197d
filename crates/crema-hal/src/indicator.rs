//! Heater status indicator (the "heating" LED).

/// An on/off indicator that mirrors the heater state.
///
/// Indicator failures are never safety relevant, so the trait is infallible.
pub trait StatusIndicator: Send {
    fn set_lit(&mut self, lit: bool);
}

/// Indicator for setups without a status LED.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIndicator;

impl StatusIndicator for NullIndicator {
    fn set_lit(&mut self, _lit: bool) {}
}
