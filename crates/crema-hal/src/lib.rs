//! `crema-hal` – hardware boundary of the boiler controller.
//!
//! The control core never touches pins or buses directly.  It talks to the
//! traits defined here, so the same loop runs against real drivers, the
//! simulated boiler, or test doubles.
//!
//! # Modules
//!
//! - [`relay`] – [`Relay`][relay::Relay]: the binary ON/OFF output that
//!   drives the solid-state relay of the heating element.
//! - [`sensor`] – [`TemperatureSensor`][sensor::TemperatureSensor]: raw
//!   boiler temperature acquisition.
//! - [`indicator`] – [`StatusIndicator`][indicator::StatusIndicator]: the
//!   heater status LED.
//! - [`clock`] – [`Clock`][clock::Clock]: monotonic time and the blocking
//!   delay used to pace the control window.
//! - [`sim`] – simulated drivers and a first-order boiler thermal model for
//!   headless runs and tests.

pub mod clock;
pub mod indicator;
pub mod relay;
pub mod sensor;
pub mod sim;

pub use clock::{Clock, SimClock, SystemClock};
pub use indicator::{NullIndicator, StatusIndicator};
pub use relay::Relay;
pub use sensor::TemperatureSensor;
