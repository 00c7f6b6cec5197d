//! `crema-control` – the hybrid boiler temperature controller.
//!
//! One control cycle reads the probe, refreshes the rate of change, picks a
//! heating strategy and turns the resulting duty into a time-proportional
//! ON/OFF schedule for the heater relay.
//!
//! # Modules
//!
//! - [`reader`] – [`SensorReader`][reader::SensorReader]: turns raw probe
//!   values into validated [`Sample`][crema_types::Sample]s or a
//!   [`FaultKind`][crema_types::FaultKind].
//! - [`rate`] – [`RateEstimator`][rate::RateEstimator]: stepped, low-frequency
//!   rate-of-change estimate.
//! - [`arbiter`] – [`arbitrate`][arbiter::arbitrate]: pure mode selection
//!   between full power, closed loop and the overshoot cap.
//! - [`pid`] – [`PidController`][pid::PidController] and the
//!   [`PidAdapter`][pid::PidAdapter] that configures it for duty output and
//!   freezes it while bypassed.
//! - [`modulator`] – [`OutputModulator`][modulator::OutputModulator]: the
//!   blocking ON/OFF window that also paces the loop.
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: one full
//!   cycle wired together.

pub mod arbiter;
pub mod control_loop;
pub mod modulator;
pub mod pid;
pub mod rate;
pub mod reader;

pub use arbiter::{Arbitration, arbitrate};
pub use control_loop::{ControlHardware, ControlLoop, CycleReport};
pub use modulator::OutputModulator;
pub use pid::{PidAdapter, PidController};
pub use rate::RateEstimator;
pub use reader::SensorReader;
