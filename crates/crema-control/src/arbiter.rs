//! Mode arbitration – the decision core of the hybrid controller.
//!
//! [`arbitrate`] is a pure function of the cycle's sample, the rate estimate
//! and the configuration snapshot.  It keeps no memory between cycles.
//!
//! Precedence:
//!
//! 1. **Full power** when the boiler is far below target or cooling fast.
//! 2. **Closed loop** otherwise; the PID adapter decides the duty.
//! 3. **Overshoot cap** is checked last and always wins: above
//!    `setpoint + overshoot_band` the duty is pinned to the cap, whatever
//!    steps 1–2 chose.

use crema_types::{ControlConfig, ControlMode, RateEstimate, Sample};

/// Outcome of mode arbitration for one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Arbitration {
    /// Heat for the whole window.
    FullPower { duty: f32 },
    /// Ask the PID adapter for the duty.
    ClosedLoop,
    /// Over target: pin the duty to the cap.  `overridden` is the mode the
    /// first two rules would have picked.
    OvershootCap { duty: f32, overridden: ControlMode },
}

impl Arbitration {
    pub fn mode(&self) -> ControlMode {
        match self {
            Arbitration::FullPower { .. } => ControlMode::FullPower,
            Arbitration::ClosedLoop => ControlMode::ClosedLoop,
            Arbitration::OvershootCap { .. } => ControlMode::OvershootCap,
        }
    }

    /// The duty this decision fixes on its own, `None` for closed loop.
    pub fn fixed_duty(&self) -> Option<f32> {
        match self {
            Arbitration::FullPower { duty } | Arbitration::OvershootCap { duty, .. } => Some(*duty),
            Arbitration::ClosedLoop => None,
        }
    }
}

/// Select the heating strategy for this cycle.
pub fn arbitrate(sample: &Sample, rate: &RateEstimate, config: &ControlConfig) -> Arbitration {
    let far_below = sample.celsius < config.setpoint - config.full_power_band;
    let dropping_fast = rate.celsius_per_sec <= config.rapid_drop_threshold;

    let base = if far_below || dropping_fast {
        Arbitration::FullPower {
            duty: config.window_duty(),
        }
    } else {
        Arbitration::ClosedLoop
    };

    if sample.celsius > config.setpoint + config.overshoot_band {
        Arbitration::OvershootCap {
            duty: config.overshoot_cap_duty(),
            overridden: base.mode(),
        }
    } else {
        base
    }
}
