//! PID (Proportional–Integral–Derivative) controller and its duty adapter.
//!
//! [`PidController`] is the plain numerical building block: the caller
//! supplies the measurement and elapsed time and receives a clamped output.
//! [`PidAdapter`] configures it for the boiler (output in window units,
//! one call per control window) and owns the policy for cycles in which
//! another mode overrides the output.
//!
//! # Example
//!
//! ```rust
//! use crema_control::pid::PidController;
//!
//! let mut pid = PidController::new(1.0, 0.1, 0.05);
//! pid.set_set_point(90.0);
//!
//! let output = pid.update(0.0, 0.01); // measurement=0, dt=10 ms
//! assert!(output > 0.0);
//! ```

use crema_types::ControlConfig;

/// A tunable PID controller for closed-loop feedback control.
///
/// The integral term is accumulated already multiplied by `ki` and clamped to
/// the output limits, so retuning does not bump the output and the term can
/// never wind up past what the actuator can deliver.  The derivative acts on
/// the measurement rather than the error, which keeps setpoint changes from
/// producing a derivative kick.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    set_point: f32,
    integral: f32,
    last_measurement: Option<f32>,
    output_min: f32,
    output_max: f32,
}

impl PidController {
    /// Create a new controller with the given gains.
    ///
    /// Output is unclamped by default (`f32::NEG_INFINITY` to `f32::INFINITY`).
    pub fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            set_point: 0.0,
            integral: 0.0,
            last_measurement: None,
            output_min: f32::NEG_INFINITY,
            output_max: f32::INFINITY,
        }
    }

    /// Update the proportional, integral, and derivative gains.
    pub fn set_gains(&mut self, kp: f32, ki: f32, kd: f32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Change the desired set-point value.
    pub fn set_set_point(&mut self, set_point: f32) {
        self.set_point = set_point;
    }

    /// Clamp the controller output to `[min, max]`.
    ///
    /// The accumulated integral term is pulled into the new range as well.
    pub fn set_output_limits(&mut self, min: f32, max: f32) {
        self.output_min = min;
        self.output_max = max;
        self.integral = self.integral.clamp(min, max);
    }

    /// The accumulated integral contribution (already scaled by `ki`).
    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Compute the next controller output.
    ///
    /// - `measurement` – the current measured value of the process variable.
    /// - `dt` – elapsed time since the last call, in seconds (must be > 0).
    ///
    /// Returns the clamped control output.  Returns `0.0` without updating
    /// internal state if `dt` is not positive.
    pub fn update(&mut self, measurement: f32, dt: f32) -> f32 {
        if dt <= 0.0 {
            return 0.0;
        }

        let error = self.set_point - measurement;

        let p = self.kp * error;

        self.integral =
            (self.integral + self.ki * error * dt).clamp(self.output_min, self.output_max);

        // Derivative on measurement (backward difference).
        let d = match self.last_measurement {
            Some(prev) => -self.kd * (measurement - prev) / dt,
            None => 0.0,
        };
        self.last_measurement = Some(measurement);

        (p + self.integral + d).clamp(self.output_min, self.output_max)
    }

    /// Forget the previous measurement so the next update has no derivative
    /// term.  The integral is kept.
    pub fn clear_derivative_memory(&mut self) {
        self.last_measurement = None;
    }

    /// Reset internal state (integral accumulator and derivative memory).
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.last_measurement = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PidAdapter
// ─────────────────────────────────────────────────────────────────────────────

/// The closed-loop half of the hybrid controller.
///
/// Output is bounded to `[0, window]` in window units and grows as the boiler
/// falls below the setpoint.  The sample period is the control window, since
/// [`compute`][Self::compute] is called at most once per window.
///
/// While another mode owns the output the adapter is told so through
/// [`bypass`][Self::bypass]: the integral stays frozen at its last value and
/// the derivative memory is dropped, so the first closed-loop cycle after an
/// override neither integrates the overridden interval nor differentiates
/// across it.
#[derive(Debug, Clone)]
pub struct PidAdapter {
    pid: PidController,
    sample_secs: f32,
    bypassed_cycles: u64,
}

impl PidAdapter {
    pub fn new(config: &ControlConfig) -> Self {
        let mut adapter = Self {
            pid: PidController::new(config.kp, config.ki, config.kd),
            sample_secs: 0.0,
            bypassed_cycles: 0,
        };
        adapter.reconfigure(config);
        adapter
    }

    /// Apply a new configuration snapshot, keeping the integral (clamped to
    /// the new bounds).
    pub fn reconfigure(&mut self, config: &ControlConfig) {
        self.pid.set_gains(config.kp, config.ki, config.kd);
        self.pid.set_set_point(config.setpoint);
        self.pid.set_output_limits(0.0, config.window_duty());
        self.sample_secs = config.window_ms as f32 / 1000.0;
    }

    /// Closed-loop duty for `measurement`, in window units.
    pub fn compute(&mut self, measurement: f32) -> f32 {
        self.bypassed_cycles = 0;
        self.pid.update(measurement, self.sample_secs)
    }

    /// Record that this cycle's output came from another mode.
    pub fn bypass(&mut self) {
        self.bypassed_cycles = self.bypassed_cycles.saturating_add(1);
        self.pid.clear_derivative_memory();
    }

    /// Consecutive cycles since the last [`compute`][Self::compute].
    pub fn bypassed_cycles(&self) -> u64 {
        self.bypassed_cycles
    }

    pub fn integral(&self) -> f32 {
        self.pid.integral()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_only_drives_toward_set_point() {
        let mut pid = PidController::new(2.0, 0.0, 0.0);
        pid.set_set_point(10.0);

        // error = 10.0 - 0.0 = 10.0 → output = 2.0 * 10.0 = 20.0
        let output = pid.update(0.0, 0.1);
        assert!((output - 20.0).abs() < 1e-4);
    }

    #[test]
    fn output_is_zero_at_set_point() {
        let mut pid = PidController::new(1.0, 0.0, 0.0);
        pid.set_set_point(5.0);
        let output = pid.update(5.0, 0.1);
        assert!(output.abs() < 1e-6);
    }

    #[test]
    fn output_clamped_to_limits() {
        let mut pid = PidController::new(100.0, 0.0, 0.0);
        pid.set_set_point(1.0);
        pid.set_output_limits(-1.0, 1.0);

        let output = pid.update(0.0, 0.01);
        assert!(output <= 1.0);
        assert!(output >= -1.0);
    }

    #[test]
    fn integral_accumulates_over_time() {
        let mut pid = PidController::new(0.0, 1.0, 0.0);
        pid.set_set_point(2.0);
        pid.update(1.0, 0.5); // integral += 1.0 * 0.5 = 0.5
        let out = pid.update(1.0, 0.5); // integral → 1.0
        assert!((out - 1.0).abs() < 1e-4);
    }

    #[test]
    fn integral_never_exceeds_output_limits() {
        let mut pid = PidController::new(0.0, 10.0, 0.0);
        pid.set_set_point(100.0);
        pid.set_output_limits(0.0, 50.0);
        for _ in 0..100 {
            pid.update(0.0, 1.0);
        }
        assert!((pid.integral() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn derivative_ignores_set_point_changes() {
        let mut pid = PidController::new(0.0, 0.0, 10.0);
        pid.set_set_point(90.0);
        pid.update(80.0, 1.0);
        pid.set_set_point(100.0);
        // Measurement did not move, so no derivative output.
        assert!(pid.update(80.0, 1.0).abs() < 1e-6);
    }

    #[test]
    fn derivative_opposes_rising_measurement() {
        let mut pid = PidController::new(0.0, 0.0, 10.0);
        pid.set_set_point(100.0);
        pid.update(80.0, 1.0);
        let out = pid.update(82.0, 1.0);
        assert!((out + 20.0).abs() < 1e-4);
    }

    #[test]
    fn reset_clears_state() {
        let mut pid = PidController::new(1.0, 1.0, 1.0);
        pid.set_set_point(5.0);
        pid.update(0.0, 0.1);
        pid.reset();

        let out_after_reset = pid.update(0.0, 0.1);
        let mut fresh = PidController::new(1.0, 1.0, 1.0);
        fresh.set_set_point(5.0);
        let out_fresh = fresh.update(0.0, 0.1);
        assert!((out_after_reset - out_fresh).abs() < 1e-6);
    }

    #[test]
    fn set_gains_updates_behavior() {
        let mut pid = PidController::new(1.0, 0.0, 0.0);
        pid.set_set_point(10.0);
        pid.set_gains(3.0, 0.0, 0.0);
        let output = pid.update(0.0, 0.1);
        assert!((output - 30.0).abs() < 1e-4);
    }

    #[test]
    fn non_positive_dt_returns_zero_without_side_effects() {
        let mut pid = PidController::new(1.0, 1.0, 1.0);
        pid.set_set_point(5.0);
        assert_eq!(pid.update(0.0, 0.0), 0.0);
        assert_eq!(pid.update(0.0, -0.1), 0.0);
        let mut fresh = PidController::new(1.0, 1.0, 1.0);
        fresh.set_set_point(5.0);
        assert!((pid.update(0.0, 0.1) - fresh.update(0.0, 0.1)).abs() < 1e-6);
    }

    // ── PidAdapter ──────────────────────────────────────────────────────────

    #[test]
    fn adapter_output_is_zero_at_setpoint() {
        let mut adapter = PidAdapter::new(&ControlConfig::default());
        assert!(adapter.compute(105.0).abs() < 1e-6);
    }

    #[test]
    fn adapter_output_grows_below_setpoint() {
        let mut adapter = PidAdapter::new(&ControlConfig::default());
        // kp 120 * 1 °C + ki 2 * 1 °C * 1 s
        let duty = adapter.compute(104.0);
        assert!((duty - 122.0).abs() < 1e-3, "got {duty}");
    }

    #[test]
    fn adapter_output_bounded_by_window() {
        let cfg = ControlConfig::default();
        let mut adapter = PidAdapter::new(&cfg);
        assert_eq!(adapter.compute(20.0), cfg.window_duty());
        let mut adapter = PidAdapter::new(&cfg);
        assert_eq!(adapter.compute(140.0), 0.0);
    }

    #[test]
    fn bypass_freezes_integral() {
        let mut adapter = PidAdapter::new(&ControlConfig::default());
        adapter.compute(104.0);
        let frozen = adapter.integral();
        for _ in 0..10 {
            adapter.bypass();
        }
        assert_eq!(adapter.integral(), frozen);
        assert_eq!(adapter.bypassed_cycles(), 10);
    }

    #[test]
    fn bypass_drops_derivative_memory() {
        let cfg = ControlConfig {
            kp: 0.0,
            ki: 0.0,
            kd: 40.0,
            ..ControlConfig::default()
        };
        let mut adapter = PidAdapter::new(&cfg);
        adapter.compute(100.0);
        adapter.bypass();
        // Without the bypass the 4 °C drop would add 160 ms of derivative duty.
        assert_eq!(adapter.compute(96.0), 0.0);
        assert_eq!(adapter.bypassed_cycles(), 0);
    }

    #[test]
    fn reconfigure_moves_setpoint_and_clamps_integral() {
        let mut adapter = PidAdapter::new(&ControlConfig {
            ki: 500.0,
            ..ControlConfig::default()
        });
        adapter.compute(95.0);
        assert!(adapter.integral() > 100.0);

        let smaller = ControlConfig {
            window_ms: 100,
            setpoint: 95.0,
            ..ControlConfig::default()
        };
        adapter.reconfigure(&smaller);
        assert!(adapter.integral() <= 100.0);
        assert!(adapter.compute(95.0) <= 100.0);
    }
}
