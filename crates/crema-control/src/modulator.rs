//! [`OutputModulator`] – time-proportional heater output.
//!
//! A duty value in window units becomes one ON phase followed by one OFF
//! phase that together last exactly one window.  The call blocks for the
//! whole window through the [`Clock`], which makes it the pacing mechanism
//! of the entire control loop.

use std::sync::Arc;

use crema_hal::{Clock, Relay, StatusIndicator};
use crema_types::CremaError;
use tracing::error;

/// Clamp `duty` into `[0, window_ms]`.  NaN counts as zero.
pub fn clamp_duty(duty: f32, window_ms: u64) -> f32 {
    if duty.is_nan() {
        return 0.0;
    }
    duty.clamp(0.0, window_ms as f32)
}

pub struct OutputModulator {
    relay: Box<dyn Relay>,
    indicator: Box<dyn StatusIndicator>,
    clock: Arc<dyn Clock>,
    window_ms: u64,
}

impl OutputModulator {
    pub fn new(
        relay: Box<dyn Relay>,
        indicator: Box<dyn StatusIndicator>,
        clock: Arc<dyn Clock>,
        window_ms: u64,
    ) -> Self {
        Self {
            relay,
            indicator,
            clock,
            window_ms,
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Takes effect from the next [`apply`][Self::apply].
    pub fn set_window(&mut self, window_ms: u64) {
        self.window_ms = window_ms;
    }

    /// Run one window: heater ON for `duty` ms, then OFF for the remainder.
    ///
    /// Returns the duty actually applied after clamping.
    ///
    /// # Errors
    ///
    /// Returns the relay's [`CremaError::HardwareFault`] when it refuses a
    /// command.  The relay is then forced off and the rest of the window is
    /// still waited out, so the loop cadence holds even on failure.
    pub fn apply(&mut self, duty: f32) -> Result<f32, CremaError> {
        let duty = clamp_duty(duty, self.window_ms);
        let on_ms = (duty.round() as u64).min(self.window_ms);
        let off_ms = self.window_ms - on_ms;

        if on_ms > 0 {
            if let Err(e) = self.energise(true) {
                self.force_off();
                self.clock.sleep_ms(self.window_ms);
                return Err(e);
            }
            self.clock.sleep_ms(on_ms);
        }

        if let Err(e) = self.energise(false) {
            self.force_off();
            self.clock.sleep_ms(off_ms);
            return Err(e);
        }
        self.clock.sleep_ms(off_ms);

        Ok(duty)
    }

    /// De-energise the heater without waiting.
    pub fn force_off(&mut self) {
        self.indicator.set_lit(false);
        if let Err(e) = self.relay.set_state(false) {
            error!(relay = self.relay.id(), error = %e, "failed to switch heater off");
        }
    }

    pub fn heater_on(&self) -> bool {
        self.relay.state()
    }

    fn energise(&mut self, on: bool) -> Result<(), CremaError> {
        self.relay.set_state(on)?;
        self.indicator.set_lit(on);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crema_hal::SimClock;
    use crema_hal::sim::{RelayEvent, RelayProbe, SimIndicator, SimRelay};
    use proptest::prelude::*;

    struct Rig {
        clock: SimClock,
        relay: RelayProbe,
        led: SimIndicator,
        modulator: OutputModulator,
    }

    fn rig(window_ms: u64) -> Rig {
        let clock = SimClock::new();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let relay = SimRelay::new("boiler_ssr", shared.clone());
        let probe = relay.probe();
        let led = SimIndicator::new();
        let modulator = OutputModulator::new(relay, Box::new(led.clone()), shared, window_ms);
        Rig {
            clock,
            relay: probe,
            led,
            modulator,
        }
    }

    /// A relay that refuses to switch on.
    struct StuckRelay;

    impl Relay for StuckRelay {
        fn id(&self) -> &str {
            "stuck"
        }

        fn set_state(&mut self, active: bool) -> Result<(), CremaError> {
            if active {
                Err(CremaError::HardwareFault {
                    component: "stuck".to_string(),
                    details: "contact welded open".to_string(),
                })
            } else {
                Ok(())
            }
        }

        fn state(&self) -> bool {
            false
        }
    }

    #[test]
    fn partial_duty_splits_window() {
        let mut rig = rig(1000);
        let applied = rig.modulator.apply(250.0).unwrap();
        assert_eq!(applied, 250.0);
        assert_eq!(rig.clock.now_ms(), 1000);
        assert_eq!(
            rig.relay.events(),
            vec![
                RelayEvent { at_ms: 0, active: true },
                RelayEvent { at_ms: 250, active: false },
            ]
        );
        assert!(!rig.led.is_lit());
        assert_eq!(rig.led.switches(), 2);
    }

    #[test]
    fn zero_duty_never_energises() {
        let mut rig = rig(1000);
        rig.modulator.apply(0.0).unwrap();
        assert_eq!(rig.relay.on_time_ms(rig.clock.now_ms()), 0);
        assert_eq!(rig.clock.now_ms(), 1000);
        assert_eq!(rig.led.switches(), 0);
    }

    #[test]
    fn full_duty_heats_whole_window() {
        let mut rig = rig(1000);
        rig.modulator.apply(1000.0).unwrap();
        assert_eq!(rig.relay.on_time_ms(rig.clock.now_ms()), 1000);
        assert!(!rig.modulator.heater_on());
    }

    #[test]
    fn negative_duty_behaves_like_zero() {
        let mut a = rig(1000);
        let mut b = rig(1000);
        assert_eq!(a.modulator.apply(-5.0).unwrap(), b.modulator.apply(0.0).unwrap());
        assert_eq!(a.relay.events(), b.relay.events());
    }

    #[test]
    fn excess_duty_behaves_like_full_window() {
        let mut a = rig(1000);
        let mut b = rig(1000);
        assert_eq!(
            a.modulator.apply(1500.0).unwrap(),
            b.modulator.apply(1000.0).unwrap()
        );
        assert_eq!(a.relay.events(), b.relay.events());
    }

    #[test]
    fn nan_duty_is_treated_as_zero() {
        let mut rig = rig(1000);
        assert_eq!(rig.modulator.apply(f32::NAN).unwrap(), 0.0);
        assert_eq!(rig.relay.on_time_ms(rig.clock.now_ms()), 0);
    }

    #[test]
    fn relay_failure_still_consumes_window_and_reports() {
        let clock = SimClock::new();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let mut modulator =
            OutputModulator::new(Box::new(StuckRelay), Box::new(SimIndicator::new()), shared, 1000);
        let err = modulator.apply(600.0).unwrap_err();
        assert!(err.to_string().contains("welded"));
        assert_eq!(clock.now_ms(), 1000);
    }

    #[test]
    fn window_change_applies_to_next_call() {
        let mut rig = rig(1000);
        rig.modulator.set_window(500);
        rig.modulator.apply(800.0).unwrap();
        assert_eq!(rig.clock.now_ms(), 500);
        assert_eq!(rig.modulator.window_ms(), 500);
    }

    proptest! {
        #[test]
        fn every_window_lasts_exactly_window_ms(duty in -2000.0f32..3000.0) {
            let mut rig = rig(1000);
            let applied = rig.modulator.apply(duty).unwrap();
            prop_assert!((0.0..=1000.0).contains(&applied));
            prop_assert_eq!(rig.clock.now_ms(), 1000);
            prop_assert!(rig.relay.on_time_ms(1000) <= 1000);
        }
    }
}
