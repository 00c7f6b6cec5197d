//! Simulated drivers for headless runs and CI without a machine attached.
//!
//! [`SimBoiler`] is a first-order thermal model of the boiler.  It hands out a
//! [`Relay`] (the heater SSR) and a [`TemperatureSensor`] (the probe) bound to
//! the same model, and integrates the heater's energy lazily against the
//! shared [`Clock`].  The smaller stubs ([`SimRelay`], [`SimIndicator`],
//! [`ScriptedSensor`]) record what they were asked to do so tests can assert
//! on it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use crema_hal::clock::{Clock, SimClock};
//! use crema_hal::sim::{BoilerModel, SimBoiler};
//! use crema_hal::{Relay, TemperatureSensor};
//!
//! let clock = SimClock::new();
//! let boiler = SimBoiler::new(BoilerModel::default(), 20.0, Arc::new(clock.clone()));
//! let mut ssr = boiler.relay("boiler_ssr");
//! let mut probe = boiler.sensor("boiler_probe");
//!
//! ssr.set_state(true).unwrap();
//! clock.advance(10_000);
//! assert!(probe.read_celsius().unwrap() > 20.0);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crema_types::CremaError;
use tracing::trace;

use crate::clock::Clock;
use crate::indicator::StatusIndicator;
use crate::relay::Relay;
use crate::sensor::TemperatureSensor;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Recording relay
// ────────────────────────────────────────────────────────────────────────────

/// One command received by a [`SimRelay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayEvent {
    pub at_ms: u64,
    pub active: bool,
}

/// Shared view of the commands a [`SimRelay`] received.
#[derive(Debug, Clone, Default)]
pub struct RelayProbe {
    events: Arc<Mutex<Vec<RelayEvent>>>,
}

impl RelayProbe {
    pub fn events(&self) -> Vec<RelayEvent> {
        lock(&self.events).clone()
    }

    /// Total energised time between the first command and `until_ms`.
    pub fn on_time_ms(&self, until_ms: u64) -> u64 {
        let events = lock(&self.events);
        let mut total = 0;
        let mut on_since: Option<u64> = None;
        for event in events.iter() {
            match (event.active, on_since) {
                (true, None) => on_since = Some(event.at_ms),
                (false, Some(start)) => {
                    total += event.at_ms.saturating_sub(start);
                    on_since = None;
                }
                _ => {}
            }
        }
        if let Some(start) = on_since {
            total += until_ms.saturating_sub(start);
        }
        total
    }
}

/// A simulated relay that records every command with its timestamp.
/// Always succeeds.
pub struct SimRelay {
    id: String,
    state: bool,
    clock: Arc<dyn Clock>,
    probe: RelayProbe,
}

impl SimRelay {
    /// Create a new simulated relay with the given identifier.
    pub fn new(id: impl Into<String>, clock: Arc<dyn Clock>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            state: false,
            clock,
            probe: RelayProbe::default(),
        })
    }

    /// Handle for inspecting commands after the relay has been handed off.
    pub fn probe(&self) -> RelayProbe {
        self.probe.clone()
    }
}

impl Relay for SimRelay {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, active: bool) -> Result<(), CremaError> {
        self.state = active;
        lock(&self.probe.events).push(RelayEvent {
            at_ms: self.clock.now_ms(),
            active,
        });
        Ok(())
    }

    fn state(&self) -> bool {
        self.state
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Indicator
// ────────────────────────────────────────────────────────────────────────────

/// A simulated status LED that counts how often it was switched.
#[derive(Debug, Clone, Default)]
pub struct SimIndicator {
    lit: Arc<AtomicBool>,
    switches: Arc<AtomicU32>,
}

impl SimIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_lit(&self) -> bool {
        self.lit.load(Ordering::SeqCst)
    }

    /// Number of ON/OFF changes seen so far.
    pub fn switches(&self) -> u32 {
        self.switches.load(Ordering::SeqCst)
    }
}

impl StatusIndicator for SimIndicator {
    fn set_lit(&mut self, lit: bool) {
        if self.lit.swap(lit, Ordering::SeqCst) != lit {
            self.switches.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted sensor
// ────────────────────────────────────────────────────────────────────────────

/// A sensor that replays a fixed list of raw readings, then keeps repeating
/// the last one.
pub struct ScriptedSensor {
    id: String,
    script: VecDeque<Result<f32, String>>,
    last: f32,
}

impl ScriptedSensor {
    pub fn new(id: impl Into<String>, readings: impl IntoIterator<Item = f32>) -> Self {
        Self {
            id: id.into(),
            script: readings.into_iter().map(Ok).collect(),
            last: f32::NAN,
        }
    }

    /// Queue a driver failure after the readings scripted so far.
    pub fn then_fail(mut self, reason: impl Into<String>) -> Self {
        self.script.push_back(Err(reason.into()));
        self
    }

    /// Queue more readings.
    pub fn then(mut self, readings: impl IntoIterator<Item = f32>) -> Self {
        self.script.extend(readings.into_iter().map(Ok));
        self
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_celsius(&mut self) -> Result<f32, CremaError> {
        match self.script.pop_front() {
            Some(Ok(value)) => {
                self.last = value;
                Ok(value)
            }
            Some(Err(details)) => Err(CremaError::HardwareFault {
                component: self.id.clone(),
                details,
            }),
            None => Ok(self.last),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Boiler thermal model
// ────────────────────────────────────────────────────────────────────────────

/// Integration step of the thermal model.
const STEP_MS: u64 = 100;

/// Physical parameters of the simulated boiler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoilerModel {
    /// Heating element power in watts.
    pub heater_watts: f32,
    /// Heat capacity of water plus boiler body, J/°C.
    pub heat_capacity: f32,
    /// Heat loss to ambient, W/°C.
    pub loss_coefficient: f32,
    pub ambient_celsius: f32,
}

impl Default for BoilerModel {
    /// Roughly a 300 ml single-boiler home machine with a 1 kW element.
    fn default() -> Self {
        Self {
            heater_watts: 1000.0,
            heat_capacity: 1600.0,
            loss_coefficient: 2.0,
            ambient_celsius: 20.0,
        }
    }
}

#[derive(Debug)]
struct BoilerState {
    celsius: f32,
    heater_on: bool,
    last_ms: u64,
}

impl BoilerState {
    fn advance(&mut self, model: &BoilerModel, now_ms: u64) {
        while self.last_ms < now_ms {
            let step = (now_ms - self.last_ms).min(STEP_MS);
            let dt = step as f32 / 1000.0;
            let power = if self.heater_on { model.heater_watts } else { 0.0 };
            let loss = model.loss_coefficient * (self.celsius - model.ambient_celsius);
            self.celsius += (power - loss) / model.heat_capacity * dt;
            self.last_ms += step;
        }
    }
}

/// A simulated boiler.  Clones share the same water.
#[derive(Clone)]
pub struct SimBoiler {
    model: BoilerModel,
    state: Arc<Mutex<BoilerState>>,
    clock: Arc<dyn Clock>,
}

impl SimBoiler {
    pub fn new(model: BoilerModel, initial_celsius: f32, clock: Arc<dyn Clock>) -> Self {
        let state = BoilerState {
            celsius: initial_celsius,
            heater_on: false,
            last_ms: clock.now_ms(),
        };
        Self {
            model,
            state: Arc::new(Mutex::new(state)),
            clock,
        }
    }

    /// The heater SSR of this boiler.
    pub fn relay(&self, id: impl Into<String>) -> Box<BoilerRelay> {
        Box::new(BoilerRelay {
            id: id.into(),
            boiler: self.clone(),
        })
    }

    /// The temperature probe of this boiler.
    pub fn sensor(&self, id: impl Into<String>) -> Box<BoilerProbe> {
        Box::new(BoilerProbe {
            id: id.into(),
            boiler: self.clone(),
        })
    }

    /// Current water temperature.
    pub fn temperature(&self) -> f32 {
        let mut state = lock(&self.state);
        state.advance(&self.model, self.clock.now_ms());
        state.celsius
    }

    pub fn heater_on(&self) -> bool {
        lock(&self.state).heater_on
    }

    fn switch_heater(&self, on: bool) {
        let mut state = lock(&self.state);
        state.advance(&self.model, self.clock.now_ms());
        state.heater_on = on;
    }
}

/// Relay half of a [`SimBoiler`].
pub struct BoilerRelay {
    id: String,
    boiler: SimBoiler,
}

impl Relay for BoilerRelay {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, active: bool) -> Result<(), CremaError> {
        if active != self.boiler.heater_on() {
            trace!(relay = %self.id, active, celsius = self.boiler.temperature(), "heater switched");
        }
        self.boiler.switch_heater(active);
        Ok(())
    }

    fn state(&self) -> bool {
        self.boiler.heater_on()
    }
}

/// Sensor half of a [`SimBoiler`].
pub struct BoilerProbe {
    id: String,
    boiler: SimBoiler,
}

impl TemperatureSensor for BoilerProbe {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_celsius(&mut self) -> Result<f32, CremaError> {
        Ok(self.boiler.temperature())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
