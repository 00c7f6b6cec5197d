//! [`Supervisor`] – strings control cycles together.
//!
//! Each iteration:
//!
//! 1. apply remote commands queued by the previous pump, as a new
//!    configuration snapshot;
//! 2. run one [`ControlLoop`] cycle (blocks for one window);
//! 3. offer telemetry to the [`TelemetryGate`] (skipped on a sensor fault);
//! 4. let the [`LinkScheduler`] maintain the connection;
//! 5. pump the transport and queue whatever commands arrived.
//!
//! Steps 3–5 are single non-blocking calls, so the window cadence set by
//! step 2 is preserved whatever the network does.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crema_control::{ControlLoop, CycleReport};
use crema_hal::Clock;
use crema_middleware::{ClientIdSource, Transport};
use crema_types::{CremaError, RemoteCommand, SensorConfig, TelemetryConfig};
use tracing::{info, warn};

use crate::gate::{PublishOutcome, TelemetryGate, TelemetrySnapshot};
use crate::link::{LinkScheduler, LinkStatus};

/// Everything that happened in one supervised iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub report: CycleReport,
    /// `None` when the cycle had no valid sample.
    pub publish: Option<PublishOutcome>,
    pub link: LinkStatus,
    /// Commands received by this iteration's pump, applied next iteration.
    pub commands_received: usize,
}

pub struct Supervisor {
    control: ControlLoop,
    sensor_config: SensorConfig,
    gate: TelemetryGate,
    link: LinkScheduler,
    transport: Box<dyn Transport>,
    clock: Arc<dyn Clock>,
    pending: VecDeque<RemoteCommand>,
    cycles: u64,
}

impl Supervisor {
    pub fn new(
        control: ControlLoop,
        sensor_config: SensorConfig,
        telemetry: &TelemetryConfig,
        transport: Box<dyn Transport>,
        ids: Box<dyn ClientIdSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            control,
            sensor_config,
            gate: TelemetryGate::new(telemetry),
            link: LinkScheduler::new(telemetry.reconnect_interval_ms, ids),
            transport,
            clock,
            pending: VecDeque::new(),
            cycles: 0,
        }
    }

    pub fn control(&self) -> &ControlLoop {
        &self.control
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Cycles completed so far.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Queue a command for the start of the next cycle.
    pub fn submit(&mut self, command: RemoteCommand) {
        self.pending.push_back(command);
    }

    pub fn run_cycle(&mut self) -> CycleOutcome {
        self.apply_pending();

        let report = self.control.cycle();
        self.cycles += 1;
        let now_ms = self.clock.now_ms();

        let publish = report.sample.map(|sample| {
            let snapshot = TelemetrySnapshot {
                temperature: sample.celsius,
                setpoint: self.control.config().setpoint,
                duty: report.duty,
                rate: report.rate.celsius_per_sec,
            };
            self.gate.offer(now_ms, &snapshot, self.transport.as_mut())
        });

        let link = self.link.maintain(now_ms, self.transport.as_mut());

        let received = self.transport.pump();
        let commands_received = received.len();
        self.pending.extend(received);

        CycleOutcome {
            report,
            publish,
            link,
            commands_received,
        }
    }

    /// Run until `shutdown` is set or `max_cycles` cycles have completed,
    /// then leave the heater off.  Returns the number of cycles run.
    pub fn run(&mut self, shutdown: &AtomicBool, max_cycles: Option<u64>) -> u64 {
        let started = self.cycles;
        info!(
            setpoint = self.control.config().setpoint,
            window_ms = self.control.config().window_ms,
            "controller running"
        );
        while !shutdown.load(Ordering::SeqCst) {
            if max_cycles.is_some_and(|max| self.cycles - started >= max) {
                break;
            }
            self.run_cycle();
        }
        self.control.shutdown();
        let ran = self.cycles - started;
        info!(cycles = ran, "controller stopped, heater off");
        ran
    }

    fn apply_pending(&mut self) {
        while let Some(command) = self.pending.pop_front() {
            match command {
                RemoteCommand::SetSetpoint(value) => {
                    if let Err(e) = self.change_setpoint(value) {
                        warn!(setpoint = value, error = %e, "remote setpoint rejected");
                    }
                }
            }
        }
    }

    fn change_setpoint(&mut self, value: f32) -> Result<(), CremaError> {
        if !self.sensor_config.is_plausible(value) {
            return Err(CremaError::Config(format!(
                "setpoint {value} outside [{}, {}]",
                self.sensor_config.min_celsius, self.sensor_config.max_celsius
            )));
        }
        let previous = self.control.config().setpoint;
        let snapshot = self.control.config().with_setpoint(value);
        self.control.reconfigure(snapshot)?;
        info!(from = previous, to = value, "setpoint changed");
        Ok(())
    }
}
