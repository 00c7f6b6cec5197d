//! The connectivity boundary.
//!
//! The controller only ever sees a [`Transport`]: is the link up, try one
//! connect, publish one telemetry record, and pump the link once per cycle
//! to collect any commands that arrived.  None of these calls may block for
//! longer than a single bounded attempt.
//!
//! [`BusTransport`] is the in-process implementation.  It routes telemetry
//! onto the [`EventBus`] and drains remote commands from it, with a shared
//! [`BrokerHandle`] standing in for the broker so outages can be simulated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crema_types::{CremaError, Event, EventPayload, RemoteCommand, TelemetryRecord};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::bus::{EventBus, Topic, TopicReceiver};

/// A connection-oriented publish/subscribe link.
pub trait Transport: Send {
    /// `true` while a session is established.
    fn is_connected(&self) -> bool;

    /// Try once to establish a session as `client_id`.  Returns whether the
    /// session is up afterwards.  Must return within a bounded time.
    fn connect(&mut self, client_id: &str) -> bool;

    /// Service the link: flush pending output, read pending input, detect a
    /// dropped session.  Called every cycle whatever the connection state.
    /// Returns the commands received since the previous pump.
    fn pump(&mut self) -> Vec<RemoteCommand>;

    /// Publish one record.  Best effort: failures are reported, never retried.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CremaError>;
}

/// Shared view of the in-process broker.
///
/// Clones share state.  Flipping [`set_online`][Self::set_online] to `false`
/// drops every session on its next pump and refuses new connects.
#[derive(Clone, Debug)]
pub struct BrokerHandle {
    online: Arc<AtomicBool>,
    bus: EventBus,
    connect_log: Arc<Mutex<Vec<String>>>,
}

impl BrokerHandle {
    /// A broker that is online and routes over `bus`.
    pub fn new(bus: EventBus) -> Self {
        Self {
            online: Arc::new(AtomicBool::new(true)),
            bus,
            connect_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Inject a remote command as an operator would.
    pub fn send_command(&self, source: &str, command: RemoteCommand) -> Result<usize, CremaError> {
        self.bus
            .publish_to(Topic::Commands, Event::new(source, EventPayload::Command(command)))
    }

    /// Client identifiers of every connect attempt so far, failed ones included.
    pub fn connect_attempts(&self) -> Vec<String> {
        match self.connect_log.lock() {
            Ok(log) => log.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record_attempt(&self, client_id: &str) {
        let mut log = match self.connect_log.lock() {
            Ok(log) => log,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.push(client_id.to_string());
    }
}

struct Session {
    client_id: String,
    commands: TopicReceiver,
}

/// [`Transport`] over the in-process [`EventBus`].
pub struct BusTransport {
    broker: BrokerHandle,
    session: Option<Session>,
}

impl BusTransport {
    pub fn new(broker: BrokerHandle) -> Self {
        Self {
            broker,
            session: None,
        }
    }

    /// Identifier of the live session, if any.
    pub fn client_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.client_id.as_str())
    }

    fn drop_session(&mut self) {
        if let Some(session) = self.session.take() {
            info!(client_id = %session.client_id, "broker session lost");
        }
    }
}

impl Transport for BusTransport {
    fn is_connected(&self) -> bool {
        self.session.is_some() && self.broker.is_online()
    }

    fn connect(&mut self, client_id: &str) -> bool {
        self.broker.record_attempt(client_id);
        if !self.broker.is_online() {
            debug!(client_id, "broker offline, connect refused");
            return false;
        }
        // Subscribing at connect time means commands sent while offline are
        // not delivered, as with a clean broker session.
        self.session = Some(Session {
            client_id: client_id.to_string(),
            commands: self.broker.bus.subscribe_to(Topic::Commands),
        });
        true
    }

    fn pump(&mut self) -> Vec<RemoteCommand> {
        if !self.broker.is_online() {
            self.drop_session();
            return Vec::new();
        }
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };

        let mut commands = Vec::new();
        loop {
            match session.commands.try_recv() {
                Ok(event) => match event.payload {
                    EventPayload::Command(command) => commands.push(command),
                    other => debug!(?other, "ignoring non-command event on command topic"),
                },
                Err(TryRecvError::Lagged(missed)) => {
                    warn!(missed, "command subscriber lagged, commands dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        commands
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CremaError> {
        let session = match self.session.as_ref() {
            Some(session) if self.broker.is_online() => session,
            _ => return Err(CremaError::Transport("not connected".to_string())),
        };
        let record = TelemetryRecord {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        self.broker.bus.publish_to(
            Topic::Telemetry,
            Event::new(session.client_id.clone(), EventPayload::Telemetry(record)),
        )?;
        Ok(())
    }
}
