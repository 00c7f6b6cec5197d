//! [`LinkScheduler`] – keeps the broker link up without ever stalling the
//! control cycle.
//!
//! While the transport is down, one connect attempt is made per retry
//! interval, each under a fresh client identifier.  The attempt itself is
//! the transport's bounded connect; nothing here waits.

use crema_middleware::{ClientIdSource, Transport};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// Link was already up.
    Connected,
    /// An attempt was made this call and succeeded.
    Reconnected { client_id: String },
    /// An attempt was made this call and failed.
    AttemptFailed { client_id: String },
    /// Link is down and the retry interval has not elapsed.
    Waiting,
}

pub struct LinkScheduler {
    retry_interval_ms: u64,
    ids: Box<dyn ClientIdSource>,
    last_attempt_ms: Option<u64>,
    was_connected: bool,
    attempts: u64,
}

impl LinkScheduler {
    pub fn new(retry_interval_ms: u64, ids: Box<dyn ClientIdSource>) -> Self {
        Self {
            retry_interval_ms,
            ids,
            last_attempt_ms: None,
            was_connected: false,
            attempts: 0,
        }
    }

    /// Connect attempts made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Check the link and, if it is down and an attempt is due, try once.
    pub fn maintain(&mut self, now_ms: u64, transport: &mut dyn Transport) -> LinkStatus {
        if transport.is_connected() {
            self.was_connected = true;
            return LinkStatus::Connected;
        }
        if self.was_connected {
            info!("telemetry link down, will retry");
            self.was_connected = false;
        }

        let due = match self.last_attempt_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.retry_interval_ms,
        };
        if !due {
            return LinkStatus::Waiting;
        }

        let client_id = self.ids.next_id();
        self.attempts += 1;
        self.last_attempt_ms = Some(now_ms);
        if transport.connect(&client_id) {
            info!(client_id = %client_id, "telemetry link up");
            // A later drop retries straight away.
            self.last_attempt_ms = None;
            self.was_connected = true;
            LinkStatus::Reconnected { client_id }
        } else {
            debug!(client_id = %client_id, retry_ms = self.retry_interval_ms, "connect attempt failed");
            LinkStatus::AttemptFailed { client_id }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crema_middleware::SequentialClientId;
    use crema_types::{CremaError, RemoteCommand};

    /// Accepts a connect only while `up` is set; records ids.
    #[derive(Default)]
    struct FlakyTransport {
        up: bool,
        connected: bool,
        ids: Vec<String>,
    }

    impl Transport for FlakyTransport {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn connect(&mut self, client_id: &str) -> bool {
            self.ids.push(client_id.to_string());
            self.connected = self.up;
            self.connected
        }

        fn pump(&mut self) -> Vec<RemoteCommand> {
            Vec::new()
        }

        fn publish(&mut self, _topic: &str, _payload: &str) -> Result<(), CremaError> {
            Ok(())
        }
    }

    fn scheduler() -> LinkScheduler {
        LinkScheduler::new(5000, Box::new(SequentialClientId::new("crema")))
    }

    #[test]
    fn first_attempt_is_immediate() {
        let mut link = scheduler();
        let mut transport = FlakyTransport {
            up: true,
            ..Default::default()
        };
        assert_eq!(
            link.maintain(0, &mut transport),
            LinkStatus::Reconnected {
                client_id: "crema-1".to_string()
            }
        );
        assert_eq!(link.maintain(1000, &mut transport), LinkStatus::Connected);
        assert_eq!(link.attempts(), 1);
    }

    #[test]
    fn at_most_one_attempt_per_retry_interval() {
        let mut link = scheduler();
        let mut transport = FlakyTransport::default();
        // Twenty one-second cycles with the broker down.
        for now in (0..20_000).step_by(1000) {
            link.maintain(now, &mut transport);
        }
        // 0, 5, 10 and 15 s.
        assert_eq!(transport.ids, vec!["crema-1", "crema-2", "crema-3", "crema-4"]);
    }

    #[test]
    fn every_attempt_uses_a_fresh_id() {
        let mut link = scheduler();
        let mut transport = FlakyTransport::default();
        link.maintain(0, &mut transport);
        transport.up = true;
        assert_eq!(link.maintain(1000, &mut transport), LinkStatus::Waiting);
        assert_eq!(
            link.maintain(5000, &mut transport),
            LinkStatus::Reconnected {
                client_id: "crema-2".to_string()
            }
        );
    }

    #[test]
    fn drop_after_success_retries_immediately() {
        let mut link = scheduler();
        let mut transport = FlakyTransport {
            up: true,
            ..Default::default()
        };
        link.maintain(0, &mut transport);
        transport.connected = false;
        transport.up = false;
        assert_eq!(
            link.maintain(1000, &mut transport),
            LinkStatus::AttemptFailed {
                client_id: "crema-2".to_string()
            }
        );
        assert_eq!(link.maintain(2000, &mut transport), LinkStatus::Waiting);
    }
}
