//! [`TelemetryGate`] – decides when telemetry goes out.
//!
//! At most one publish round per interval, and only while the transport is
//! connected.  A round sends four channels; a failed channel is logged and
//! left for the next round.  The first round goes out as soon as the link
//! is up.

use crema_middleware::Transport;
use crema_types::TelemetryConfig;
use tracing::{debug, warn};

/// Values published in one round.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub temperature: f32,
    pub setpoint: f32,
    /// Applied duty in window units.
    pub duty: f32,
    /// °C/s.
    pub rate: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// All four channels went out.
    Published,
    /// A round was attempted but `failed` channels were rejected.
    Partial { failed: usize },
    /// The interval since the last round has not elapsed.
    NotDue,
    /// Transport down; nothing attempted.
    Disconnected,
}

pub struct TelemetryGate {
    interval_ms: u64,
    topics: [String; 4],
    last_round_ms: Option<u64>,
}

impl TelemetryGate {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            interval_ms: config.publish_interval_ms,
            topics: [
                config.topic("temp"),
                config.topic("setpoint"),
                config.topic("duty"),
                config.topic("rate_of_change"),
            ],
            last_round_ms: None,
        }
    }

    /// Channel names in publish order.
    pub fn topics(&self) -> &[String; 4] {
        &self.topics
    }

    fn is_due(&self, now_ms: u64) -> bool {
        match self.last_round_ms {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= self.interval_ms,
        }
    }

    /// Publish `snapshot` if a round is due and the link is up.
    pub fn offer(
        &mut self,
        now_ms: u64,
        snapshot: &TelemetrySnapshot,
        transport: &mut dyn Transport,
    ) -> PublishOutcome {
        if !self.is_due(now_ms) {
            return PublishOutcome::NotDue;
        }
        if !transport.is_connected() {
            debug!("telemetry skipped, transport disconnected");
            return PublishOutcome::Disconnected;
        }

        self.last_round_ms = Some(now_ms);
        let values = [
            snapshot.temperature,
            snapshot.setpoint,
            snapshot.duty,
            snapshot.rate,
        ];
        let mut failed = 0;
        for (topic, value) in self.topics.iter().zip(values) {
            if let Err(e) = transport.publish(topic, &format_payload(value)) {
                warn!(topic = %topic, error = %e, "telemetry publish failed");
                failed += 1;
            }
        }

        if failed == 0 {
            PublishOutcome::Published
        } else {
            PublishOutcome::Partial { failed }
        }
    }
}

/// Two fraction digits, e.g. `104.87`.
pub fn format_payload(value: f32) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crema_types::{CremaError, RemoteCommand};

    /// Records every publish; can be told to reject some topics.
    #[derive(Default)]
    struct RecordingTransport {
        connected: bool,
        reject: Vec<String>,
        sent: Vec<(String, String)>,
    }

    impl Transport for RecordingTransport {
        fn is_connected(&self) -> bool {
            self.connected
        }

        fn connect(&mut self, _client_id: &str) -> bool {
            self.connected = true;
            true
        }

        fn pump(&mut self) -> Vec<RemoteCommand> {
            Vec::new()
        }

        fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CremaError> {
            if self.reject.iter().any(|t| t == topic) {
                return Err(CremaError::Transport("rejected".to_string()));
            }
            self.sent.push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    fn snapshot() -> TelemetrySnapshot {
        TelemetrySnapshot {
            temperature: 104.866,
            setpoint: 105.0,
            duty: 250.0,
            rate: -0.126,
        }
    }

    fn connected() -> RecordingTransport {
        RecordingTransport {
            connected: true,
            ..Default::default()
        }
    }

    #[test]
    fn publishes_four_channels_with_two_decimals() {
        let mut gate = TelemetryGate::new(&TelemetryConfig::default());
        let mut transport = connected();
        assert_eq!(
            gate.offer(0, &snapshot(), &mut transport),
            PublishOutcome::Published
        );
        let sent: Vec<(&str, &str)> = transport
            .sent
            .iter()
            .map(|(t, p)| (t.as_str(), p.as_str()))
            .collect();
        assert_eq!(
            sent,
            vec![
                ("espresso/temp", "104.87"),
                ("espresso/setpoint", "105.00"),
                ("espresso/duty", "250.00"),
                ("espresso/rate_of_change", "-0.13"),
            ]
        );
    }

    #[test]
    fn at_most_one_round_per_interval() {
        let mut gate = TelemetryGate::new(&TelemetryConfig::default());
        let mut transport = connected();
        let mut rounds = 0;
        // Ten seconds of one-second cycles.
        for now in (1000..=10_000).step_by(1000) {
            if gate.offer(now, &snapshot(), &mut transport) == PublishOutcome::Published {
                rounds += 1;
            }
        }
        // 1 s, 3 s, 5 s, 7 s, 9 s.
        assert_eq!(rounds, 5);
        assert_eq!(transport.sent.len(), 20);
    }

    #[test]
    fn disconnected_skips_without_consuming_interval() {
        let mut gate = TelemetryGate::new(&TelemetryConfig::default());
        let mut transport = RecordingTransport::default();
        assert_eq!(
            gate.offer(0, &snapshot(), &mut transport),
            PublishOutcome::Disconnected
        );
        assert!(transport.sent.is_empty());

        transport.connected = true;
        assert_eq!(
            gate.offer(500, &snapshot(), &mut transport),
            PublishOutcome::Published
        );
    }

    #[test]
    fn failed_channel_is_not_retried_in_the_same_round() {
        let mut gate = TelemetryGate::new(&TelemetryConfig::default());
        let mut transport = RecordingTransport {
            connected: true,
            reject: vec!["espresso/duty".to_string()],
            ..Default::default()
        };
        assert_eq!(
            gate.offer(0, &snapshot(), &mut transport),
            PublishOutcome::Partial { failed: 1 }
        );
        assert_eq!(transport.sent.len(), 3);
        assert_eq!(
            gate.offer(1000, &snapshot(), &mut transport),
            PublishOutcome::NotDue
        );
        assert_eq!(transport.sent.len(), 3);
    }

    #[test]
    fn empty_prefix_uses_bare_channel_names() {
        let config = TelemetryConfig {
            topic_prefix: String::new(),
            ..TelemetryConfig::default()
        };
        let gate = TelemetryGate::new(&config);
        assert_eq!(gate.topics()[0], "temp");
        assert_eq!(gate.topics()[3], "rate_of_change");
    }
}
