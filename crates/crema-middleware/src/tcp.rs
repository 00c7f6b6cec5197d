//! [`TcpTransport`] – line-oriented link to a remote broker.
//!
//! Wire format, one message per line in both directions:
//!
//! ```text
//! <topic> <payload>\n
//! ```
//!
//! On connect the client announces itself with `CONNECT <client_id>`.
//! Inbound lines on `<prefix>/setpoint/set` become
//! [`RemoteCommand::SetSetpoint`]; the payload is either a bare decimal or
//! the JSON form of the command.
//!
//! The broker address is resolved once, in [`TcpTransport::new`], before the
//! control loop starts.  After that only the connect call waits, and then for
//! at most `connect_timeout`.
//! Afterwards the socket is non-blocking: a write that would block stays in
//! a bounded outbox and [`pump`][Transport::pump] reads at most one inbox
//! worth of what has arrived, leaving the rest for the next cycle.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crema_types::{CremaError, RemoteCommand, TelemetryConfig};
use tracing::{debug, info, warn};

use crate::transport::Transport;

const OUTBOX_LIMIT: usize = 16 * 1024;
const INBOX_LIMIT: usize = 4 * 1024;
const READ_CHUNK: usize = 512;
const COMMANDS_PER_PUMP: usize = 8;

pub struct TcpTransport {
    broker: String,
    addr: SocketAddr,
    connect_timeout: Duration,
    command_topic: String,
    stream: Option<TcpStream>,
    outbox: Vec<u8>,
    inbox: Vec<u8>,
}

impl TcpTransport {
    /// Resolve `config.broker` and build a disconnected transport.
    ///
    /// # Errors
    ///
    /// Returns [`CremaError::Transport`] if the broker address cannot be
    /// resolved.
    pub fn new(config: &TelemetryConfig) -> Result<Self, CremaError> {
        let addr = resolve(&config.broker)?;
        debug!(broker = %config.broker, %addr, "broker address resolved");
        Ok(Self {
            broker: config.broker.clone(),
            addr,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms.max(1)),
            command_topic: config.topic("setpoint/set"),
            stream: None,
            outbox: Vec::new(),
            inbox: Vec::new(),
        })
    }

    /// The address every connect attempt dials.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn open(&self, client_id: &str) -> Result<TcpStream, CremaError> {
        let addr = self.addr;
        let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| CremaError::Transport(format!("connect to {addr} failed: {e}")))?;
        stream
            .set_nodelay(true)
            .and_then(|_| stream.set_nonblocking(true))
            .map_err(|e| CremaError::Transport(format!("socket setup failed: {e}")))?;
        debug!(%addr, client_id, "tcp link open");
        Ok(stream)
    }

    fn disconnect(&mut self, reason: &str) {
        if self.stream.take().is_some() {
            info!(broker = %self.broker, reason, "broker link lost");
        }
        self.outbox.clear();
        self.inbox.clear();
    }

    /// Write as much of the outbox as the socket accepts right now.
    fn flush(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        while !self.outbox.is_empty() {
            match stream.write(&self.outbox) {
                Ok(0) => {
                    self.disconnect("write returned zero");
                    return;
                }
                Ok(n) => {
                    self.outbox.drain(..n);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.disconnect(&e.to_string());
                    return;
                }
            }
        }
    }

    /// Pull waiting bytes until the inbox holds `INBOX_LIMIT` bytes.  Anything
    /// beyond that stays in the socket buffer for the next pump.
    fn fill_inbox(&mut self) {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let room = INBOX_LIMIT.saturating_sub(self.inbox.len());
            if room == 0 {
                return;
            }
            let Some(stream) = self.stream.as_mut() else {
                return;
            };
            match stream.read(&mut chunk[..room.min(READ_CHUNK)]) {
                Ok(0) => {
                    self.disconnect("closed by broker");
                    return;
                }
                Ok(n) => self.inbox.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.disconnect(&e.to_string());
                    return;
                }
            }
        }
    }

    /// Take complete lines off the inbox, at most `COMMANDS_PER_PUMP`
    /// commands per call.
    fn take_commands(&mut self) -> Vec<RemoteCommand> {
        let mut commands = Vec::new();
        while commands.len() < COMMANDS_PER_PUMP {
            let Some(end) = self.inbox.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.inbox.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            match parse_command_line(line.trim(), &self.command_topic) {
                Some(command) => commands.push(command),
                None if line.trim().is_empty() => {}
                None => debug!(line = %line.trim(), "ignoring inbound line"),
            }
        }
        if self.inbox.len() >= INBOX_LIMIT && !self.inbox.contains(&b'\n') {
            warn!(bytes = self.inbox.len(), "discarding unterminated inbound line");
            self.inbox.clear();
        }
        commands
    }
}

fn resolve(broker: &str) -> Result<SocketAddr, CremaError> {
    broker
        .to_socket_addrs()
        .map_err(|e| CremaError::Transport(format!("cannot resolve {broker}: {e}")))?
        .next()
        .ok_or_else(|| CremaError::Transport(format!("{broker} resolved to nothing")))
}

/// Parse `"<topic> <payload>"` into a command if `topic` is the command topic.
pub fn parse_command_line(line: &str, command_topic: &str) -> Option<RemoteCommand> {
    let (topic, payload) = line.split_once(char::is_whitespace)?;
    if topic != command_topic {
        return None;
    }
    let payload = payload.trim();
    if payload.starts_with('{') {
        return serde_json::from_str(payload).ok();
    }
    payload.parse::<f32>().ok().map(RemoteCommand::SetSetpoint)
}

impl Transport for TcpTransport {
    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn connect(&mut self, client_id: &str) -> bool {
        self.disconnect("reconnecting");
        match self.open(client_id) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.outbox
                    .extend_from_slice(format!("CONNECT {client_id}\n").as_bytes());
                self.flush();
                self.is_connected()
            }
            Err(e) => {
                debug!(error = %e, "connect attempt failed");
                false
            }
        }
    }

    fn pump(&mut self) -> Vec<RemoteCommand> {
        if self.stream.is_none() {
            return Vec::new();
        }
        self.flush();
        self.fill_inbox();
        self.take_commands()
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), CremaError> {
        if self.stream.is_none() {
            return Err(CremaError::Transport("not connected".to_string()));
        }
        let line = format!("{topic} {payload}\n");
        if self.outbox.len() + line.len() > OUTBOX_LIMIT {
            return Err(CremaError::Transport(format!(
                "outbox full, dropped message on {topic}"
            )));
        }
        self.outbox.extend_from_slice(line.as_bytes());
        self.flush();
        if self.stream.is_none() {
            return Err(CremaError::Transport("link dropped during publish".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    fn config_for(listener: &TcpListener) -> TelemetryConfig {
        TelemetryConfig {
            broker: listener.local_addr().unwrap().to_string(),
            connect_timeout_ms: 500,
            ..TelemetryConfig::default()
        }
    }

    fn pump_until<F>(transport: &mut TcpTransport, mut done: F) -> Vec<RemoteCommand>
    where
        F: FnMut(&TcpTransport, &[RemoteCommand]) -> bool,
    {
        let mut received = Vec::new();
        for _ in 0..200 {
            received.extend(transport.pump());
            if done(transport, &received) {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        received
    }

    #[test]
    fn parses_decimal_and_json_payloads() {
        let topic = "espresso/setpoint/set";
        assert_eq!(
            parse_command_line("espresso/setpoint/set 93.5", topic),
            Some(RemoteCommand::SetSetpoint(93.5))
        );
        assert_eq!(
            parse_command_line(
                r#"espresso/setpoint/set {"command":"set_setpoint","value":92.0}"#,
                topic
            ),
            Some(RemoteCommand::SetSetpoint(92.0))
        );
        assert_eq!(parse_command_line("espresso/temp 104.00", topic), None);
        assert_eq!(parse_command_line("espresso/setpoint/set hot", topic), None);
        assert_eq!(parse_command_line("garbage", topic), None);
    }

    #[test]
    fn refused_connect_returns_false() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let config = config_for(&listener);
        drop(listener);

        let mut transport = TcpTransport::new(&config).unwrap();
        assert!(!transport.connect("crema-1"));
        assert!(!transport.is_connected());
        assert!(transport.publish("espresso/temp", "1.00").is_err());
    }

    #[test]
    fn publishes_lines_and_receives_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = TcpTransport::new(&config_for(&listener)).unwrap();
        assert!(transport.connect("crema-7"));
        let (server, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(server.try_clone().unwrap());

        transport.publish("espresso/temp", "104.87").unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "CONNECT crema-7\n");
        line.clear();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "espresso/temp 104.87\n");

        let mut writer = server;
        writer
            .write_all(b"espresso/other 1\nespresso/setpoint/set 93.5\n")
            .unwrap();
        let commands = pump_until(&mut transport, |_, got| !got.is_empty());
        assert_eq!(commands, vec![RemoteCommand::SetSetpoint(93.5)]);
        assert!(transport.is_connected());
    }

    #[test]
    fn broker_close_is_detected_by_pump() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = TcpTransport::new(&config_for(&listener)).unwrap();
        assert!(transport.connect("crema-1"));
        let (server, _) = listener.accept().unwrap();
        drop(server);

        pump_until(&mut transport, |t, _| !t.is_connected());
        assert!(!transport.is_connected());
    }

    #[test]
    fn split_lines_are_reassembled() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = TcpTransport::new(&config_for(&listener)).unwrap();
        assert!(transport.connect("crema-1"));
        let (mut server, _) = listener.accept().unwrap();

        server.write_all(b"espresso/setpoint/").unwrap();
        server.flush().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(transport.pump().is_empty());

        server.write_all(b"set 96.25\n").unwrap();
        let commands = pump_until(&mut transport, |_, got| !got.is_empty());
        assert_eq!(commands, vec![RemoteCommand::SetSetpoint(96.25)]);
    }

    #[test]
    fn broker_address_is_resolved_at_construction() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let transport = TcpTransport::new(&config_for(&listener)).unwrap();
        assert_eq!(transport.addr(), listener.local_addr().unwrap());

        let config = TelemetryConfig {
            broker: "espresso-broker-without-port".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            TcpTransport::new(&config),
            Err(CremaError::Transport(_))
        ));
    }

    #[test]
    fn endless_inbound_lines_do_not_hold_up_pump() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = TcpTransport::new(&config_for(&listener)).unwrap();
        assert!(transport.connect("crema-1"));
        let (mut server, _) = listener.accept().unwrap();
        std::thread::spawn(move || {
            let noise = b"espresso/other 1\n".repeat(4096);
            while server.write_all(&noise).is_ok() {}
        });
        std::thread::sleep(Duration::from_millis(50));

        for _ in 0..20 {
            let started = std::time::Instant::now();
            assert!(transport.pump().is_empty());
            assert!(started.elapsed() < Duration::from_millis(500));
            assert!(transport.inbox.len() <= INBOX_LIMIT);
        }
        assert!(transport.is_connected());
    }

    #[test]
    fn command_burst_is_spread_over_pumps() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = TcpTransport::new(&config_for(&listener)).unwrap();
        assert!(transport.connect("crema-1"));
        let (mut server, _) = listener.accept().unwrap();
        let burst = "espresso/setpoint/set 94.0\n".repeat(COMMANDS_PER_PUMP + 4);
        server.write_all(burst.as_bytes()).unwrap();

        let first = pump_until(&mut transport, |_, got| !got.is_empty());
        assert!(first.len() <= COMMANDS_PER_PUMP);
        let rest = pump_until(&mut transport, |_, got| {
            first.len() + got.len() == COMMANDS_PER_PUMP + 4
        });
        assert_eq!(first.len() + rest.len(), COMMANDS_PER_PUMP + 4);
    }

    #[test]
    fn overlong_line_is_discarded() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut transport = TcpTransport::new(&config_for(&listener)).unwrap();
        assert!(transport.connect("crema-1"));
        let (mut server, _) = listener.accept().unwrap();
        server.write_all(&vec![b'x'; INBOX_LIMIT + 100]).unwrap();
        server.write_all(b"\nespresso/setpoint/set 95.5\n").unwrap();

        let commands = pump_until(&mut transport, |_, got| !got.is_empty());
        assert_eq!(commands, vec![RemoteCommand::SetSetpoint(95.5)]);
    }
}
