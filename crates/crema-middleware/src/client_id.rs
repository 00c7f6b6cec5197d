//! Client identifiers for broker connections.
//!
//! Every connection attempt presents a fresh identifier so a half-dead
//! session still held by the broker never collides with the new one.

use uuid::Uuid;

/// Produces the identifier for the next connection attempt.
pub trait ClientIdSource: Send {
    fn next_id(&mut self) -> String;
}

/// `<prefix>-<8 hex digits>`, drawn from a v4 UUID on every call.
#[derive(Debug, Clone)]
pub struct RandomClientId {
    prefix: String,
}

impl RandomClientId {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl ClientIdSource for RandomClientId {
    fn next_id(&mut self) -> String {
        let hex = Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.prefix, &hex[..8])
    }
}

/// `<prefix>-1`, `<prefix>-2`, …  Deterministic, for tests and replays.
#[derive(Debug, Clone)]
pub struct SequentialClientId {
    prefix: String,
    issued: u64,
}

impl SequentialClientId {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            issued: 0,
        }
    }
}

impl ClientIdSource for SequentialClientId {
    fn next_id(&mut self) -> String {
        self.issued += 1;
        format!("{}-{}", self.prefix, self.issued)
    }
}
