//! `crema-middleware` – everything between the controller and the network.
//!
//! The control loop never talks to a socket directly.  It hands telemetry
//! to a [`Transport`] and receives [`RemoteCommand`][crema_types::RemoteCommand]s
//! back from it; which wire sits behind the trait is a deployment choice.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.
//! - [`transport`] – The [`Transport`] trait and [`BusTransport`], an
//!   in-process broker on top of the bus.
//! - [`tcp`] – [`TcpTransport`], a line-oriented link to a remote broker.
//! - [`client_id`] – Per-connection client identifier generators.

pub mod bus;
pub mod client_id;
pub mod tcp;
pub mod transport;

pub use bus::{EventBus, Topic, TopicReceiver};
pub use client_id::{ClientIdSource, RandomClientId, SequentialClientId};
pub use tcp::TcpTransport;
pub use transport::{BrokerHandle, BusTransport, Transport};
