//! # Transport Session Interface
//!
//! The boundary between the telemetry agent and whatever performs DNS, TCP,
//! TLS and MQTT framing. [`MqttSession`](crate::client::MqttSession) is the
//! in-crate implementation; firmware with its own stack implements
//! [`TransportSession`] directly.

use embassy_net::IpAddress;

use crate::config::TlsConfig;
use crate::error::ConnectReasonCode;
use crate::runtime::PublishRequest;

/// Client parameters sent in the MQTT `CONNECT` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo<'a> {
    /// Client identifier, the device identity.
    pub client_id: &'a str,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
    /// Optional user name.
    pub username: Option<&'a str>,
    /// Optional password.
    pub password: Option<&'a str>,
}

/// Everything the transport needs to open an authenticated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRequest<'a> {
    /// Resolved broker address.
    pub address: IpAddress,
    /// Broker port.
    pub port: u16,
    /// Hostname the address was resolved from, for TLS server name checks.
    pub broker_host: &'a str,
    /// `CONNECT` parameters.
    pub client: ClientInfo<'a>,
    /// TLS material; `None` means plain TCP.
    pub tls: Option<TlsConfig<'a>>,
}

/// Outcome of a connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectStatus {
    /// The broker accepted the session.
    Accepted,
    /// The broker refused the session.
    Rejected(ConnectReasonCode),
}

/// Completions and notifications reported by [`TransportSession::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionEvent {
    /// A QoS 1 publish was acknowledged.
    PublishAcknowledged {
        /// Identifier of the acknowledged publish.
        packet_id: u16,
    },
    /// The broker answered a keep-alive probe.
    PingResponse,
    /// A packet the agent has no use for, by MQTT packet type.
    Unhandled(u8),
}

/// A connection to an MQTT broker as seen by the telemetry agent.
///
/// All completions are delivered through the returned futures and
/// [`poll`](TransportSession::poll); the agent drives everything from one task.
#[allow(async_fn_in_trait)]
pub trait TransportSession {
    /// The error type returned by the session.
    type Error: core::fmt::Debug;

    /// Resolve the broker hostname. `Ok(None)` means the name has no address.
    async fn resolve(&mut self, host: &str) -> Result<Option<IpAddress>, Self::Error>;

    /// Open the stream, run the TLS handshake if requested and send `CONNECT`.
    async fn connect(&mut self, request: &ConnectRequest<'_>)
    -> Result<ConnectStatus, Self::Error>;

    /// Send a `PUBLISH`.
    ///
    /// Returns the packet identifier for QoS 1 and 2, whose completion is
    /// later reported by [`poll`](TransportSession::poll).
    async fn publish(&mut self, request: &PublishRequest<'_>) -> Result<Option<u16>, Self::Error>;

    /// Wait for the next session event, servicing keep-alive meanwhile.
    ///
    /// Must be cancel-safe: the agent drops this future whenever a telemetry
    /// tick becomes due or its wait-for-work bound expires. A packet whose
    /// write was interrupted must be completed before the next one is sent.
    async fn poll(&mut self) -> Result<SessionEvent, Self::Error>;

    /// Whether the session is still up.
    fn is_connected(&self) -> bool;
}
