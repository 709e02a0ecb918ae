//! # Error Types
//!
//! Errors raised by the telemetry agent, from broker negotiation failures that
//! halt the device down to the wire-level problems of the MQTT session.

use core::fmt;

use crate::runtime::ConnectionState;

/// Represents the reason codes for a connection refusal (`CONNACK`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReasonCode {
    /// The connection was accepted.
    Success,
    /// The broker does not support the requested MQTT protocol version.
    UnacceptableProtocolVersion,
    /// The client identifier is not valid.
    IdentifierRejected,
    /// The broker is unavailable.
    ServerUnavailable,
    /// The username or password is not valid.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// An unknown or unspecified error occurred.
    Other(u8),
}

impl From<u8> for ConnectReasonCode {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Success,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            _ => Self::Other(val),
        }
    }
}

/// Enumerates MQTT protocol errors seen while talking to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// An invalid packet type was received.
    InvalidPacketType(u8),
    /// A packet arrived that is valid MQTT but not expected at this point.
    UnexpectedPacket(u8),
    /// A packet was received that was not correctly formed.
    MalformedPacket,
    /// A topic or payload exceeds what the wire format can carry.
    PayloadTooLarge,
}

/// Errors raised while encoding or decoding a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CodecError {
    /// The output buffer cannot hold the packet.
    BufferTooSmall,
    /// The packet violates the wire format.
    Protocol(ProtocolError),
}

impl From<ProtocolError> for CodecError {
    fn from(err: ProtocolError) -> Self {
        CodecError::Protocol(err)
    }
}

/// Errors produced by [`MqttSession`](crate::client::MqttSession).
///
/// Generic over the error type `E` of the [`Network`](crate::transport::Network)
/// that resolves the broker and opens the byte stream.
#[derive(Debug)]
pub enum SessionError<E> {
    /// Resolving or opening the connection failed.
    Network(E),
    /// Reading from or writing to the open stream failed.
    Io(embedded_io_async::ErrorKind),
    /// The broker violated the protocol.
    Protocol(ProtocolError),
    /// An outgoing packet does not fit in the session buffer.
    BufferTooSmall,
    /// An operation that needs an open session was attempted without one.
    NotConnected,
    /// The broker closed the stream.
    ConnectionClosed,
    /// No `PINGRESP` arrived within the keep-alive window.
    KeepAliveTimeout,
}

impl<E> From<ProtocolError> for SessionError<E> {
    fn from(err: ProtocolError) -> Self {
        SessionError::Protocol(err)
    }
}

impl<E> From<CodecError> for SessionError<E> {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::BufferTooSmall => SessionError::BufferTooSmall,
            CodecError::Protocol(p) => SessionError::Protocol(p),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for SessionError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Network(e) => write!(f, "network error: {e:?}"),
            SessionError::Io(kind) => write!(f, "stream error: {kind:?}"),
            SessionError::Protocol(p) => write!(f, "protocol error: {p:?}"),
            SessionError::BufferTooSmall => f.write_str("packet does not fit the session buffer"),
            SessionError::NotConnected => f.write_str("session is not connected"),
            SessionError::ConnectionClosed => f.write_str("connection closed by broker"),
            SessionError::KeepAliveTimeout => f.write_str("keep-alive expired without PINGRESP"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for SessionError<E> {}

/// The negotiation phase an error or timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Broker hostname resolution.
    Resolution,
    /// Secure session establishment and the MQTT `CONNECT` handshake.
    Handshake,
}

/// The external events the connection state machine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleEvent {
    /// Boot requested address resolution.
    Start,
    /// Address resolution completed.
    Resolved,
    /// The transport answered the connect request.
    SessionStatus,
    /// The liveness poll reported the link down.
    LinkDown,
}

/// Errors raised by the [`ConnectionOrchestrator`](crate::runtime::ConnectionOrchestrator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OrchestratorError {
    /// An event arrived in a state that does not accept it.
    InvalidTransition {
        /// State the machine was in.
        state: ConnectionState,
        /// Event that was rejected.
        event: LifecycleEvent,
    },
    /// The broker hostname did not resolve to an address.
    ResolutionFailed,
    /// The broker refused the session.
    Rejected(ConnectReasonCode),
    /// The periodic scheduler already has a pending tick.
    SchedulerAlreadyArmed,
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::InvalidTransition { state, event } => {
                write!(f, "event {event:?} is not valid in state {state:?}")
            }
            OrchestratorError::ResolutionFailed => f.write_str("broker address resolution failed"),
            OrchestratorError::Rejected(code) => write!(f, "broker rejected the session: {code:?}"),
            OrchestratorError::SchedulerAlreadyArmed => {
                f.write_str("telemetry scheduler is already armed")
            }
        }
    }
}

impl core::error::Error for OrchestratorError {}

/// The fatal conditions that end [`TelemetryAgent::run`](crate::runtime::TelemetryAgent::run).
///
/// None of these are recovered from inside the agent once its retry budget is
/// spent; firmware is expected to halt with the `Display` text as diagnostic.
#[derive(Debug)]
pub enum AgentError<E> {
    /// The broker hostname could not be resolved.
    ResolutionFailed,
    /// The broker refused the session.
    Rejected(ConnectReasonCode),
    /// A negotiation phase exceeded its configured timeout.
    Timeout(Phase),
    /// The transport session failed.
    Transport(E),
    /// The connection state machine refused a transition.
    Orchestrator(OrchestratorError),
}

impl<E> From<OrchestratorError> for AgentError<E> {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::ResolutionFailed => AgentError::ResolutionFailed,
            OrchestratorError::Rejected(code) => AgentError::Rejected(code),
            other => AgentError::Orchestrator(other),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for AgentError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::ResolutionFailed => f.write_str("DNS resolution of the broker failed"),
            AgentError::Rejected(code) => write!(f, "MQTT connection rejected: {code:?}"),
            AgentError::Timeout(phase) => write!(f, "{phase:?} timed out"),
            AgentError::Transport(e) => write!(f, "transport failure: {e:?}"),
            AgentError::Orchestrator(e) => write!(f, "{e}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for AgentError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes_map_from_connack_bytes() {
        assert_eq!(ConnectReasonCode::from(0), ConnectReasonCode::Success);
        assert_eq!(ConnectReasonCode::from(4), ConnectReasonCode::BadUserNameOrPassword);
        assert_eq!(ConnectReasonCode::from(5), ConnectReasonCode::NotAuthorized);
        assert_eq!(ConnectReasonCode::from(0x80), ConnectReasonCode::Other(0x80));
    }

    #[test]
    fn orchestrator_failures_surface_as_agent_errors() {
        let err: AgentError<()> = OrchestratorError::ResolutionFailed.into();
        assert!(matches!(err, AgentError::ResolutionFailed));

        let err: AgentError<()> =
            OrchestratorError::Rejected(ConnectReasonCode::NotAuthorized).into();
        assert!(matches!(err, AgentError::Rejected(ConnectReasonCode::NotAuthorized)));

        let err: AgentError<()> = OrchestratorError::SchedulerAlreadyArmed.into();
        assert!(matches!(
            err,
            AgentError::Orchestrator(OrchestratorError::SchedulerAlreadyArmed)
        ));
    }
}
