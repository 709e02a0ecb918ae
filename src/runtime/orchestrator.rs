//! Connection lifecycle state machine.
//!
//! ```text
//! Idle -> ResolvingAddress -> Connecting -> Connected -> Disconnected
//! ```
//!
//! Every transition moves forward. Resolution failure and broker rejection
//! are fatal and leave the machine in the phase that failed;
//! `Disconnected` is terminal.

use embassy_net::IpAddress;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

use super::scheduler::PeriodicScheduler;
use crate::config::AgentConfig;
use crate::error::{LifecycleEvent, OrchestratorError};
use crate::identity::DeviceIdentity;
use crate::session::{ClientInfo, ConnectRequest, ConnectStatus};

/// Where the agent is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// Booted, nothing requested yet.
    Idle,
    /// Waiting for the broker hostname to resolve.
    ResolvingAddress,
    /// Waiting for the broker to answer the connect request.
    Connecting,
    /// Session up, telemetry running.
    Connected,
    /// Session lost. Terminal.
    Disconnected,
}

/// Signal other tasks can wait on to follow the connection state.
pub type StateSignal = Signal<CriticalSectionRawMutex, ConnectionState>;

/// Drives the agent from boot to steady-state publishing.
pub struct ConnectionOrchestrator<'a> {
    state: ConnectionState,
    broker: Option<IpAddress>,
    config: AgentConfig<'a>,
    identity: DeviceIdentity,
    observer: Option<&'a StateSignal>,
}

impl<'a> ConnectionOrchestrator<'a> {
    /// Create an orchestrator in [`ConnectionState::Idle`].
    pub fn new(config: AgentConfig<'a>, identity: DeviceIdentity) -> Self {
        Self {
            state: ConnectionState::Idle,
            broker: None,
            config,
            identity,
            observer: None,
        }
    }

    /// Signal every state change on `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a StateSignal) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The resolved broker address, once known.
    pub fn broker_address(&self) -> Option<IpAddress> {
        self.broker
    }

    /// The agent configuration.
    pub fn config(&self) -> &AgentConfig<'a> {
        &self.config
    }

    /// The device identity used as client id.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!("connection state {:?} -> {:?}", self.state, next);
        self.state = next;
        if let Some(observer) = self.observer {
            observer.signal(next);
        }
    }

    fn expect(&self, state: ConnectionState, event: LifecycleEvent) -> Result<(), OrchestratorError> {
        if self.state == state {
            Ok(())
        } else {
            Err(OrchestratorError::InvalidTransition {
                state: self.state,
                event,
            })
        }
    }

    /// Leave `Idle` and return the hostname to resolve.
    pub fn start(&mut self) -> Result<&'a str, OrchestratorError> {
        self.expect(ConnectionState::Idle, LifecycleEvent::Start)?;
        self.transition(ConnectionState::ResolvingAddress);
        Ok(self.config.broker_host)
    }

    /// Handle the resolution result.
    ///
    /// On success stores the broker address, moves to `Connecting` and
    /// returns the connect request to issue.
    pub fn on_resolved(
        &mut self,
        address: Option<IpAddress>,
    ) -> Result<ConnectRequest<'_>, OrchestratorError> {
        self.expect(ConnectionState::ResolvingAddress, LifecycleEvent::Resolved)?;
        let Some(address) = address else {
            error!("DNS resolution of {} failed", self.config.broker_host);
            return Err(OrchestratorError::ResolutionFailed);
        };

        info!("broker {} resolved to {:?}", self.config.broker_host, address);
        self.broker = Some(address);
        self.transition(ConnectionState::Connecting);
        Ok(self.build_request(address))
    }

    /// The connect request for the resolved broker, while `Connecting`.
    pub fn connect_request(&self) -> Option<ConnectRequest<'_>> {
        if self.state != ConnectionState::Connecting {
            return None;
        }
        self.broker.map(|address| self.build_request(address))
    }

    fn build_request(&self, address: IpAddress) -> ConnectRequest<'_> {
        let config = &self.config;
        ConnectRequest {
            address,
            port: config.broker_port(),
            broker_host: config.broker_host,
            client: ClientInfo {
                client_id: self.identity.as_str(),
                keep_alive_secs: config.keep_alive_secs(),
                username: config.credentials.map(|c| c.username),
                password: config.credentials.map(|c| c.password),
            },
            tls: config.tls,
        }
    }

    /// Handle the broker's answer to the connect request.
    ///
    /// Acceptance moves to `Connected` and arms `scheduler` for an immediate
    /// tick at `now`.
    pub fn on_session_status(
        &mut self,
        status: ConnectStatus,
        scheduler: &mut PeriodicScheduler,
        now: Instant,
    ) -> Result<(), OrchestratorError> {
        self.expect(ConnectionState::Connecting, LifecycleEvent::SessionStatus)?;
        match status {
            ConnectStatus::Accepted => {
                info!("MQTT session accepted as {}", self.identity);
                self.transition(ConnectionState::Connected);
                scheduler.on_connected(now)
            }
            ConnectStatus::Rejected(code) => {
                error!("MQTT session rejected: {:?}", code);
                Err(OrchestratorError::Rejected(code))
            }
        }
    }

    /// Handle a liveness poll. Returns whether the agent should keep running.
    ///
    /// A link reported down while `Connected` moves to `Disconnected` and
    /// disarms `scheduler`.
    pub fn on_liveness(
        &mut self,
        connected: bool,
        scheduler: &mut PeriodicScheduler,
    ) -> Result<bool, OrchestratorError> {
        match (self.state, connected) {
            (ConnectionState::Connected, true) => Ok(true),
            (ConnectionState::Connected, false) => {
                warn!("MQTT link down");
                scheduler.disarm();
                self.transition(ConnectionState::Disconnected);
                Ok(false)
            }
            (ConnectionState::Disconnected, _) => Ok(false),
            (state, _) => Err(OrchestratorError::InvalidTransition {
                state,
                event: LifecycleEvent::LinkDown,
            }),
        }
    }
}
