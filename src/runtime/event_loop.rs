//! The telemetry agent event loop.
//!
//! [`TelemetryAgent::run`] takes the device from boot to steady-state
//! publishing and returns when the session drops. Everything happens on the
//! calling task: the only suspension points are the transport futures, the
//! retry delays and the bounded wait for work in the steady-state loop.

use embassy_futures::select::{Either, select};
use embassy_net::IpAddress;
use embassy_time::{Instant, Timer, with_timeout};

use super::channel::{ButtonState, ChangeGatedPublisher, MAX_PAYLOAD_LEN, Temperature};
use super::orchestrator::{ConnectionOrchestrator, ConnectionState, StateSignal};
use super::publisher::BufferedOutbox;
use super::scheduler::PeriodicScheduler;
use super::traits::{SystemClock, TickPublisher};
use crate::config::AgentConfig;
use crate::error::{AgentError, LifecycleEvent, OrchestratorError, Phase};
use crate::identity::DeviceIdentity;
use crate::sensor::SensorSource;
use crate::session::{SessionEvent, TransportSession};

/// Longest topic the agent can publish to.
pub const MAX_TOPIC_LEN: usize = 64;

/// Outbox sized for one tick of both publishers.
pub type TelemetryOutbox = BufferedOutbox<2, MAX_TOPIC_LEN, MAX_PAYLOAD_LEN>;

/// The device telemetry agent.
///
/// # Example
///
/// ```ignore
/// let identity = DeviceIdentity::with_board_id(DEFAULT_DEVICE_NAME, &board_id);
/// let mut agent = TelemetryAgent::new(CONFIG, identity, session, sensors)
///     .with_observer(&STATE);
/// if let Err(e) = agent.run().await {
///     panic!("telemetry agent halted: {}", e);
/// }
/// ```
pub struct TelemetryAgent<'a, S, R> {
    session: S,
    sensors: R,
    orchestrator: ConnectionOrchestrator<'a>,
    scheduler: PeriodicScheduler,
    temperature: ChangeGatedPublisher<'a, Temperature>,
    button: ChangeGatedPublisher<'a, ButtonState>,
    outbox: TelemetryOutbox,
}

impl<'a, S, R> TelemetryAgent<'a, S, R>
where
    S: TransportSession,
    R: SensorSource,
{
    /// Create an agent for `config`, publishing as `identity` over `session`.
    pub fn new(config: AgentConfig<'a>, identity: DeviceIdentity, session: S, sensors: R) -> Self {
        Self {
            session,
            sensors,
            scheduler: PeriodicScheduler::new(config.publish_interval),
            temperature: ChangeGatedPublisher::new(config.topics.temperature)
                .with_unit(config.temperature_unit),
            button: ChangeGatedPublisher::new(config.topics.button),
            outbox: TelemetryOutbox::new(),
            orchestrator: ConnectionOrchestrator::new(config, identity),
        }
    }

    /// Signal every connection state change on `observer`.
    #[must_use]
    pub fn with_observer(mut self, observer: &'a StateSignal) -> Self {
        self.orchestrator = self.orchestrator.with_observer(observer);
        self
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.orchestrator.state()
    }

    /// The transport session.
    pub fn session(&self) -> &S {
        &self.session
    }

    /// The temperature publisher.
    pub fn temperature_publisher(&self) -> &ChangeGatedPublisher<'a, Temperature> {
        &self.temperature
    }

    /// The button publisher.
    pub fn button_publisher(&self) -> &ChangeGatedPublisher<'a, ButtonState> {
        &self.button
    }

    /// Run until the session drops.
    ///
    /// Returns `Ok(())` after the link went down, or the failure that stopped
    /// negotiation. Neither is recovered from here; the caller halts or
    /// restarts the device.
    pub async fn run(&mut self) -> Result<(), AgentError<S::Error>> {
        info!("telemetry agent starting as {}", self.orchestrator.identity());
        let host = self.orchestrator.start()?;

        let address = self.resolve_broker(host).await?;
        self.orchestrator.on_resolved(address)?;

        self.establish_session().await?;
        self.publish_loop().await
    }

    async fn resolve_broker(&mut self, host: &str) -> Result<Option<IpAddress>, AgentError<S::Error>> {
        let config = *self.orchestrator.config();
        let mut backoff = config.retry.backoff();
        loop {
            debug!("resolving {} (attempt {})", host, backoff.attempt());
            let outcome = match config.resolve_timeout {
                Some(timeout) => with_timeout(timeout, self.session.resolve(host)).await,
                None => Ok(self.session.resolve(host).await),
            };

            let failure = match outcome {
                Ok(Ok(Some(address))) => return Ok(Some(address)),
                Ok(Ok(None)) => AgentError::ResolutionFailed,
                Ok(Err(e)) => AgentError::Transport(e),
                Err(_) => AgentError::Timeout(Phase::Resolution),
            };

            match backoff.next_delay() {
                Some(delay) => {
                    warn!("{}, retrying in {} ms", failure, delay.as_millis());
                    Timer::after(delay).await;
                }
                None if matches!(failure, AgentError::ResolutionFailed) => return Ok(None),
                None => return Err(failure),
            }
        }
    }

    async fn establish_session(&mut self) -> Result<(), AgentError<S::Error>> {
        let config = *self.orchestrator.config();
        let mut backoff = config.retry.backoff();
        loop {
            let outcome = {
                let request = self.orchestrator.connect_request().ok_or(
                    OrchestratorError::InvalidTransition {
                        state: self.orchestrator.state(),
                        event: LifecycleEvent::SessionStatus,
                    },
                )?;
                info!(
                    "connecting to {:?}:{} ({}, attempt {})",
                    request.address,
                    request.port,
                    if request.tls.is_some() { "TLS" } else { "plain" },
                    backoff.attempt()
                );
                match config.connect_timeout {
                    Some(timeout) => with_timeout(timeout, self.session.connect(&request)).await,
                    None => Ok(self.session.connect(&request).await),
                }
            };

            let failure = match outcome {
                Ok(Ok(status)) => {
                    self.orchestrator
                        .on_session_status(status, &mut self.scheduler, Instant::now())?;
                    return Ok(());
                }
                Ok(Err(e)) => AgentError::Transport(e),
                Err(_) => AgentError::Timeout(Phase::Handshake),
            };

            match backoff.next_delay() {
                Some(delay) => {
                    warn!("{}, retrying in {} ms", failure, delay.as_millis());
                    Timer::after(delay).await;
                }
                None => {
                    error!("session establishment failed: {}", failure);
                    return Err(failure);
                }
            }
        }
    }

    async fn publish_loop(&mut self) -> Result<(), AgentError<S::Error>> {
        let poll_timeout = self.orchestrator.config().poll_timeout;
        while self.link_up()? {
            let bound = Instant::now() + poll_timeout;
            let wake_at = match self.scheduler.deadline() {
                Some(deadline) if deadline < bound => deadline,
                _ => bound,
            };
            match select(self.session.poll(), Timer::at(wake_at)).await {
                Either::First(Ok(event)) => handle_event(event),
                Either::First(Err(e)) => warn!("session error: {:?}", e),
                Either::Second(()) => {}
            }

            // The wait may have ended because the link went down.
            if self.scheduler.is_due(Instant::now()) && self.link_up()? {
                self.run_tick().await;
            }
        }
        info!("telemetry stopped after {} ticks", self.scheduler.ticks());
        Ok(())
    }

    fn link_up(&mut self) -> Result<bool, AgentError<S::Error>> {
        let connected = self.session.is_connected();
        Ok(self.orchestrator.on_liveness(connected, &mut self.scheduler)?)
    }

    async fn run_tick(&mut self) {
        let mut publishers: [&mut dyn TickPublisher; 2] = [&mut self.temperature, &mut self.button];
        self.scheduler
            .fire(&mut self.sensors, &mut publishers, &mut self.outbox, &SystemClock);

        for request in self.outbox.iter() {
            match self.session.publish(&request.as_request()).await {
                Ok(Some(packet_id)) => trace!("{} sent as packet {}", request.topic, packet_id),
                Ok(None) => {}
                Err(e) => warn!("publish to {} failed: {:?}", request.topic, e),
            }
        }
        self.outbox.clear();
    }
}

fn handle_event(event: SessionEvent) {
    match event {
        SessionEvent::PublishAcknowledged { packet_id } => {
            trace!("packet {} acknowledged", packet_id)
        }
        SessionEvent::PingResponse => trace!("PINGRESP"),
        SessionEvent::Unhandled(kind) => debug!("ignoring packet type {}", kind),
    }
}
