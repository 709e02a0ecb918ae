//! Telemetry Runtime Module
//!
//! The connection lifecycle and publish-scheduling core of the agent.
//!
//! # Overview
//!
//! - [`ConnectionOrchestrator`] sequences address resolution, session
//!   establishment and steady state, and decides when telemetry starts.
//! - [`PeriodicScheduler`] fires one tick per period and runs every
//!   publisher in a fixed order.
//! - [`ChangeGatedPublisher`] publishes a value only when it changed since
//!   the last publish.
//! - [`TelemetryAgent`] ties them to a [`TransportSession`](crate::session::TransportSession)
//!   in a single-task event loop.
//!
//! # Publishing Pattern
//!
//! Publishers never perform async I/O directly. They queue requests in a
//! [`PublishOutbox`] during the tick; the agent sends them once the tick
//! returns.

pub(crate) mod channel;
pub(crate) mod event_loop;
pub(crate) mod orchestrator;
pub(crate) mod publisher;
pub(crate) mod retry;
pub(crate) mod scheduler;
pub(crate) mod traits;

pub use channel::{
    ButtonState, ChangeGatedPublisher, MAX_PAYLOAD_LEN, PublishChannel, Temperature,
    TelemetryValue,
};
pub use event_loop::{MAX_TOPIC_LEN, TelemetryAgent, TelemetryOutbox};
pub use orchestrator::{ConnectionOrchestrator, ConnectionState, StateSignal};
pub use publisher::{BufferedOutbox, OwnedPublishRequest, PublishRequest};
pub use retry::{Backoff, RetryPolicy};
pub use scheduler::PeriodicScheduler;
pub use traits::{Clock, PublishOutbox, SystemClock, TickPublisher};
