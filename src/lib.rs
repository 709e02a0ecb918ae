//! # Change-Gated MQTT Telemetry for Embedded Devices
//!
//! `myrtio-telemetry` is a `no_std`, asynchronous telemetry agent for
//! microcontroller-class devices, built upon the [Embassy](https://embassy.dev/)
//! async ecosystem. It keeps one MQTT session to a broker and publishes the
//! on-board temperature and the combined button state, each only when it
//! changed since the last publish.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Buffers are managed using `heapless`.
//! - **Fully Async:** The whole lifecycle runs on one task with `async/await`
//!   and Embassy timers.
//! - **Rust 2024 Edition:** Uses native `async fn` in traits.
//! - **Transport Agnostic:** The agent talks to a [`TransportSession`]. The
//!   bundled [`MqttSession`] implements it over any [`Network`] byte stream,
//!   so TLS is a matter of handing it a TLS-capable network.
//! - **Retained, QoS 1 telemetry:** Every publish is retained so the broker
//!   always holds the last known device state.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle -> ResolvingAddress -> Connecting -> Connected -> Disconnected
//! ```
//!
//! Resolution failure and broker rejection end [`TelemetryAgent::run`] with
//! an error, after an optional bounded retry. Losing the link ends it with
//! `Ok(())`. The agent never reconnects on its own.
//!
//! ## Usage
//!
//! ```ignore
//! static CONFIG: AgentConfig<'static> = AgentConfig::new("mqtt.example.org")
//!     .with_credentials(Credentials::new("aluno78", "secret"));
//!
//! let network = TcpNetwork::new(stack, &mut rx, &mut tx, Duration::from_secs(30));
//! let session = MqttSession::<_, 256>::new(network);
//! let sensors = SensorReader::new(adc, button_a, button_b);
//! let identity = DeviceIdentity::with_board_id(DEFAULT_DEVICE_NAME, &board_id);
//!
//! let mut agent = TelemetryAgent::new(CONFIG, identity, session, sensors);
//! if let Err(e) = agent.run().await {
//!     panic!("{}", e);
//! }
//! ```

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod client;
pub mod config;
pub mod error;
pub mod identity;
pub mod packet;
pub mod runtime;
pub mod sensor;
pub mod session;
pub mod transport;
pub mod util;

// Re-export key types for easier access at the crate root.
pub use client::MqttSession;
pub use config::{AgentConfig, Credentials, TlsConfig, TopicNames};
pub use error::{AgentError, SessionError};
pub use identity::DeviceIdentity;
pub use packet::QoS;
pub use runtime::{ConnectionState, RetryPolicy, TelemetryAgent};
pub use sensor::{SensorReader, SensorSource, TemperatureUnit};
pub use session::TransportSession;
pub use transport::{Network, TcpNetwork};
