//! Agent configuration.
//!
//! Everything here is built with `const fn` so firmware can keep its broker
//! settings, credentials and certificates in a `static`:
//!
//! ```ignore
//! static CONFIG: AgentConfig<'static> = AgentConfig::new("mqtt.example.org")
//!     .with_credentials(Credentials::new("aluno78", "secret"))
//!     .with_tls(TlsConfig::mutual(CA_CERT, CLIENT_CERT, CLIENT_KEY));
//! ```

use embassy_time::Duration;

use crate::runtime::RetryPolicy;
use crate::sensor::TemperatureUnit;

/// Standard MQTT port.
pub const MQTT_PORT: u16 = 1883;

/// Standard MQTT-over-TLS port.
pub const MQTT_TLS_PORT: u16 = 8883;

/// Topic the temperature reading is published to unless configured otherwise.
pub const DEFAULT_TEMPERATURE_TOPIC: &str = "aluno78/bitdoglab/temperatura";

/// Topic the button state is published to unless configured otherwise.
pub const DEFAULT_BUTTON_TOPIC: &str = "aluno78/bitdoglab/botao";

/// Username and password sent in `CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials<'a> {
    /// User name.
    pub username: &'a str,
    /// Password.
    pub password: &'a str,
}

impl<'a> Credentials<'a> {
    /// Create credentials from a user name and password.
    pub const fn new(username: &'a str, password: &'a str) -> Self {
        Self { username, password }
    }
}

/// A client certificate and its private key, presented for mutual TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCertificate<'a> {
    /// Certificate, PEM or DER as the TLS stack expects it.
    pub certificate: &'a [u8],
    /// Private key matching `certificate`.
    pub private_key: &'a [u8],
}

/// TLS material for the broker connection.
///
/// Its presence selects the secure port. The agent only carries the bytes;
/// validating them is up to the [`Network`](crate::transport::Network) that
/// opens the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TlsConfig<'a> {
    /// Trust anchor for the broker certificate. `None` skips verification.
    pub ca_certificate: Option<&'a [u8]>,
    /// Client identity for mutual authentication.
    pub client: Option<ClientCertificate<'a>>,
}

impl<'a> TlsConfig<'a> {
    /// TLS without broker verification and without a client certificate.
    pub const fn unverified() -> Self {
        Self {
            ca_certificate: None,
            client: None,
        }
    }

    /// TLS that verifies the broker against `ca_certificate`.
    pub const fn verified(ca_certificate: &'a [u8]) -> Self {
        Self {
            ca_certificate: Some(ca_certificate),
            client: None,
        }
    }

    /// Mutual TLS: verify the broker and present a client certificate.
    pub const fn mutual(
        ca_certificate: &'a [u8],
        certificate: &'a [u8],
        private_key: &'a [u8],
    ) -> Self {
        Self {
            ca_certificate: Some(ca_certificate),
            client: Some(ClientCertificate {
                certificate,
                private_key,
            }),
        }
    }

    /// Whether a client certificate is presented.
    pub const fn is_mutual(&self) -> bool {
        self.client.is_some()
    }
}

/// The two telemetry topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicNames<'a> {
    /// Topic for the temperature reading.
    pub temperature: &'a str,
    /// Topic for the combined button state.
    pub button: &'a str,
}

impl<'a> TopicNames<'a> {
    /// Create a topic pair.
    pub const fn new(temperature: &'a str, button: &'a str) -> Self {
        Self {
            temperature,
            button,
        }
    }
}

impl Default for TopicNames<'static> {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPERATURE_TOPIC, DEFAULT_BUTTON_TOPIC)
    }
}

/// Configuration for a [`TelemetryAgent`](crate::runtime::TelemetryAgent).
#[derive(Debug, Clone, Copy)]
pub struct AgentConfig<'a> {
    /// Broker hostname, resolved at boot.
    pub broker_host: &'a str,
    /// Optional username and password.
    pub credentials: Option<Credentials<'a>>,
    /// Optional TLS material; selects [`MQTT_TLS_PORT`] when present.
    pub tls: Option<TlsConfig<'a>>,
    /// Telemetry topics.
    pub topics: TopicNames<'a>,
    /// MQTT keep-alive interval.
    pub keep_alive: Duration,
    /// Period of the telemetry tick.
    pub publish_interval: Duration,
    /// Upper bound on a single wait for transport I/O.
    pub poll_timeout: Duration,
    /// Unit the temperature is published in.
    pub temperature_unit: TemperatureUnit,
    /// Optional bound on address resolution.
    pub resolve_timeout: Option<Duration>,
    /// Optional bound on session establishment.
    pub connect_timeout: Option<Duration>,
    /// Retry policy for resolution and session establishment.
    pub retry: RetryPolicy,
}

impl<'a> AgentConfig<'a> {
    /// Create a configuration for `broker_host` with the reference defaults:
    /// plain MQTT, no credentials, 60 s keep-alive, 10 s publish interval,
    /// 10 s poll timeout, Celsius, no phase timeouts, no retries.
    pub const fn new(broker_host: &'a str) -> Self {
        Self {
            broker_host,
            credentials: None,
            tls: None,
            topics: TopicNames::new(DEFAULT_TEMPERATURE_TOPIC, DEFAULT_BUTTON_TOPIC),
            keep_alive: Duration::from_secs(60),
            publish_interval: Duration::from_secs(10),
            poll_timeout: Duration::from_secs(10),
            temperature_unit: TemperatureUnit::Celsius,
            resolve_timeout: None,
            connect_timeout: None,
            retry: RetryPolicy::no_retry(),
        }
    }

    /// Set username and password
    #[must_use]
    pub const fn with_credentials(mut self, credentials: Credentials<'a>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Enable TLS with the given material
    #[must_use]
    pub const fn with_tls(mut self, tls: TlsConfig<'a>) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set the telemetry topics
    #[must_use]
    pub const fn with_topics(mut self, topics: TopicNames<'a>) -> Self {
        self.topics = topics;
        self
    }

    /// Set the keep-alive interval
    #[must_use]
    pub const fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Set the telemetry period
    #[must_use]
    pub const fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    /// Set the bound on a single wait for transport I/O
    #[must_use]
    pub const fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the temperature unit
    #[must_use]
    pub const fn with_temperature_unit(mut self, unit: TemperatureUnit) -> Self {
        self.temperature_unit = unit;
        self
    }

    /// Bound address resolution
    #[must_use]
    pub const fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = Some(timeout);
        self
    }

    /// Bound session establishment
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the retry policy for resolution and session establishment
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The broker port: [`MQTT_TLS_PORT`] when TLS is configured, [`MQTT_PORT`] otherwise.
    pub const fn broker_port(&self) -> u16 {
        if self.tls.is_some() {
            MQTT_TLS_PORT
        } else {
            MQTT_PORT
        }
    }

    /// Keep-alive in whole seconds as sent in `CONNECT`, saturating at `u16::MAX`.
    pub fn keep_alive_secs(&self) -> u16 {
        u16::try_from(self.keep_alive.as_secs()).unwrap_or(u16::MAX)
    }
}
