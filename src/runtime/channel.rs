//! Change-gated publishing.
//!
//! A [`ChangeGatedPublisher`] owns one topic and remembers the last value it
//! handed to the outbox. Each tick it samples a fresh value and queues a
//! publish only when the value differs, so the broker's retained message
//! always mirrors the device state without repeating it every period.

use core::fmt::{self, Write as _};

use heapless::String;

use super::traits::{PublishOutbox, TickPublisher};
use crate::packet::QoS;
use crate::sensor::{SensorSource, TemperatureUnit};

/// Longest formatted payload.
pub const MAX_PAYLOAD_LEN: usize = 16;

/// A value published on a telemetry topic.
pub trait TelemetryValue: Copy + PartialEq + fmt::Debug {
    /// Read the current value; `unit` applies to temperatures.
    fn sample(sensors: &mut dyn SensorSource, unit: TemperatureUnit) -> Self;

    /// Format the value as the MQTT payload.
    fn write_payload(&self, out: &mut String<MAX_PAYLOAD_LEN>) -> fmt::Result;
}

/// A temperature reading, published with two decimals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(pub f32);

impl TelemetryValue for Temperature {
    fn sample(sensors: &mut dyn SensorSource, unit: TemperatureUnit) -> Self {
        Temperature(sensors.temperature(unit))
    }

    fn write_payload(&self, out: &mut String<MAX_PAYLOAD_LEN>) -> fmt::Result {
        write!(out, "{:.2}", self.0)
    }
}

/// Combined button state, published as `"1"` when pressed and `"0"` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonState(pub bool);

impl TelemetryValue for ButtonState {
    fn sample(sensors: &mut dyn SensorSource, _unit: TemperatureUnit) -> Self {
        ButtonState(sensors.button_pressed())
    }

    fn write_payload(&self, out: &mut String<MAX_PAYLOAD_LEN>) -> fmt::Result {
        out.push_str(if self.0 { "1" } else { "0" })
            .map_err(|_| fmt::Error)
    }
}

/// A topic and the value most recently handed to publish on it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishChannel<'a, T> {
    /// Topic name.
    pub topic: &'a str,
    /// Last published value; `None` before the first publish.
    pub last_value: Option<T>,
}

impl<'a, T: TelemetryValue> PublishChannel<'a, T> {
    /// A channel that has not published yet.
    pub const fn new(topic: &'a str) -> Self {
        Self {
            topic,
            last_value: None,
        }
    }

    /// Whether `value` differs from what was last published.
    pub fn is_changed(&self, value: &T) -> bool {
        self.last_value.as_ref() != Some(value)
    }
}

/// Publishes a [`TelemetryValue`] at QoS 1 with retain whenever it changes.
pub struct ChangeGatedPublisher<'a, T> {
    channel: PublishChannel<'a, T>,
    qos: QoS,
    retain: bool,
    unit: TemperatureUnit,
}

impl<'a, T: TelemetryValue> ChangeGatedPublisher<'a, T> {
    /// Create a publisher for `topic`, sampling temperatures in Celsius.
    pub const fn new(topic: &'a str) -> Self {
        Self {
            channel: PublishChannel::new(topic),
            qos: QoS::AtLeastOnce,
            retain: true,
            unit: TemperatureUnit::Celsius,
        }
    }

    /// Sample temperatures in `unit`
    #[must_use]
    pub const fn with_unit(mut self, unit: TemperatureUnit) -> Self {
        self.unit = unit;
        self
    }

    /// The channel state.
    pub fn channel(&self) -> &PublishChannel<'a, T> {
        &self.channel
    }

    /// The value most recently queued.
    pub fn last_value(&self) -> Option<T> {
        self.channel.last_value
    }

    /// Queue `value` if it differs from the last published one.
    ///
    /// `last_value` only moves when the outbox accepted the request, so a
    /// dropped publish is retried on the next tick.
    pub fn offer(&mut self, value: T, outbox: &mut dyn PublishOutbox) -> bool {
        if !self.channel.is_changed(&value) {
            return false;
        }

        let mut payload = String::<MAX_PAYLOAD_LEN>::new();
        if value.write_payload(&mut payload).is_err() {
            warn!("payload for {} does not fit: {:?}", self.channel.topic, value);
            return false;
        }

        if !outbox.publish(self.channel.topic, payload.as_bytes(), self.qos, self.retain) {
            return false;
        }
        info!("publish {} = {}", self.channel.topic, payload.as_str());
        self.channel.last_value = Some(value);
        true
    }
}

impl<T: TelemetryValue> TickPublisher for ChangeGatedPublisher<'_, T> {
    fn topic(&self) -> &str {
        self.channel.topic
    }

    fn tick(&mut self, sensors: &mut dyn SensorSource, outbox: &mut dyn PublishOutbox) -> bool {
        let value = T::sample(sensors, self.unit);
        self.offer(value, outbox)
    }
}
