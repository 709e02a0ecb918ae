//! Telemetry runtime traits.
//!
//! Publishers never perform async I/O directly. They sample the sensors and
//! queue publish requests in a [`PublishOutbox`]; the agent performs the
//! actual async publishing after the tick returns. This keeps
//! [`TickPublisher`] object-safe, so the scheduler can drive a fixed list of
//! `&mut dyn TickPublisher` without generics or allocation.

use embassy_time::Instant;

use crate::packet::QoS;
use crate::sensor::SensorSource;

/// Object-safe trait for queuing MQTT publish requests.
///
/// # Example
///
/// ```ignore
/// fn tick(&mut self, sensors: &mut dyn SensorSource, outbox: &mut dyn PublishOutbox) -> bool {
///     outbox.publish("device/state", b"online", QoS::AtLeastOnce, true)
/// }
/// ```
pub trait PublishOutbox {
    /// Queue a message for publishing.
    ///
    /// Returns `false` if the request could not be queued (outbox full, topic
    /// or payload too long); nothing was queued in that case.
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> bool;
}

/// A publisher driven once per telemetry tick.
pub trait TickPublisher {
    /// The topic this publisher writes to.
    fn topic(&self) -> &str;

    /// Sample the current value and queue a publish if it changed.
    ///
    /// Returns whether a publish was queued.
    fn tick(&mut self, sensors: &mut dyn SensorSource, outbox: &mut dyn PublishOutbox) -> bool;
}

impl<P: TickPublisher + ?Sized> TickPublisher for &mut P {
    fn topic(&self) -> &str {
        (**self).topic()
    }

    fn tick(&mut self, sensors: &mut dyn SensorSource, outbox: &mut dyn PublishOutbox) -> bool {
        (**self).tick(sensors, outbox)
    }
}

/// Source of the current time for the scheduler.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// [`Clock`] backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}
