//! Publish requests and the buffered outbox.
//!
//! The outbox collects the requests a telemetry tick produces so the agent can
//! send them after the tick, in the order they were queued.

use heapless::Vec;

use super::traits::PublishOutbox;
use crate::packet::QoS;

/// A request to publish a message.
///
/// This struct holds references to the topic and payload, which must outlive
/// the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishRequest<'a> {
    /// The topic to publish to
    pub topic: &'a str,
    /// The payload bytes
    pub payload: &'a [u8],
    /// Quality of Service level
    pub qos: QoS,
    /// Whether the broker retains the message
    pub retain: bool,
}

/// An owned publish request with inline storage for topic and payload.
#[derive(Debug, Clone)]
pub struct OwnedPublishRequest<const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> {
    /// The topic (stored inline)
    pub topic: heapless::String<TOPIC_SIZE>,
    /// The payload (stored inline)
    pub payload: Vec<u8, PAYLOAD_SIZE>,
    /// Quality of Service level
    pub qos: QoS,
    /// Whether the broker retains the message
    pub retain: bool,
}

impl<const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE> {
    /// Borrow as a [`PublishRequest`].
    pub fn as_request(&self) -> PublishRequest<'_> {
        PublishRequest {
            topic: &self.topic,
            payload: &self.payload,
            qos: self.qos,
            retain: self.retain,
        }
    }
}

/// A buffered outbox that collects publish requests during a telemetry tick.
///
/// # Type Parameters
///
/// - `CAPACITY`: Maximum number of publish requests that can be buffered
/// - `TOPIC_SIZE`: Maximum topic string length
/// - `PAYLOAD_SIZE`: Maximum payload size
pub struct BufferedOutbox<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
{
    requests: Vec<OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>, CAPACITY>,
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize>
    BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    /// Create a new empty buffered outbox.
    pub const fn new() -> Self {
        Self {
            requests: Vec::new(),
        }
    }

    /// Iterate over the buffered requests in the order they were queued.
    pub fn iter(&self) -> impl Iterator<Item = &OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>> {
        self.requests.iter()
    }

    /// The request at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&OwnedPublishRequest<TOPIC_SIZE, PAYLOAD_SIZE>> {
        self.requests.get(index)
    }

    /// Clear all buffered requests.
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    /// Check if the outbox is empty.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Get the number of buffered requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> Default
    for BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize, const TOPIC_SIZE: usize, const PAYLOAD_SIZE: usize> PublishOutbox
    for BufferedOutbox<CAPACITY, TOPIC_SIZE, PAYLOAD_SIZE>
{
    fn publish(&mut self, topic: &str, payload: &[u8], qos: QoS, retain: bool) -> bool {
        let mut topic_str = heapless::String::new();
        if topic_str.push_str(topic).is_err() {
            warn!("topic too long for outbox: {}", topic);
            return false;
        }

        let mut payload_vec = Vec::new();
        if payload_vec.extend_from_slice(payload).is_err() {
            warn!("payload too large for outbox on {}", topic);
            return false;
        }

        let req = OwnedPublishRequest {
            topic: topic_str,
            payload: payload_vec,
            qos,
            retain,
        };

        if self.requests.push(req).is_err() {
            warn!("outbox full, dropping publish to {}", topic);
            return false;
        }
        true
    }
}
