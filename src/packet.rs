//! # MQTT Packet Structures and Serialization
//!
//! The MQTT v3.1.1 packets a telemetry device exchanges with its broker:
//! `CONNECT`/`CONNACK` for the handshake, `PUBLISH`/`PUBACK` for QoS 1
//! telemetry, `PUBREC`/`PUBREL`/`PUBCOMP` for the QoS 2 handshake,
//! `PINGREQ`/`PINGRESP` for keep-alive and `DISCONNECT`.

use crate::error::{CodecError, ProtocolError};
use crate::util::{self, read_u16, write_binary, write_utf8_string};

const CONNECT: u8 = 1;
const CONNACK: u8 = 2;
const PUBLISH: u8 = 3;
const PUBACK: u8 = 4;
const PUBREC: u8 = 5;
const PUBREL: u8 = 6;
const PUBCOMP: u8 = 7;
const PINGREQ: u8 = 12;
const PINGRESP: u8 = 13;
const DISCONNECT: u8 = 14;

/// Protocol level for MQTT 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

/// Bytes reserved ahead of the packet content: the fixed header byte plus
/// the longest remaining-length encoding.
const HEADER_RESERVE: usize = 5;

/// Represents the Quality of Service (QoS) levels for MQTT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce = 0,
    /// Acknowledged with `PUBACK`, may be delivered twice.
    AtLeastOnce = 1,
    /// Four-way handshake, delivered once.
    ExactlyOnce = 2,
}

/// A trait for packets that can be encoded into a byte buffer.
pub trait EncodePacket {
    /// Encode the packet at the start of `buf`, returning its length.
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError>;
}

/// Bounds-checked writer over the content area of a packet buffer.
struct Cursor<'b> {
    buf: &'b mut [u8],
    pos: usize,
}

impl<'b> Cursor<'b> {
    fn new(buf: &'b mut [u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_RESERVE {
            return Err(CodecError::BufferTooSmall);
        }
        Ok(Self {
            buf,
            pos: HEADER_RESERVE,
        })
    }

    fn put_u8(&mut self, val: u8) -> Result<(), CodecError> {
        *self.buf.get_mut(self.pos).ok_or(CodecError::BufferTooSmall)? = val;
        self.pos += 1;
        Ok(())
    }

    fn put_u16(&mut self, val: u16) -> Result<(), CodecError> {
        self.put_slice(&val.to_be_bytes())
    }

    fn put_str(&mut self, s: &str) -> Result<(), CodecError> {
        self.pos += write_utf8_string(&mut self.buf[self.pos..], s)?;
        Ok(())
    }

    fn put_binary(&mut self, data: &[u8]) -> Result<(), CodecError> {
        self.pos += write_binary(&mut self.buf[self.pos..], data)?;
        Ok(())
    }

    fn put_slice(&mut self, data: &[u8]) -> Result<(), CodecError> {
        let end = self.pos + data.len();
        self.buf
            .get_mut(self.pos..end)
            .ok_or(CodecError::BufferTooSmall)?
            .copy_from_slice(data);
        self.pos = end;
        Ok(())
    }

    /// Write the fixed header in front of the content and compact the packet
    /// to the start of the buffer.
    fn finish(self, header: u8) -> Result<usize, CodecError> {
        let remaining_len = self.pos - HEADER_RESERVE;
        let mut len_bytes = [0u8; 4];
        let len_size = util::write_variable_byte_integer(&mut len_bytes, remaining_len)?;

        self.buf[0] = header;
        self.buf[1..1 + len_size].copy_from_slice(&len_bytes[..len_size]);
        let header_len = 1 + len_size;
        self.buf.copy_within(HEADER_RESERVE..self.pos, header_len);
        Ok(header_len + remaining_len)
    }
}

// --- CONNECT Packet ---
/// The session handshake sent after the stream is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connect<'a> {
    /// Client identifier.
    pub client_id: &'a str,
    /// Keep-alive interval in seconds.
    pub keep_alive: u16,
    /// Ask the broker to discard any previous session state.
    pub clean_session: bool,
    /// Optional user name.
    pub username: Option<&'a str>,
    /// Optional password; only sent together with a user name.
    pub password: Option<&'a [u8]>,
}

impl<'a> Connect<'a> {
    /// Creates a clean-session `CONNECT` without credentials.
    pub fn new(client_id: &'a str, keep_alive: u16) -> Self {
        Self {
            client_id,
            keep_alive,
            clean_session: true,
            username: None,
            password: None,
        }
    }

    /// Adds a user name and password.
    #[must_use]
    pub fn with_credentials(mut self, username: &'a str, password: &'a [u8]) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }
}

impl EncodePacket for Connect<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let mut cursor = Cursor::new(buf)?;
        cursor.put_str("MQTT")?;
        cursor.put_u8(PROTOCOL_LEVEL)?;

        // A password without a user name is not allowed in 3.1.1.
        let password = self.username.and(self.password);
        let mut flags = 0;
        if self.clean_session {
            flags |= 0x02;
        }
        if self.username.is_some() {
            flags |= 0x80;
        }
        if password.is_some() {
            flags |= 0x40;
        }
        cursor.put_u8(flags)?;
        cursor.put_u16(self.keep_alive)?;

        cursor.put_str(self.client_id)?;
        if let Some(username) = self.username {
            cursor.put_str(username)?;
        }
        if let Some(password) = password {
            cursor.put_binary(password)?;
        }
        cursor.finish(CONNECT << 4)
    }
}

// --- CONNACK Packet ---
/// The broker's answer to `CONNECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
    /// Whether the broker resumed a stored session.
    pub session_present: bool,
    /// Return code; zero means accepted.
    pub return_code: u8,
}

// --- PUBLISH Packet ---
/// An application message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Publish<'a> {
    /// Topic name.
    pub topic: &'a str,
    /// Message payload.
    pub payload: &'a [u8],
    /// Delivery guarantee.
    pub qos: QoS,
    /// Whether the broker keeps this message as the topic's retained value.
    pub retain: bool,
    /// Packet identifier, present for QoS 1 and 2.
    pub packet_id: Option<u16>,
}

impl EncodePacket for Publish<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let mut cursor = Cursor::new(buf)?;
        cursor.put_str(self.topic)?;

        if self.qos != QoS::AtMostOnce {
            let id = self.packet_id.ok_or(ProtocolError::MalformedPacket)?;
            cursor.put_u16(id)?;
        }
        cursor.put_slice(self.payload)?;

        let mut header = (PUBLISH << 4) | ((self.qos as u8) << 1);
        if self.retain {
            header |= 0x01;
        }
        cursor.finish(header)
    }
}

// --- PUBACK Packet ---
/// Acknowledgement of a QoS 1 publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubAck {
    /// Identifier of the acknowledged publish.
    pub packet_id: u16,
}

// --- PUBREL Packet ---
/// Second step of the QoS 2 handshake, answering `PUBREC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PubRel {
    /// Identifier of the publish being released.
    pub packet_id: u16,
}

impl EncodePacket for PubRel {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let [hi, lo] = self.packet_id.to_be_bytes();
        let packet = buf.get_mut(0..4).ok_or(CodecError::BufferTooSmall)?;
        packet.copy_from_slice(&[(PUBREL << 4) | 0x02, 0x02, hi, lo]);
        Ok(4)
    }
}

// --- PINGREQ Packet ---
/// Keep-alive probe.
#[derive(Debug)]
pub struct PingReq;

impl EncodePacket for PingReq {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let header = buf.get_mut(0..2).ok_or(CodecError::BufferTooSmall)?;
        header.copy_from_slice(&[PINGREQ << 4, 0x00]);
        Ok(2)
    }
}

// --- DISCONNECT Packet ---
/// Clean session shutdown.
#[derive(Debug)]
pub struct Disconnect;

impl EncodePacket for Disconnect {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let header = buf.get_mut(0..2).ok_or(CodecError::BufferTooSmall)?;
        header.copy_from_slice(&[DISCONNECT << 4, 0x00]);
        Ok(2)
    }
}

/// A packet received from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MqttPacket {
    /// Handshake answer.
    ConnAck(ConnAck),
    /// QoS 1 acknowledgement.
    PubAck(PubAck),
    /// QoS 2 receipt, to be answered with [`PubRel`].
    PubRec(PubAck),
    /// QoS 2 completion.
    PubComp(PubAck),
    /// Keep-alive answer.
    PingResp,
    /// Any other valid packet type, by number.
    Other(u8),
}

impl MqttPacket {
    /// The packet type number from the fixed header.
    pub fn packet_type(&self) -> u8 {
        match self {
            MqttPacket::ConnAck(_) => CONNACK,
            MqttPacket::PubAck(_) => PUBACK,
            MqttPacket::PubRec(_) => PUBREC,
            MqttPacket::PubComp(_) => PUBCOMP,
            MqttPacket::PingResp => PINGRESP,
            MqttPacket::Other(kind) => *kind,
        }
    }
}

/// Decodes one complete packet frame.
///
/// `frame` must hold exactly one packet as delimited by
/// [`frame_length`](crate::util::frame_length).
pub fn decode(frame: &[u8]) -> Result<MqttPacket, ProtocolError> {
    let first = *frame.first().ok_or(ProtocolError::MalformedPacket)?;
    let (remaining, len_size) =
        util::read_variable_byte_integer(frame, 1)?.ok_or(ProtocolError::MalformedPacket)?;
    let body_start = 1 + len_size;
    let body = frame
        .get(body_start..body_start + remaining)
        .ok_or(ProtocolError::MalformedPacket)?;

    let packet_type = first >> 4;
    let packet = match packet_type {
        CONNACK => {
            let [flags, return_code] = body else {
                return Err(ProtocolError::MalformedPacket);
            };
            MqttPacket::ConnAck(ConnAck {
                session_present: flags & 0x01 != 0,
                return_code: *return_code,
            })
        }
        PUBACK => MqttPacket::PubAck(decode_ack(body)?),
        PUBREC => MqttPacket::PubRec(decode_ack(body)?),
        PUBCOMP => MqttPacket::PubComp(decode_ack(body)?),
        PINGRESP => MqttPacket::PingResp,
        1..=14 => MqttPacket::Other(packet_type),
        _ => return Err(ProtocolError::InvalidPacketType(packet_type)),
    };

    Ok(packet)
}

fn decode_ack(body: &[u8]) -> Result<PubAck, ProtocolError> {
    let mut cursor = 0;
    Ok(PubAck {
        packet_id: read_u16(&mut cursor, body)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_without_credentials() {
        let mut buf = [0u8; 64];
        let len = Connect::new("dev", 60).encode(&mut buf).unwrap();
        assert_eq!(
            &buf[..len],
            &[
                0x10, 0x0F, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3C, 0x00,
                0x03, b'd', b'e', b'v',
            ]
        );
    }

    #[test]
    fn connect_with_credentials_sets_flags_and_payload() {
        let mut buf = [0u8; 64];
        let len = Connect::new("dev", 60)
            .with_credentials("u", b"p")
            .encode(&mut buf)
            .unwrap();
        assert_eq!(buf[1], 0x15);
        assert_eq!(buf[9], 0xC2);
        assert_eq!(&buf[len - 6..len], &[0x00, 0x01, b'u', 0x00, 0x01, b'p']);
    }

    #[test]
    fn password_is_dropped_without_username() {
        let mut buf = [0u8; 64];
        let mut connect = Connect::new("dev", 60);
        connect.password = Some(b"secret");
        let len = connect.encode(&mut buf).unwrap();
        assert_eq!(buf[9], 0x02);
        assert_eq!(len, 17);
    }

    #[test]
    fn retained_qos1_publish_layout() {
        let mut buf = [0u8; 64];
        let publish = Publish {
            topic: "a/b",
            payload: b"24.57",
            qos: QoS::AtLeastOnce,
            retain: true,
            packet_id: Some(1),
        };
        let len = publish.encode(&mut buf).unwrap();
        assert_eq!(
            &buf[..len],
            &[
                0x33, 0x0C, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x01, b'2', b'4', b'.', b'5',
                b'7',
            ]
        );
    }

    #[test]
    fn qos1_publish_requires_packet_id() {
        let publish = Publish {
            topic: "a",
            payload: b"1",
            qos: QoS::AtLeastOnce,
            retain: false,
            packet_id: None,
        };
        assert_eq!(
            publish.encode(&mut [0u8; 32]),
            Err(CodecError::Protocol(ProtocolError::MalformedPacket))
        );
    }

    #[test]
    fn publish_larger_than_buffer_is_rejected() {
        let publish = Publish {
            topic: "telemetry/temperature",
            payload: &[0u8; 64],
            qos: QoS::AtMostOnce,
            retain: true,
            packet_id: None,
        };
        assert_eq!(publish.encode(&mut [0u8; 32]), Err(CodecError::BufferTooSmall));
    }

    #[test]
    fn decodes_broker_packets() {
        assert_eq!(
            decode(&[0x20, 0x02, 0x00, 0x00]),
            Ok(MqttPacket::ConnAck(ConnAck {
                session_present: false,
                return_code: 0
            }))
        );
        assert_eq!(
            decode(&[0x20, 0x02, 0x01, 0x05]),
            Ok(MqttPacket::ConnAck(ConnAck {
                session_present: true,
                return_code: 5
            }))
        );
        assert_eq!(
            decode(&[0x40, 0x02, 0x12, 0x34]),
            Ok(MqttPacket::PubAck(PubAck { packet_id: 0x1234 }))
        );
        assert_eq!(
            decode(&[0x50, 0x02, 0x00, 0x09]),
            Ok(MqttPacket::PubRec(PubAck { packet_id: 9 }))
        );
        assert_eq!(
            decode(&[0x70, 0x02, 0x00, 0x09]),
            Ok(MqttPacket::PubComp(PubAck { packet_id: 9 }))
        );
        assert_eq!(decode(&[0xD0, 0x00]), Ok(MqttPacket::PingResp));
        assert_eq!(decode(&[0xB0, 0x02, 0x00, 0x01]), Ok(MqttPacket::Other(11)));
        // Nothing is subscribed; inbound messages are only reported by type.
        assert_eq!(
            decode(&[0x30, 0x04, 0x00, 0x01, b't', b'1']),
            Ok(MqttPacket::Other(3))
        );
        assert_eq!(
            decode(&[0xF0, 0x00]),
            Err(ProtocolError::InvalidPacketType(15))
        );
        assert_eq!(
            decode(&[0x20, 0x01, 0x00]),
            Err(ProtocolError::MalformedPacket)
        );
    }

    #[test]
    fn control_packets_are_two_bytes() {
        let mut buf = [0u8; 2];
        assert_eq!(PingReq.encode(&mut buf), Ok(2));
        assert_eq!(buf, [0xC0, 0x00]);
        assert_eq!(Disconnect.encode(&mut buf), Ok(2));
        assert_eq!(buf, [0xE0, 0x00]);
        assert_eq!(PingReq.encode(&mut [0u8; 1]), Err(CodecError::BufferTooSmall));

        let mut buf = [0u8; 4];
        assert_eq!(PubRel { packet_id: 0x0102 }.encode(&mut buf), Ok(4));
        assert_eq!(buf, [0x62, 0x02, 0x01, 0x02]);
    }
}
