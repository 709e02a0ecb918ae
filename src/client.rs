//! # MQTT Session
//!
//! [`MqttSession`] speaks MQTT 3.1.1 over any byte stream a [`Network`]
//! opens and implements [`TransportSession`] on top of it. It only covers
//! what a publishing device needs: the `CONNECT` handshake, QoS 0/1/2
//! publishes with completion tracking, keep-alive and shutdown.

use core::pin::pin;

use embassy_net::IpAddress;
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Error as _, Read, Write};
use futures::future::{Either, select};
use heapless::Vec;

use crate::error::{ConnectReasonCode, ProtocolError, SessionError};
use crate::packet::{self, Connect, Disconnect, EncodePacket, MqttPacket, PingReq, PubRel, Publish};
use crate::runtime::PublishRequest;
use crate::session::{ConnectRequest, ConnectStatus, SessionEvent, TransportSession};
use crate::transport::Network;
use crate::util::frame_length;

/// Number of unacknowledged QoS 1/2 publishes tracked at once.
pub const MAX_IN_FLIGHT: usize = 8;

/// An MQTT 3.1.1 session over a [`Network`].
///
/// `BUF_SIZE` bounds both the largest outgoing and the largest incoming packet.
pub struct MqttSession<N: Network, const BUF_SIZE: usize> {
    network: N,
    connection: Option<N::Connection>,
    tx_buffer: [u8; BUF_SIZE],
    rx_buffer: [u8; BUF_SIZE],
    rx_len: usize,
    /// Length of the packet held in `tx_buffer` until it is fully written.
    tx_len: usize,
    tx_written: usize,
    next_packet_id: u16,
    in_flight: Vec<u16, MAX_IN_FLIGHT>,
    keep_alive: Duration,
    last_sent: Instant,
    ping_sent_at: Option<Instant>,
}

impl<N: Network, const BUF_SIZE: usize> MqttSession<N, BUF_SIZE> {
    /// Creates a disconnected session over `network`.
    pub fn new(network: N) -> Self {
        Self {
            network,
            connection: None,
            tx_buffer: [0; BUF_SIZE],
            rx_buffer: [0; BUF_SIZE],
            rx_len: 0,
            tx_len: 0,
            tx_written: 0,
            next_packet_id: 1,
            in_flight: Vec::new(),
            keep_alive: Duration::from_secs(0),
            last_sent: Instant::now(),
            ping_sent_at: None,
        }
    }

    /// Packet identifiers of publishes still waiting for their acknowledgement.
    pub fn in_flight(&self) -> &[u16] {
        &self.in_flight
    }

    /// The underlying network.
    pub fn network(&self) -> &N {
        &self.network
    }

    /// Sends `DISCONNECT` and closes the stream.
    pub async fn disconnect(&mut self) -> Result<(), SessionError<N::Error>> {
        if self.connection.is_none() {
            return Ok(());
        }
        let result = self.send(&Disconnect).await;
        self.close();
        info!("MQTT session closed");
        result
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.network.close(connection);
        }
        self.rx_len = 0;
        self.tx_len = 0;
        self.tx_written = 0;
        self.ping_sent_at = None;
        self.in_flight.clear();
    }

    fn allocate_packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }

    fn track(&mut self, packet_id: u16) {
        if self.in_flight.is_full() {
            let dropped = self.in_flight.remove(0);
            warn!("in-flight table full, forgetting packet {}", dropped);
        }
        let _ = self.in_flight.push(packet_id);
    }

    fn complete(&mut self, packet_id: u16) {
        match self.in_flight.iter().position(|id| *id == packet_id) {
            Some(index) => {
                self.in_flight.remove(index);
            }
            None => debug!("acknowledgement for unknown packet {}", packet_id),
        }
    }

    /// Writes out whatever is left of the queued packet.
    ///
    /// Cancel-safe: `tx_written` only moves after a write completes, so a
    /// packet cut off by a dropped future is finished by the next caller
    /// before anything else reaches the stream.
    async fn write_pending(&mut self) -> Result<(), SessionError<N::Error>> {
        if self.tx_len == 0 {
            return Ok(());
        }
        let connection = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        while self.tx_written < self.tx_len {
            let n = connection
                .write(&self.tx_buffer[self.tx_written..self.tx_len])
                .await
                .map_err(|e| SessionError::Io(e.kind()))?;
            if n == 0 {
                return Err(SessionError::ConnectionClosed);
            }
            self.tx_written += n;
        }
        connection
            .flush()
            .await
            .map_err(|e| SessionError::Io(e.kind()))?;
        self.tx_len = 0;
        self.tx_written = 0;
        Ok(())
    }

    /// Encodes `packet` into the transmit buffer. The buffer must be drained.
    fn queue(&mut self, packet: &impl EncodePacket) -> Result<(), SessionError<N::Error>> {
        if self.connection.is_none() {
            return Err(SessionError::NotConnected);
        }
        self.tx_len = packet.encode(&mut self.tx_buffer)?;
        self.tx_written = 0;
        self.last_sent = Instant::now();
        Ok(())
    }

    async fn send(&mut self, packet: &impl EncodePacket) -> Result<(), SessionError<N::Error>> {
        self.write_pending().await?;
        self.queue(packet)?;
        self.write_pending().await
    }

    /// Reads once from the stream, appending to the receive buffer.
    ///
    /// Cancel-safe: `rx_len` only moves after a read completes.
    async fn read_more(&mut self) -> Result<(), SessionError<N::Error>> {
        if self.rx_len == BUF_SIZE {
            // An incoming packet larger than the buffer cannot be skipped.
            return Err(ProtocolError::PayloadTooLarge.into());
        }
        let connection = self.connection.as_mut().ok_or(SessionError::NotConnected)?;
        let n = connection
            .read(&mut self.rx_buffer[self.rx_len..])
            .await
            .map_err(|e| SessionError::Io(e.kind()))?;
        if n == 0 {
            return Err(SessionError::ConnectionClosed);
        }
        self.rx_len += n;
        Ok(())
    }

    fn buffered_frame(&self) -> Result<Option<usize>, ProtocolError> {
        frame_length(&self.rx_buffer[..self.rx_len])
    }

    fn consume(&mut self, len: usize) {
        self.rx_buffer.copy_within(len..self.rx_len, 0);
        self.rx_len -= len;
    }

    async fn read_connack(&mut self) -> Result<ConnectStatus, SessionError<N::Error>> {
        loop {
            if let Some(len) = self.buffered_frame()? {
                let packet = packet::decode(&self.rx_buffer[..len])?;
                let status = match packet {
                    MqttPacket::ConnAck(ack) if ack.return_code == 0 => ConnectStatus::Accepted,
                    MqttPacket::ConnAck(ack) => {
                        ConnectStatus::Rejected(ConnectReasonCode::from(ack.return_code))
                    }
                    other => {
                        return Err(ProtocolError::UnexpectedPacket(other.packet_type()).into());
                    }
                };
                self.consume(len);
                return Ok(status);
            }
            self.read_more().await?;
        }
    }

    async fn establish(
        &mut self,
        request: &ConnectRequest<'_>,
    ) -> Result<ConnectStatus, SessionError<N::Error>> {
        // Also returns a stream left behind by a cancelled attempt.
        self.close();
        let connection = self
            .network
            .open(
                request.address,
                request.port,
                request.broker_host,
                request.tls.as_ref(),
            )
            .await
            .map_err(SessionError::Network)?;
        self.connection = Some(connection);

        let client = &request.client;
        let mut connect = Connect::new(client.client_id, client.keep_alive_secs);
        if let Some(username) = client.username {
            connect.username = Some(username);
            connect.password = client.password.map(str::as_bytes);
        }
        self.send(&connect).await?;

        let status = self.read_connack().await?;
        if status == ConnectStatus::Accepted {
            self.keep_alive = Duration::from_secs(u64::from(client.keep_alive_secs));
        }
        Ok(status)
    }

    async fn queue_publish(&mut self, publish: &Publish<'_>) -> Result<(), SessionError<N::Error>> {
        self.write_pending().await?;
        self.queue(publish)?;
        if let Some(id) = publish.packet_id {
            self.track(id);
        }
        self.write_pending().await
    }

    fn keep_alive_deadline(&self) -> Instant {
        if self.keep_alive.as_ticks() == 0 {
            return Instant::MAX;
        }
        match self.ping_sent_at {
            Some(sent) => sent + self.keep_alive,
            None => self.last_sent + self.keep_alive,
        }
    }

    async fn service_keep_alive(&mut self) -> Result<(), SessionError<N::Error>> {
        if self.ping_sent_at.is_some() {
            warn!("no PINGRESP within keep-alive");
            return Err(SessionError::KeepAliveTimeout);
        }
        self.write_pending().await?;
        trace!("sending PINGREQ");
        self.queue(&PingReq)?;
        self.ping_sent_at = Some(self.last_sent);
        self.write_pending().await
    }

    async fn next_event(&mut self) -> Result<SessionEvent, SessionError<N::Error>> {
        self.write_pending().await?;
        loop {
            if let Some(len) = self.buffered_frame()? {
                let packet = packet::decode(&self.rx_buffer[..len])?;
                let release = match packet {
                    MqttPacket::PubRec(rec) => Some(rec.packet_id),
                    _ => None,
                };
                let event = match packet {
                    MqttPacket::PubAck(ack) | MqttPacket::PubComp(ack) => {
                        SessionEvent::PublishAcknowledged {
                            packet_id: ack.packet_id,
                        }
                    }
                    MqttPacket::PingResp => SessionEvent::PingResponse,
                    other => SessionEvent::Unhandled(other.packet_type()),
                };
                self.consume(len);

                match event {
                    SessionEvent::PublishAcknowledged { packet_id } => self.complete(packet_id),
                    SessionEvent::PingResponse => self.ping_sent_at = None,
                    _ => {}
                }
                if let Some(packet_id) = release {
                    self.send(&PubRel { packet_id }).await?;
                }
                return Ok(event);
            }

            let deadline = self.keep_alive_deadline();
            if Instant::now() >= deadline {
                self.service_keep_alive().await?;
                continue;
            }

            let timer = Timer::at(deadline);
            match select(pin!(self.read_more()), pin!(timer)).await {
                Either::Left((result, _)) => result?,
                Either::Right(((), _)) => {}
            }
        }
    }
}

fn breaks_link<E>(err: &SessionError<E>) -> bool {
    !matches!(err, SessionError::BufferTooSmall | SessionError::NotConnected)
}

impl<N: Network, const BUF_SIZE: usize> TransportSession for MqttSession<N, BUF_SIZE> {
    type Error = SessionError<N::Error>;

    async fn resolve(&mut self, host: &str) -> Result<Option<IpAddress>, Self::Error> {
        self.network
            .resolve(host)
            .await
            .map_err(SessionError::Network)
    }

    async fn connect(&mut self, request: &ConnectRequest<'_>) -> Result<ConnectStatus, Self::Error> {
        let result = self.establish(request).await;
        if !matches!(result, Ok(ConnectStatus::Accepted)) {
            self.close();
        }
        result
    }

    async fn publish(&mut self, request: &PublishRequest<'_>) -> Result<Option<u16>, Self::Error> {
        if self.connection.is_none() {
            return Err(SessionError::NotConnected);
        }
        let packet_id = match request.qos {
            packet::QoS::AtMostOnce => None,
            _ => Some(self.allocate_packet_id()),
        };
        let publish = Publish {
            topic: request.topic,
            payload: request.payload,
            qos: request.qos,
            retain: request.retain,
            packet_id,
        };
        let result = self.queue_publish(&publish).await;
        if let Err(e) = &result {
            if breaks_link(e) {
                self.close();
            }
        }
        result.map(|()| packet_id)
    }

    async fn poll(&mut self) -> Result<SessionEvent, Self::Error> {
        let result = self.next_event().await;
        if let Err(e) = &result {
            if breaks_link(e) {
                warn!("MQTT session lost: {:?}", e);
                self.close();
            }
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use core::convert::Infallible;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use embassy_futures::block_on;
    use embassy_net::Ipv4Address;

    use crate::config::TlsConfig;
    use crate::packet::QoS;
    use crate::session::ClientInfo;

    /// Replays scripted broker bytes and records everything written.
    struct ScriptedStream {
        incoming: std::vec::Vec<u8>,
        position: usize,
        hang_at_end: bool,
        one_byte_writes: bool,
        written: Rc<RefCell<std::vec::Vec<u8>>>,
    }

    impl embedded_io_async::ErrorType for ScriptedStream {
        type Error = Infallible;
    }

    impl Read for ScriptedStream {
        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            if self.position == self.incoming.len() && self.hang_at_end {
                core::future::pending::<()>().await;
            }
            let n = buf.len().min(self.incoming.len() - self.position);
            buf[..n].copy_from_slice(&self.incoming[self.position..self.position + n]);
            self.position += n;
            Ok(n)
        }
    }

    impl Write for ScriptedStream {
        async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            if self.one_byte_writes {
                // A congested socket: one byte per call, after a scheduling point.
                embassy_futures::yield_now().await;
                self.written.borrow_mut().push(buf[0]);
                return Ok(1);
            }
            self.written.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
    }

    /// Hands out one stream at a time, each replaying the next script.
    struct ScriptedNetwork {
        scripts: VecDeque<std::vec::Vec<u8>>,
        stream_out: bool,
        opens: usize,
        hang_at_end: bool,
        one_byte_writes: bool,
        written: Rc<RefCell<std::vec::Vec<u8>>>,
        opened_with_tls: bool,
    }

    impl ScriptedNetwork {
        fn new(incoming: &[u8]) -> Self {
            Self {
                scripts: VecDeque::from([incoming.to_vec()]),
                stream_out: false,
                opens: 0,
                hang_at_end: false,
                one_byte_writes: false,
                written: Rc::default(),
                opened_with_tls: false,
            }
        }

        fn then(mut self, incoming: &[u8]) -> Self {
            self.scripts.push_back(incoming.to_vec());
            self
        }
    }

    impl Network for ScriptedNetwork {
        type Error = ();
        type Connection = ScriptedStream;

        async fn resolve(&mut self, host: &str) -> Result<Option<IpAddress>, Self::Error> {
            Ok((host == "broker.local").then_some(IpAddress::Ipv4(Ipv4Address::new(10, 0, 0, 2))))
        }

        async fn open(
            &mut self,
            _address: IpAddress,
            _port: u16,
            _server_name: &str,
            tls: Option<&TlsConfig<'_>>,
        ) -> Result<Self::Connection, Self::Error> {
            if self.stream_out {
                return Err(());
            }
            self.stream_out = true;
            self.opens += 1;
            self.opened_with_tls = tls.is_some();
            Ok(ScriptedStream {
                incoming: self.scripts.pop_front().unwrap_or_default(),
                position: 0,
                hang_at_end: self.hang_at_end,
                one_byte_writes: self.one_byte_writes,
                written: self.written.clone(),
            })
        }

        fn close(&mut self, _connection: Self::Connection) {
            self.stream_out = false;
        }
    }

    fn request(keep_alive_secs: u16) -> ConnectRequest<'static> {
        ConnectRequest {
            address: IpAddress::Ipv4(Ipv4Address::new(10, 0, 0, 2)),
            port: 8883,
            broker_host: "broker.local",
            client: ClientInfo {
                client_id: "Bitdoglab",
                keep_alive_secs,
                username: Some("user"),
                password: Some("pass"),
            },
            tls: Some(TlsConfig::unverified()),
        }
    }

    const CONNACK_OK: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    #[test]
    fn resolve_delegates_to_network() {
        let mut session = MqttSession::<_, 128>::new(ScriptedNetwork::new(&[]));
        assert_eq!(
            block_on(session.resolve("broker.local")).unwrap(),
            Some(IpAddress::Ipv4(Ipv4Address::new(10, 0, 0, 2)))
        );
        assert_eq!(block_on(session.resolve("unknown.local")).unwrap(), None);
    }

    #[test]
    fn accepted_connect_sends_credentials() {
        let mut session = MqttSession::<_, 128>::new(ScriptedNetwork::new(&CONNACK_OK));
        let status = block_on(session.connect(&request(60))).unwrap();

        assert_eq!(status, ConnectStatus::Accepted);
        assert!(session.is_connected());
        assert!(session.network().opened_with_tls);

        let written = session.network().written.borrow();
        assert_eq!(written[0], 0x10);
        // Clean session with user name and password.
        assert_eq!(written[9], 0xC2);
        assert!(written.ends_with(&[0x00, 0x04, b'p', b'a', b's', b's']));
    }

    #[test]
    fn rejected_connect_closes_the_stream() {
        let mut session =
            MqttSession::<_, 128>::new(ScriptedNetwork::new(&[0x20, 0x02, 0x00, 0x05]));
        let status = block_on(session.connect(&request(60))).unwrap();

        assert_eq!(
            status,
            ConnectStatus::Rejected(ConnectReasonCode::NotAuthorized)
        );
        assert!(!session.is_connected());
    }

    #[test]
    fn unexpected_handshake_packet_is_a_protocol_error() {
        let mut session = MqttSession::<_, 128>::new(ScriptedNetwork::new(&[0xD0, 0x00]));
        let result = block_on(session.connect(&request(60)));

        assert!(matches!(
            result,
            Err(SessionError::Protocol(ProtocolError::UnexpectedPacket(13)))
        ));
        assert!(!session.is_connected());
    }

    #[test]
    fn qos1_publish_completes_on_puback_then_eof_drops_link() {
        let mut incoming = CONNACK_OK.to_vec();
        incoming.extend_from_slice(&[0x40, 0x02, 0x00, 0x01]);
        let mut session = MqttSession::<_, 128>::new(ScriptedNetwork::new(&incoming));
        block_on(session.connect(&request(60))).unwrap();
        let connect_len = session.network().written.borrow().len();

        let publish = PublishRequest {
            topic: "a/b",
            payload: b"24.57",
            qos: QoS::AtLeastOnce,
            retain: true,
        };
        assert_eq!(block_on(session.publish(&publish)).unwrap(), Some(1));
        assert_eq!(session.in_flight(), &[1]);
        assert_eq!(
            &session.network().written.borrow()[connect_len..],
            &[
                0x33, 0x0C, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x01, b'2', b'4', b'.', b'5',
                b'7',
            ]
        );

        assert_eq!(
            block_on(session.poll()).unwrap(),
            SessionEvent::PublishAcknowledged { packet_id: 1 }
        );
        assert!(session.in_flight().is_empty());

        assert!(matches!(
            block_on(session.poll()),
            Err(SessionError::ConnectionClosed)
        ));
        assert!(!session.is_connected());
        assert!(matches!(
            block_on(session.publish(&publish)),
            Err(SessionError::NotConnected)
        ));
    }

    #[test]
    fn qos0_publish_has_no_packet_id() {
        let mut session = MqttSession::<_, 128>::new(ScriptedNetwork::new(&CONNACK_OK));
        block_on(session.connect(&request(60))).unwrap();

        let publish = PublishRequest {
            topic: "a",
            payload: b"1",
            qos: QoS::AtMostOnce,
            retain: false,
        };
        assert_eq!(block_on(session.publish(&publish)).unwrap(), None);
        assert!(session.in_flight().is_empty());
    }

    #[test]
    fn qos2_publish_is_released_and_completed() {
        let mut incoming = CONNACK_OK.to_vec();
        incoming.extend_from_slice(&[0x50, 0x02, 0x00, 0x01, 0x70, 0x02, 0x00, 0x01]);
        let mut session = MqttSession::<_, 128>::new(ScriptedNetwork::new(&incoming));
        block_on(session.connect(&request(60))).unwrap();

        let publish = PublishRequest {
            topic: "a",
            payload: b"1",
            qos: QoS::ExactlyOnce,
            retain: false,
        };
        assert_eq!(block_on(session.publish(&publish)).unwrap(), Some(1));

        assert_eq!(block_on(session.poll()).unwrap(), SessionEvent::Unhandled(5));
        assert!(
            session
                .network()
                .written
                .borrow()
                .ends_with(&[0x62, 0x02, 0x00, 0x01])
        );
        assert_eq!(
            block_on(session.poll()).unwrap(),
            SessionEvent::PublishAcknowledged { packet_id: 1 }
        );
        assert!(session.in_flight().is_empty());
    }

    #[test]
    fn silent_broker_fails_keep_alive() {
        let mut network = ScriptedNetwork::new(&CONNACK_OK);
        network.hang_at_end = true;
        let mut session = MqttSession::<_, 128>::new(network);
        block_on(session.connect(&request(1))).unwrap();

        let result = block_on(session.poll());

        assert!(matches!(result, Err(SessionError::KeepAliveTimeout)));
        assert!(!session.is_connected());
        assert!(session.network().written.borrow().ends_with(&[0xC0, 0x00]));
    }

    #[test]
    fn interrupted_ping_is_finished_before_the_next_publish() {
        let mut network = ScriptedNetwork::new(&CONNACK_OK);
        network.hang_at_end = true;
        network.one_byte_writes = true;
        let mut session = MqttSession::<_, 128>::new(network);
        block_on(session.connect(&request(1))).unwrap();
        let connect_len = session.network().written.borrow().len();

        let publish = PublishRequest {
            topic: "t",
            payload: b"1",
            qos: QoS::AtLeastOnce,
            retain: false,
        };
        let packet_id = block_on(async {
            Timer::after(Duration::from_millis(1100)).await;
            // Dropped after the first byte of PINGREQ went out.
            let _ = embassy_futures::select::select(session.poll(), embassy_futures::yield_now())
                .await;
            session.publish(&publish).await
        })
        .unwrap();

        assert_eq!(packet_id, Some(1));
        assert_eq!(
            &session.network().written.borrow()[connect_len..],
            &[0xC0, 0x00, 0x32, 0x06, 0x00, 0x01, b't', 0x00, 0x01, b'1']
        );
        assert!(session.is_connected());
    }

    #[test]
    fn interrupted_publish_is_completed_by_the_next_poll() {
        let mut incoming = CONNACK_OK.to_vec();
        incoming.extend_from_slice(&[0x40, 0x02, 0x00, 0x01]);
        let mut network = ScriptedNetwork::new(&incoming);
        network.one_byte_writes = true;
        let mut session = MqttSession::<_, 128>::new(network);
        block_on(session.connect(&request(60))).unwrap();
        let connect_len = session.network().written.borrow().len();

        let publish = PublishRequest {
            topic: "t",
            payload: b"1",
            qos: QoS::AtLeastOnce,
            retain: false,
        };
        block_on(async {
            let _ = embassy_futures::select::select(
                session.publish(&publish),
                embassy_futures::yield_now(),
            )
            .await;
        });
        assert_eq!(session.network().written.borrow().len(), connect_len + 1);
        assert_eq!(session.in_flight(), &[1]);

        assert_eq!(
            block_on(session.poll()).unwrap(),
            SessionEvent::PublishAcknowledged { packet_id: 1 }
        );
        assert_eq!(
            &session.network().written.borrow()[connect_len..],
            &[0x32, 0x06, 0x00, 0x01, b't', 0x00, 0x01, b'1']
        );
    }

    #[test]
    fn handshake_failure_frees_the_stream_for_a_retry() {
        // The first stream closes before CONNACK.
        let network = ScriptedNetwork::new(&[]).then(&CONNACK_OK);
        let mut session = MqttSession::<_, 128>::new(network);

        assert!(matches!(
            block_on(session.connect(&request(60))),
            Err(SessionError::ConnectionClosed)
        ));
        assert!(!session.is_connected());

        assert_eq!(
            block_on(session.connect(&request(60))).unwrap(),
            ConnectStatus::Accepted
        );
        assert_eq!(session.network().opens, 2);
    }

    #[test]
    fn cancelled_connect_frees_the_stream_for_a_retry() {
        let mut network = ScriptedNetwork::new(&CONNACK_OK).then(&CONNACK_OK);
        network.one_byte_writes = true;
        let mut session = MqttSession::<_, 128>::new(network);

        // Gives up mid-CONNECT, as a connect timeout would.
        block_on(async {
            let _ = embassy_futures::select::select(
                session.connect(&request(60)),
                embassy_futures::yield_now(),
            )
            .await;
        });

        assert_eq!(
            block_on(session.connect(&request(60))).unwrap(),
            ConnectStatus::Accepted
        );
        assert_eq!(session.network().opens, 2);
    }

    #[test]
    fn disconnect_sends_disconnect_packet() {
        let mut session = MqttSession::<_, 128>::new(ScriptedNetwork::new(&CONNACK_OK));
        block_on(session.connect(&request(60))).unwrap();

        block_on(session.disconnect()).unwrap();

        assert!(!session.is_connected());
        assert!(session.network().written.borrow().ends_with(&[0xE0, 0x00]));
    }
}
