//! # Network Abstraction
//!
//! This module defines the `Network` trait, which resolves the broker and
//! opens the byte stream an [`MqttSession`](crate::client::MqttSession) runs
//! over, keeping the session independent of the network stack and of the TLS
//! implementation.

use embassy_net::dns::{self, DnsQueryType};
use embassy_net::tcp::{ConnectError, State, TcpSocket};
use embassy_net::{IpAddress, Stack};
use embassy_time::Duration;
use embedded_io_async::{Read, Write};

use crate::config::TlsConfig;

/// Resolves hostnames and opens streams to the broker.
#[allow(async_fn_in_trait)]
pub trait Network {
    /// The error type returned by the network.
    type Error: core::fmt::Debug;

    /// The open stream; a TLS stream when TLS material was given.
    type Connection: Read + Write;

    /// Resolve `host` to an address. `Ok(None)` means the name has no address.
    async fn resolve(&mut self, host: &str) -> Result<Option<IpAddress>, Self::Error>;

    /// Open a stream to `address:port`.
    ///
    /// `server_name` is the hostname the address came from; networks that do
    /// TLS check the broker certificate against it.
    async fn open(
        &mut self,
        address: IpAddress,
        port: u16,
        server_name: &str,
        tls: Option<&TlsConfig<'_>>,
    ) -> Result<Self::Connection, Self::Error>;

    /// Take back a connection the session is done with.
    fn close(&mut self, connection: Self::Connection) {
        drop(connection);
    }
}

/// Errors returned by [`TcpNetwork`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TcpNetworkError {
    /// The DNS query failed for a reason other than a missing name.
    Dns(dns::Error),
    /// The TCP connection could not be established.
    Connect(ConnectError),
    /// The socket is already handed out to an open connection.
    SocketInUse,
    /// TLS material was given; this network only does plain TCP.
    TlsUnsupported,
}

/// Plain TCP network using `embassy-net`.
///
/// Owns a single socket, so only one connection can be open at a time. The
/// socket comes back through [`Network::close`] and is reused by the next
/// [`open`](Network::open).
pub struct TcpNetwork<'a> {
    stack: Stack<'a>,
    socket: Option<TcpSocket<'a>>,
}

impl<'a> TcpNetwork<'a> {
    /// Creates a new `TcpNetwork` over `stack`, with the given socket buffers
    /// and socket inactivity timeout.
    pub fn new(
        stack: Stack<'a>,
        rx_buffer: &'a mut [u8],
        tx_buffer: &'a mut [u8],
        timeout: Duration,
    ) -> Self {
        let mut socket = TcpSocket::new(stack, rx_buffer, tx_buffer);
        socket.set_timeout(Some(timeout));
        Self {
            stack,
            socket: Some(socket),
        }
    }
}

impl<'a> Network for TcpNetwork<'a> {
    type Error = TcpNetworkError;
    type Connection = TcpSocket<'a>;

    async fn resolve(&mut self, host: &str) -> Result<Option<IpAddress>, Self::Error> {
        match self.stack.dns_query(host, DnsQueryType::A).await {
            Ok(addresses) => Ok(addresses.first().copied()),
            Err(dns::Error::Failed) => Ok(None),
            Err(e) => Err(TcpNetworkError::Dns(e)),
        }
    }

    async fn open(
        &mut self,
        address: IpAddress,
        port: u16,
        _server_name: &str,
        tls: Option<&TlsConfig<'_>>,
    ) -> Result<Self::Connection, Self::Error> {
        if tls.is_some() {
            return Err(TcpNetworkError::TlsUnsupported);
        }
        // The socket stays here until connected, so a cancelled open keeps it.
        let socket = self.socket.as_mut().ok_or(TcpNetworkError::SocketInUse)?;
        if socket.state() != State::Closed {
            socket.abort();
        }

        debug!("TCP connect to {:?}:{}", address, port);
        if let Err(e) = socket.connect((address, port)).await {
            warn!("TCP connect failed: {:?}", e);
            socket.abort();
            return Err(TcpNetworkError::Connect(e));
        }
        self.socket.take().ok_or(TcpNetworkError::SocketInUse)
    }

    fn close(&mut self, mut connection: Self::Connection) {
        connection.close();
        self.socket = Some(connection);
    }
}
