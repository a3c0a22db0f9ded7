//! UDP datagram sockets
//!
//! Raw sends map one call to one datagram. Packets larger than the configured
//! datagram size are split and reassembled by [`crate::fragment`].

use std::net::{IpAddr, SocketAddr, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, error, info, warn};
use wirepack_core::{Identity, Packet, Transform};

use crate::error::{Error, Result};
use crate::fragment::{self, PendingPacket};
use crate::io;

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Let the OS choose the port
pub const ANY_PORT: u16 = 0;

/// UDP configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DatagramConfig {
    /// Maximum datagram payload; larger packets are fragmented
    pub max_datagram_size: usize,
    /// Allow sending to broadcast addresses (IPv4 only)
    pub broadcast: bool,
    /// Set SO_REUSEADDR before binding
    pub reuse_address: bool,
}

impl Default for DatagramConfig {
    fn default() -> Self {
        Self {
            max_datagram_size: MAX_DATAGRAM_SIZE, // Max UDP payload
            broadcast: true,
            reuse_address: true,
        }
    }
}

/// A UDP socket
///
/// The OS socket is created on [`DatagramSocket::bind`], or lazily by the
/// first send to an address of the matching family.
#[derive(Debug)]
pub struct DatagramSocket {
    socket: Option<UdpSocket>,
    blocking: bool,
    config: DatagramConfig,
    pending: PendingPacket,
}

impl Default for DatagramSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl DatagramSocket {
    pub fn new() -> Self {
        Self::with_config(DatagramConfig::default())
    }

    /// A zero `max_datagram_size` is raised to 1
    pub fn with_config(mut config: DatagramConfig) -> Self {
        if config.max_datagram_size == 0 {
            warn!("UDP max_datagram_size of 0 raised to 1");
            config.max_datagram_size = 1;
        }

        Self {
            socket: None,
            blocking: true,
            config,
            pending: PendingPacket::new(),
        }
    }

    pub fn config(&self) -> &DatagramConfig {
        &self.config
    }

    pub fn max_datagram_size(&self) -> usize {
        self.config.max_datagram_size
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        if let Some(socket) = &self.socket {
            if let Err(e) = socket.set_nonblocking(!blocking) {
                warn!("Failed to change UDP blocking mode: {}", e);
            }
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn is_bound(&self) -> bool {
        self.socket.is_some()
    }

    /// Local port, or 0 when no OS socket exists yet
    pub fn local_port(&self) -> u16 {
        self.local_addr().map_or(0, |addr| addr.port())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn create(&self, domain: Domain) -> Result<Socket> {
        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

        if self.config.reuse_address {
            socket.set_reuse_address(true)?;
        }
        if self.config.broadcast && domain == Domain::IPV4 {
            socket.set_broadcast(true)?;
        }
        socket.set_nonblocking(!self.blocking)?;

        Ok(socket)
    }

    /// Bind to `address:port`, replacing any previous binding
    ///
    /// Port [`ANY_PORT`] lets the OS choose; see [`DatagramSocket::local_port`].
    pub fn bind(&mut self, port: u16, address: impl Into<IpAddr>) -> Result<()> {
        self.unbind();

        let ip = address.into();
        if matches!(ip, IpAddr::V4(v4) if v4.is_broadcast()) {
            return Err(Error::BroadcastAddress);
        }

        let addr = SocketAddr::new(ip, port);
        let socket = self.create(Domain::for_address(addr))?;
        if let Err(e) = socket.bind(&addr.into()) {
            error!("Failed to bind UDP socket to {}: {}", addr, e);
            return Err(Error::Io(e));
        }

        let socket: UdpSocket = socket.into();
        info!("UDP bound to {}:{}", ip, socket.local_addr().map_or(0, |a| a.port()));
        self.socket = Some(socket);
        Ok(())
    }

    /// Close the OS socket and drop any partially reassembled packet
    pub fn unbind(&mut self) {
        if self.socket.take().is_some() {
            debug!("UDP socket closed");
        }
        self.pending.reset();
    }

    fn socket_for(&mut self, remote: SocketAddr) -> Result<&mut UdpSocket> {
        if self.socket.is_none() {
            let socket = self.create(Domain::for_address(remote))?;
            self.socket = Some(socket.into());
        }
        self.socket.as_mut().ok_or(Error::NotBound)
    }

    /// Send `data` as exactly one datagram
    ///
    /// Fails with [`Error::DatagramTooLarge`] above the configured maximum.
    pub fn send(&mut self, data: &[u8], remote: impl Into<SocketAddr>) -> Result<()> {
        let remote = remote.into();
        let max_size = self.config.max_datagram_size;
        io::check_datagram_size(data.len(), max_size)?;

        let socket = self.socket_for(remote)?;
        io::send_datagram(socket, data, remote, max_size)
    }

    /// Receive exactly one datagram, returning its size and sender
    ///
    /// A datagram longer than `buf` is truncated by the OS.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let socket = self.socket.as_mut().ok_or(Error::NotBound)?;
        io::recv_datagram(socket, buf)
    }

    pub fn send_packet(&mut self, packet: &Packet, remote: impl Into<SocketAddr>) -> Result<()> {
        self.send_packet_with(packet, remote, &mut Identity)
    }

    /// Send `packet` as one or more datagrams
    ///
    /// The first datagram that cannot be sent aborts the packet; the receiver
    /// will not be able to reassemble it.
    pub fn send_packet_with<T: Transform + ?Sized>(
        &mut self,
        packet: &Packet,
        remote: impl Into<SocketAddr>,
        transform: &mut T,
    ) -> Result<()> {
        let remote = remote.into();
        let max_size = self.config.max_datagram_size;
        let payload = transform.on_send(packet);
        let socket = self.socket_for(remote)?;
        fragment::send_fragmented(socket, &payload, remote, max_size)?;
        Ok(())
    }

    /// Receive one packet, returning the sender of its final datagram
    pub fn receive_packet(&mut self, packet: &mut Packet) -> Result<SocketAddr> {
        self.receive_packet_with(packet, &mut Identity)
    }

    /// Reassemble one packet and rebuild `packet` through `transform`
    ///
    /// Any failure, `NotReady` included, discards the datagrams gathered so
    /// far. Leaves `packet` untouched on failure.
    pub fn receive_packet_with<T: Transform + ?Sized>(
        &mut self,
        packet: &mut Packet,
        transform: &mut T,
    ) -> Result<SocketAddr> {
        let max_size = self.config.max_datagram_size;
        let socket = self.socket.as_mut().ok_or(Error::NotBound)?;
        let (payload, sender) = self.pending.receive(socket, max_size)?;
        transform.on_receive(packet, &payload);
        Ok(sender)
    }
}
