//! TCP stream sockets
//!
//! Packets travel as length-prefixed frames (see [`crate::framing`]). All
//! calls are synchronous: in blocking mode they wait for the OS, in
//! non-blocking mode they return [`Error::NotReady`] instead of waiting.

use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, SockRef, Socket, TcpKeepalive, Type};
use tracing::{debug, error, info, warn};
use wirepack_core::{Identity, Packet, Transform};

use crate::error::{Error, Result};
use crate::framing::{self, PendingFrame};
use crate::io;

/// Largest frame accepted by default (64 MiB)
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64 * 1024 * 1024;

/// Pending connection queue length for listeners
const LISTEN_BACKLOG: i32 = 128;

/// TCP configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct StreamConfig {
    /// Largest packet payload accepted from a frame header
    pub max_packet_size: usize,
    /// Disable Nagle's algorithm
    pub nodelay: bool,
    /// Keep-alive idle time in seconds (0 = disabled)
    pub keepalive_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            nodelay: true,
            keepalive_secs: 0,
        }
    }
}

fn is_broadcast(ip: &IpAddr) -> bool {
    matches!(ip, IpAddr::V4(v4) if v4.is_broadcast())
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const EINPROGRESS: i32 = 115;

#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
const EINPROGRESS: i32 = 36;

#[cfg(unix)]
fn is_einprogress(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(EINPROGRESS)
}

#[cfg(not(unix))]
fn is_einprogress(_e: &std::io::Error) -> bool {
    false
}

/// Whether a non-blocking connect was started and has not finished yet
fn is_connect_in_progress(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock || is_einprogress(e)
}

/// A connected TCP socket
///
/// The OS socket is created by [`StreamSocket::connect`] (or handed over by
/// [`StreamListener::accept`]) and closed on [`StreamSocket::disconnect`] or
/// drop.
#[derive(Debug)]
pub struct StreamSocket {
    stream: Option<TcpStream>,
    /// A non-blocking connect is still in flight on `stream`
    connecting: bool,
    blocking: bool,
    config: StreamConfig,
    pending: PendingFrame,
}

impl Default for StreamSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSocket {
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            stream: None,
            connecting: false,
            blocking: true,
            config,
            pending: PendingFrame::new(),
        }
    }

    fn from_stream(stream: TcpStream, config: StreamConfig) -> Result<Self> {
        let socket = Self::with_config(config);
        socket.configure(&stream)?;
        Ok(Self {
            stream: Some(stream),
            ..socket
        })
    }

    fn configure(&self, stream: &TcpStream) -> Result<()> {
        stream.set_nodelay(self.config.nodelay)?;

        if self.config.keepalive_secs > 0 {
            let keepalive =
                TcpKeepalive::new().with_time(Duration::from_secs(self.config.keepalive_secs));
            if let Err(e) = SockRef::from(stream).set_tcp_keepalive(&keepalive) {
                warn!("Failed to enable TCP keep-alive: {}", e);
            }
        }

        stream.set_nonblocking(!self.blocking)?;
        Ok(())
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Switch between blocking and non-blocking mode
    ///
    /// Takes effect immediately if connected, otherwise on the next connect.
    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.set_nonblocking(!blocking) {
                warn!("Failed to change TCP blocking mode: {}", e);
            }
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Whether a connection is established
    ///
    /// False while a non-blocking connect is still in flight.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some() && (!self.connecting || self.peer_addr().is_some())
    }

    /// Local port, or 0 when not connected
    pub fn local_port(&self) -> u16 {
        self.stream
            .as_ref()
            .and_then(|s| s.local_addr().ok())
            .map_or(0, |addr| addr.port())
    }

    pub fn remote_address(&self) -> Option<IpAddr> {
        self.peer_addr().map(|addr| addr.ip())
    }

    /// Remote port, or 0 when not connected
    pub fn remote_port(&self) -> u16 {
        self.peer_addr().map_or(0, |addr| addr.port())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Connect to `remote`
    ///
    /// Any existing connection is closed first. In blocking mode this waits at
    /// most `timeout` (zero waits forever) and a timeout is an error. In
    /// non-blocking mode the connect is only started: it returns
    /// [`Error::NotReady`] at once while the handshake is in flight, and
    /// [`StreamSocket::poll_connect`] reports when it completes. A refused
    /// connection is always an error.
    pub fn connect(&mut self, remote: impl Into<SocketAddr>, timeout: Duration) -> Result<()> {
        let remote = remote.into();
        self.disconnect();

        debug!("Connecting to TCP: {}", remote);

        let socket = Socket::new(Domain::for_address(remote), Type::STREAM, Some(Protocol::TCP))?;

        if !self.blocking {
            socket.set_nonblocking(true)?;
            return match socket.connect(&remote.into()) {
                Ok(()) => self.attach(socket.into(), remote),
                Err(e) if is_connect_in_progress(&e) => {
                    debug!("TCP connect to {} in progress", remote);
                    let stream: TcpStream = socket.into();
                    self.configure(&stream)?;
                    self.stream = Some(stream);
                    self.connecting = true;
                    Err(Error::NotReady)
                }
                Err(e) => {
                    error!("TCP connect to {} failed: {}", remote, e);
                    Err(Error::Io(e))
                }
            };
        }

        let outcome = if timeout.is_zero() {
            socket.connect(&remote.into())
        } else {
            socket.connect_timeout(&remote.into(), timeout)
        };

        match outcome {
            Ok(()) => self.attach(socket.into(), remote),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                debug!("TCP connect to {} timed out after {:?}", remote, timeout);
                Err(Error::Timeout)
            }
            Err(e) => {
                error!("TCP connect to {} failed: {}", remote, e);
                Err(Error::Io(e))
            }
        }
    }

    fn attach(&mut self, stream: TcpStream, remote: SocketAddr) -> Result<()> {
        self.configure(&stream)?;
        self.stream = Some(stream);
        self.connecting = false;

        info!("TCP connected to {}", remote);
        Ok(())
    }

    /// Check on a connect started in non-blocking mode
    ///
    /// `Ok` once the connection is established, [`Error::NotReady`] while the
    /// handshake is still in flight. If the connect failed the socket is
    /// closed and the failure returned.
    pub fn poll_connect(&mut self) -> Result<()> {
        let stream = self.stream.as_ref().ok_or(Error::NotConnected)?;
        if !self.connecting {
            return Ok(());
        }

        if let Some(e) = stream.take_error()? {
            error!("TCP connect failed: {}", e);
            self.disconnect();
            return Err(Error::Io(e));
        }

        match stream.peer_addr() {
            Ok(remote) => {
                self.connecting = false;
                info!("TCP connected to {}", remote);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected => Err(Error::NotReady),
            Err(e) => {
                self.disconnect();
                Err(Error::Io(e))
            }
        }
    }

    /// Close the connection, dropping any half-received frame
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            debug!("TCP disconnecting from {:?}", stream.peer_addr().ok());
        }
        self.connecting = false;
        self.pending.reset();
    }

    fn stream_mut(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(Error::NotConnected)
    }

    /// Write `data` with one OS call
    ///
    /// A short write is [`Error::Partial`] with the number of bytes accepted;
    /// the caller resumes with the rest.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream_mut()?;
        io::send(stream, data)
    }

    /// Read up to `buf.len()` bytes, returning how many arrived
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize> {
        let stream = self.stream_mut()?;
        io::recv(stream, buf)
    }

    pub fn send_packet(&mut self, packet: &mut Packet) -> Result<()> {
        self.send_packet_with(packet, &mut Identity)
    }

    /// Frame and send `packet`, passing its bytes through `transform`
    ///
    /// Short writes are resumed internally. In non-blocking mode a send that
    /// stalls after part of the frame went out returns [`Error::Partial`] and
    /// records the progress in the packet; call again with the same packet to
    /// finish it.
    pub fn send_packet_with<T: Transform + ?Sized>(
        &mut self,
        packet: &mut Packet,
        transform: &mut T,
    ) -> Result<()> {
        let frame = framing::encode_frame(&transform.on_send(packet))?;
        let stream = self.stream_mut()?;

        let mut pos = packet.send_position();
        if pos > frame.len() {
            pos = 0;
        }

        match framing::send_frame(stream, &frame, &mut pos) {
            Ok(()) => {
                packet.set_send_position(0);
                debug!("Sent frame of {} bytes", frame.len() - framing::HEADER_SIZE);
                Ok(())
            }
            Err(Error::NotReady) if pos > 0 => {
                packet.set_send_position(pos);
                Err(Error::Partial { sent: pos })
            }
            Err(e) => {
                packet.set_send_position(0);
                if matches!(e, Error::Disconnected) {
                    debug!("TCP peer disconnected during send");
                }
                Err(e)
            }
        }
    }

    pub fn receive_packet(&mut self, packet: &mut Packet) -> Result<()> {
        self.receive_packet_with(packet, &mut Identity)
    }

    /// Read one whole frame and rebuild `packet` from it through `transform`
    ///
    /// In non-blocking mode a frame that is not complete yet returns
    /// [`Error::NotReady`] and is resumed by the next call. On any other
    /// failure the contents of `packet` are unspecified.
    pub fn receive_packet_with<T: Transform + ?Sized>(
        &mut self,
        packet: &mut Packet,
        transform: &mut T,
    ) -> Result<()> {
        let max_size = self.config.max_packet_size;
        let stream = self.stream.as_mut().ok_or(Error::NotConnected)?;

        match self.pending.receive(stream, max_size) {
            Ok(payload) => {
                transform.on_receive(packet, &payload);
                Ok(())
            }
            Err(e) => {
                if matches!(e, Error::Disconnected) {
                    debug!("TCP peer disconnected during receive");
                }
                Err(e)
            }
        }
    }
}

/// A listening TCP socket
#[derive(Debug)]
pub struct StreamListener {
    listener: Option<TcpListener>,
    blocking: bool,
    config: StreamConfig,
}

impl Default for StreamListener {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamListener {
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    /// `config` is applied to every accepted socket
    pub fn with_config(config: StreamConfig) -> Self {
        Self {
            listener: None,
            blocking: true,
            config,
        }
    }

    pub fn set_blocking(&mut self, blocking: bool) {
        self.blocking = blocking;
        if let Some(listener) = &self.listener {
            if let Err(e) = listener.set_nonblocking(!blocking) {
                warn!("Failed to change TCP listener blocking mode: {}", e);
            }
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// Local port, or 0 when not listening
    pub fn local_port(&self) -> u16 {
        self.listener
            .as_ref()
            .and_then(|l| l.local_addr().ok())
            .map_or(0, |addr| addr.port())
    }

    /// Start listening on `address:port` (port 0 picks a free one)
    pub fn listen(&mut self, port: u16, address: impl Into<IpAddr>) -> Result<()> {
        self.close();

        let ip = address.into();
        if is_broadcast(&ip) {
            return Err(Error::BroadcastAddress);
        }

        let addr = SocketAddr::new(ip, port);
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        if let Err(e) = socket.bind(&addr.into()) {
            error!("Failed to bind TCP listener to {}: {}", addr, e);
            return Err(Error::Io(e));
        }
        socket.listen(LISTEN_BACKLOG)?;

        let listener: TcpListener = socket.into();
        listener.set_nonblocking(!self.blocking)?;

        info!("TCP listening on {}:{}", ip, self.local_port_of(&listener));
        self.listener = Some(listener);
        Ok(())
    }

    fn local_port_of(&self, listener: &TcpListener) -> u16 {
        listener.local_addr().map_or(0, |addr| addr.port())
    }

    /// Accept one pending connection
    ///
    /// The new socket starts in blocking mode whatever the listener's mode.
    pub fn accept(&mut self) -> Result<StreamSocket> {
        let listener = self.listener.as_ref().ok_or(Error::NotListening)?;

        let (stream, peer) = loop {
            match listener.accept() {
                Ok(accepted) => break accepted,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from_io(e)),
            }
        };

        info!("TCP connection accepted from {}", peer);
        StreamSocket::from_stream(stream, self.config.clone())
    }

    /// Stop listening
    pub fn close(&mut self) {
        if self.listener.take().is_some() {
            debug!("TCP listener closed");
        }
    }
}
