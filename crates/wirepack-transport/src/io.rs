//! Operating-system socket primitives
//!
//! [`StreamIo`] and [`DatagramIo`] are the only places bytes touch the OS.
//! Framing, fragmentation and reassembly are written against these traits so
//! they run the same over real sockets and over scripted test doubles.
//!
//! The free functions here turn raw OS results into transport results: short
//! stream writes become [`Error::Partial`], zero-byte stream reads become
//! [`Error::Disconnected`], interrupted calls are retried.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, UdpSocket};

use tracing::warn;

use crate::error::{Error, Result};

/// Connected byte-stream primitive (`send`/`recv`)
pub trait StreamIo {
    fn send(&mut self, data: &[u8]) -> io::Result<usize>;
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Connectionless datagram primitive (`sendto`/`recvfrom`)
pub trait DatagramIo {
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> io::Result<usize>;
    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}

impl StreamIo for TcpStream {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        self.write(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

impl DatagramIo for UdpSocket {
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, data, target)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        UdpSocket::recv_from(self, buf)
    }
}

impl<T: StreamIo + ?Sized> StreamIo for &mut T {
    fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        (**self).send(data)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }
}

impl<T: DatagramIo + ?Sized> DatagramIo for &mut T {
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        (**self).send_to(data, target)
    }

    fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        (**self).recv_from(buf)
    }
}

/// One stream write
///
/// `Ok` only if every byte was accepted; a short write is
/// [`Error::Partial`] carrying the accepted count.
pub fn send<S: StreamIo + ?Sized>(io: &mut S, data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Ok(());
    }

    loop {
        match io.send(data) {
            Ok(0) => return Err(Error::Disconnected),
            Ok(n) if n >= data.len() => return Ok(()),
            Ok(n) => return Err(Error::Partial { sent: n }),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from_io(e)),
        }
    }
}

/// One stream read into `buf`
///
/// A graceful close by the peer is [`Error::Disconnected`]. An empty `buf`
/// reads nothing and succeeds.
pub fn recv<S: StreamIo + ?Sized>(io: &mut S, buf: &mut [u8]) -> Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }

    loop {
        match io.recv(buf) {
            Ok(0) => return Err(Error::Disconnected),
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from_io(e)),
        }
    }
}

/// Fail with [`Error::DatagramTooLarge`] if `size` does not fit one datagram
pub fn check_datagram_size(size: usize, max_size: usize) -> Result<()> {
    if size > max_size {
        warn!(
            "Datagram of {} bytes exceeds the maximum of {} bytes",
            size, max_size
        );
        return Err(Error::DatagramTooLarge {
            size,
            max: max_size,
        });
    }
    Ok(())
}

/// Send `data` as exactly one datagram of at most `max_size` bytes
pub fn send_datagram<D: DatagramIo + ?Sized>(
    io: &mut D,
    data: &[u8],
    target: SocketAddr,
    max_size: usize,
) -> Result<()> {
    check_datagram_size(data.len(), max_size)?;

    loop {
        match io.send_to(data, target) {
            Ok(_) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from_datagram_io(e)),
        }
    }
}

/// Receive exactly one datagram into `buf`
pub fn recv_datagram<D: DatagramIo + ?Sized>(
    io: &mut D,
    buf: &mut [u8],
) -> Result<(usize, SocketAddr)> {
    loop {
        match io.recv_from(buf) {
            Ok(received) => return Ok(received),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::from_datagram_io(e)),
        }
    }
}
