//! Transport error types

use std::io;

use thiserror::Error;

use crate::status::Status;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A non-blocking call would have blocked; retry later
    #[error("socket not ready")]
    NotReady,

    /// A stream write accepted only part of the data
    #[error("partial send: {sent} bytes written")]
    Partial { sent: usize },

    /// The peer closed the stream
    #[error("connection closed by peer")]
    Disconnected,

    #[error("datagram too large: {size} bytes (max {max})")]
    DatagramTooLarge { size: usize, max: usize },

    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("maximum datagram size must be non-zero")]
    ZeroDatagramSize,

    #[error("cannot bind to the broadcast address")]
    BroadcastAddress,

    #[error("not connected")]
    NotConnected,

    #[error("not bound")]
    NotBound,

    #[error("not listening")]
    NotListening,

    #[error("timeout")]
    Timeout,

    #[error("io error: {0}")]
    Io(io::Error),
}

impl Error {
    /// Map an OS error from a connection-oriented socket
    pub fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock => Error::NotReady,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero => Error::Disconnected,
            io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(e),
        }
    }

    /// Map an OS error from a connectionless socket
    ///
    /// Datagram sockets have no connection to lose, so resets reported by
    /// some platforms stay plain I/O errors.
    pub fn from_datagram_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock => Error::NotReady,
            io::ErrorKind::TimedOut => Error::Timeout,
            _ => Error::Io(e),
        }
    }

    /// Collapse into the five-way status code
    pub fn status(&self) -> Status {
        match self {
            Error::NotReady => Status::NotReady,
            Error::Partial { .. } => Status::Partial,
            Error::Disconnected => Status::Disconnected,
            _ => Status::Error,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::from_io(e)
    }
}
