//! wirepack transport layer
//!
//! Synchronous TCP and UDP sockets that carry [`Packet`]s:
//! - [`StreamSocket`] / [`StreamListener`]: length-prefixed frames over TCP
//! - [`DatagramSocket`]: raw datagrams, and packets fragmented across datagrams
//!
//! Every socket works in blocking mode (calls wait) or non-blocking mode
//! (calls return [`Error::NotReady`] instead of waiting). Failures are
//! [`Error`]s; [`status_of`] reduces any result to a five-way [`Status`].

pub mod error;
pub mod fragment;
pub mod framing;
pub mod io;
pub mod status;
pub mod tcp;
pub mod udp;

pub use error::{Error, Result};
pub use fragment::PendingPacket;
pub use framing::PendingFrame;
pub use io::{DatagramIo, StreamIo};
pub use status::{status_of, Status};
pub use tcp::{StreamConfig, StreamListener, StreamSocket};
pub use udp::{DatagramConfig, DatagramSocket, ANY_PORT, MAX_DATAGRAM_SIZE};

pub use wirepack_core::{Identity, Packet, Transform};
