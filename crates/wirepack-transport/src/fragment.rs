//! Datagram fragmentation and reassembly
//!
//! A packet larger than one datagram is cut into datagrams of exactly
//! `max_size` bytes followed by one terminal datagram strictly shorter than
//! `max_size`. The short length alone marks the end of the packet, so an exact
//! multiple of `max_size` is still followed by an empty terminal datagram:
//!
//! ```text
//! payload 2799, max 1400  ->  [1400] [1399]
//! payload 2800, max 1400  ->  [1400] [1400] [0]
//! payload    0, max 1400  ->  [0]
//! ```
//!
//! There is no header, sequence number or checksum. The receiver trusts that
//! the datagrams of one packet arrive in send order, from one sender, with
//! nothing interleaved. That holds on a quiet local link and is not something
//! UDP promises: reordering, loss or a second sender silently corrupts the
//! reassembled packet. At most one fragmented packet may be in flight per
//! socket and direction.

use std::net::SocketAddr;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::io::{self, DatagramIo};

/// Datagram-sized chunks of `payload`, always ending with a short one
///
/// Yields nothing when `max_size` is zero.
pub fn fragments(payload: &[u8], max_size: usize) -> impl Iterator<Item = &[u8]> {
    let full = payload.chunks_exact(max_size.max(1));
    let terminal = full.remainder();
    let count = if max_size == 0 { 0 } else { usize::MAX };
    full.chain(std::iter::once(terminal)).take(count)
}

/// Send `payload` as a sequence of datagrams to `target`
///
/// Stops at the first datagram that is not sent and returns its error;
/// datagrams already sent are not recalled. Returns the number of datagrams
/// sent.
pub fn send_fragmented<D: DatagramIo + ?Sized>(
    socket: &mut D,
    payload: &[u8],
    target: SocketAddr,
    max_size: usize,
) -> Result<usize> {
    if max_size == 0 {
        return Err(Error::ZeroDatagramSize);
    }

    let mut count = 0;
    for chunk in fragments(payload, max_size) {
        trace!("Sending fragment {} ({} bytes) to {}", count, chunk.len(), target);
        io::send_datagram(socket, chunk, target, max_size)?;
        count += 1;
    }

    debug!(
        "Sent packet of {} bytes to {} in {} datagrams",
        payload.len(),
        target,
        count
    );
    Ok(count)
}

/// Reassembly state for the packet currently being received
///
/// Owned by exactly one datagram socket; receiving takes `&mut self`, so two
/// reassemblies can never interleave on the same state.
#[derive(Debug, Default)]
pub struct PendingPacket {
    buffer: Vec<u8>,
    datagrams: usize,
    scratch: Vec<u8>,
}

impl PendingPacket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes accumulated so far
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Datagrams accumulated so far
    pub fn datagram_count(&self) -> usize {
        self.datagrams
    }

    /// Drop everything accumulated
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.datagrams = 0;
    }

    /// Add one received datagram; true if it was the terminal one
    pub fn push(&mut self, datagram: &[u8], max_size: usize) -> bool {
        self.buffer.extend_from_slice(datagram);
        self.datagrams += 1;
        datagram.len() < max_size
    }

    /// Hand over the accumulated bytes and start empty
    pub fn take(&mut self) -> Vec<u8> {
        self.datagrams = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Receive datagrams until a terminal one completes the packet
    ///
    /// Returns the reassembled bytes and the sender of the terminal datagram.
    /// Any failed receive discards the partial packet; the next call starts
    /// from scratch. A zero `max_size` is rejected before touching the socket.
    pub fn receive<D: DatagramIo + ?Sized>(
        &mut self,
        socket: &mut D,
        max_size: usize,
    ) -> Result<(Vec<u8>, SocketAddr)> {
        if max_size == 0 {
            return Err(Error::ZeroDatagramSize);
        }

        self.reset();
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.resize(max_size, 0);

        let result = self.fill(socket, &mut scratch, max_size);
        self.scratch = scratch;
        result
    }

    fn fill<D: DatagramIo + ?Sized>(
        &mut self,
        socket: &mut D,
        scratch: &mut [u8],
        max_size: usize,
    ) -> Result<(Vec<u8>, SocketAddr)> {
        loop {
            let (received, sender) = match io::recv_datagram(socket, scratch) {
                Ok(r) => r,
                Err(e) => {
                    if self.datagrams > 0 {
                        debug!(
                            "Dropping partial packet of {} bytes after {} datagrams: {}",
                            self.buffer.len(),
                            self.datagrams,
                            e
                        );
                    }
                    self.reset();
                    return Err(e);
                }
            };

            trace!("Received fragment {} ({} bytes) from {}", self.datagrams, received, sender);

            if self.push(&scratch[..received], max_size) {
                debug!(
                    "Reassembled packet of {} bytes from {} datagrams",
                    self.buffer.len(),
                    self.datagrams
                );
                return Ok((self.take(), sender));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sizes(payload_len: usize, max: usize) -> Vec<usize> {
        let payload = vec![0u8; payload_len];
        fragments(&payload, max).map(<[u8]>::len).collect()
    }

    #[test]
    fn test_fragment_sizes() {
        assert_eq!(sizes(0, 1400), vec![0]);
        assert_eq!(sizes(1, 1400), vec![1]);
        assert_eq!(sizes(1399, 1400), vec![1399]);
        assert_eq!(sizes(1400, 1400), vec![1400, 0]);
        assert_eq!(sizes(1401, 1400), vec![1400, 1]);
        assert_eq!(sizes(2799, 1400), vec![1400, 1399]);
        assert_eq!(sizes(2800, 1400), vec![1400, 1400, 0]);
    }

    #[test]
    fn test_zero_max_size_yields_nothing() {
        assert!(sizes(3, 0).is_empty());
        assert!(sizes(0, 0).is_empty());
    }

    #[test]
    fn test_fragments_preserve_bytes() {
        let payload: Vec<u8> = (0..=255).cycle().take(1000).collect();
        let joined: Vec<u8> = fragments(&payload, 64).flatten().copied().collect();
        assert_eq!(joined, payload);
    }

    #[test]
    fn test_push_detects_terminal() {
        let mut pending = PendingPacket::new();
        assert!(!pending.push(&[1; 4], 4));
        assert!(!pending.push(&[2; 4], 4));
        assert!(pending.push(&[], 4));
        assert_eq!(pending.datagram_count(), 3);
        assert_eq!(pending.take(), [[1; 4], [2; 4]].concat());
        assert!(pending.is_empty());
        assert_eq!(pending.datagram_count(), 0);
    }
}
