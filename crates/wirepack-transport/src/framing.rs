//! Length-prefixed packet framing for byte streams
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┐
//! │ Length (u32, network order)  │ Payload (length bytes)       │
//! └──────────────────────────────┴──────────────────────────────┘
//! ```
//!
//! Only the header is byte-swapped. The payload is the packet's own buffer,
//! whose numeric fields stay in host byte order.

use bytes::{BufMut, BytesMut};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::io::{self, StreamIo};

/// Size of the frame length header
pub const HEADER_SIZE: usize = 4;

/// Bytes read from the stream per call while filling a payload
const READ_CHUNK_SIZE: usize = 4096;

/// Build the wire frame for `payload`
pub fn encode_frame(payload: &[u8]) -> Result<BytesMut> {
    let len = u32::try_from(payload.len()).map_err(|_| Error::PacketTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    frame.put_u32(len);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Write `frame[*pos..]`, resuming after short writes
///
/// `pos` is advanced past every byte the stream accepted, including on
/// error, so the caller can resume a non-blocking send. Short writes are
/// retried immediately with the remainder; `NotReady`, `Disconnected` and
/// errors are returned as is.
pub fn send_frame<S: StreamIo + ?Sized>(stream: &mut S, frame: &[u8], pos: &mut usize) -> Result<()> {
    while *pos < frame.len() {
        match io::send(stream, &frame[*pos..]) {
            Ok(()) => *pos = frame.len(),
            Err(Error::Partial { sent }) => *pos += sent,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Receive-side state of the frame currently being read
///
/// Survives `NotReady` so a non-blocking socket can pick up where it left
/// off; any other failure drops it.
#[derive(Debug, Default)]
pub struct PendingFrame {
    header: [u8; HEADER_SIZE],
    header_received: usize,
    data: Vec<u8>,
}

impl PendingFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no part of a frame has been read yet
    pub fn is_idle(&self) -> bool {
        self.header_received == 0 && self.data.is_empty()
    }

    pub fn reset(&mut self) {
        self.header = [0; HEADER_SIZE];
        self.header_received = 0;
        self.data = Vec::new();
    }

    /// Read until one whole frame is in, returning its payload
    pub fn receive<S: StreamIo + ?Sized>(&mut self, stream: &mut S, max_size: usize) -> Result<Vec<u8>> {
        let result = self.fill(stream, max_size);
        match &result {
            Ok(_) => self.reset(),
            Err(Error::NotReady) => {}
            Err(_) => self.reset(),
        }
        result
    }

    fn fill<S: StreamIo + ?Sized>(&mut self, stream: &mut S, max_size: usize) -> Result<Vec<u8>> {
        while self.header_received < HEADER_SIZE {
            let n = io::recv(stream, &mut self.header[self.header_received..])?;
            self.header_received += n;
        }

        let size = u32::from_be_bytes(self.header) as usize;
        if size > max_size {
            warn!("Frame of {} bytes exceeds the limit of {} bytes", size, max_size);
            return Err(Error::PacketTooLarge {
                size,
                max: max_size,
            });
        }

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while self.data.len() < size {
            let want = (size - self.data.len()).min(READ_CHUNK_SIZE);
            let n = io::recv(stream, &mut chunk[..want])?;
            self.data.extend_from_slice(&chunk[..n]);
        }

        debug!("Received frame of {} bytes", size);
        Ok(std::mem::take(&mut self.data))
    }
}
