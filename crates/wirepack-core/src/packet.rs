//! Append-only packet container with a typed read cursor

use bytes::BytesMut;

use crate::codec::{Decode, Encode, Reader};
use crate::{Error, Result};

/// A length-agnostic container of typed fields
///
/// Writes always append and never fail. Reads consume from a cursor that only
/// moves forward; the first failed read marks the packet invalid, and every
/// read after that fails without consuming anything until [`Packet::clear`].
///
/// ```
/// use wirepack_core::Packet;
///
/// let mut packet = Packet::new();
/// packet.write(&42u32).write("hello").write(&true);
///
/// let n: u32 = packet.read();
/// let s: String = packet.read();
/// let b: bool = packet.read();
/// assert!(packet.can_read());
/// assert!(packet.end_of_packet());
/// assert_eq!((n, s.as_str(), b), (42, "hello", true));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    data: BytesMut,
    read_pos: usize,
    send_pos: usize,
    is_valid: bool,
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl Packet {
    pub fn new() -> Self {
        Self {
            data: BytesMut::new(),
            read_pos: 0,
            send_pos: 0,
            is_valid: true,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            ..Self::new()
        }
    }

    /// Copy raw bytes to the end of the packet
    pub fn append(&mut self, data: &[u8]) {
        if !data.is_empty() {
            self.data.extend_from_slice(data);
        }
    }

    /// Empty the packet, rewind both cursors and make it valid again
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
        self.send_pos = 0;
        self.is_valid = true;
    }

    /// The whole serialized buffer, read or not
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset of the next byte to be read
    pub fn read_position(&self) -> usize {
        self.read_pos
    }

    /// Whether every byte has been read
    pub fn end_of_packet(&self) -> bool {
        self.read_pos >= self.data.len()
    }

    /// Whether all reads so far succeeded
    pub fn can_read(&self) -> bool {
        self.is_valid
    }

    /// Bytes of the current wire frame already handed to a stream socket
    ///
    /// Non-zero only while a non-blocking stream send is half done; sending
    /// the same packet again resumes from here.
    pub fn send_position(&self) -> usize {
        self.send_pos
    }

    pub fn set_send_position(&mut self, pos: usize) {
        self.send_pos = pos;
    }

    /// Append one typed value
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.encode(&mut self.data);
        self
    }

    /// Read one typed value, reporting why it failed
    ///
    /// A failed read leaves the cursor where it was and invalidates the packet.
    pub fn try_read<T: Decode>(&mut self) -> Result<T> {
        if !self.is_valid {
            return Err(Error::Invalidated);
        }

        let mut reader = Reader::new(&self.data[self.read_pos..]);
        match T::decode(&mut reader) {
            Ok(value) => {
                self.read_pos += reader.consumed();
                Ok(value)
            }
            Err(e) => {
                self.is_valid = false;
                Err(e)
            }
        }
    }

    /// Read one typed value, yielding its default on failure
    ///
    /// Check [`Packet::can_read`] after a batch of reads.
    pub fn read<T: Decode + Default>(&mut self) -> T {
        self.try_read().unwrap_or_default()
    }

    /// Read into `out`, which is reset to its default on failure
    pub fn read_into<T: Decode + Default>(&mut self, out: &mut T) -> &mut Self {
        *out = self.read();
        self
    }
}

impl From<&[u8]> for Packet {
    fn from(data: &[u8]) -> Self {
        let mut packet = Self::with_capacity(data.len());
        packet.append(data);
        packet
    }
}

impl From<Vec<u8>> for Packet {
    fn from(data: Vec<u8>) -> Self {
        Self {
            data: BytesMut::from(&data[..]),
            ..Self::new()
        }
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
