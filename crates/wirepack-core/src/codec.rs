//! Typed field codec
//!
//! Every value written into a [`Packet`](crate::Packet) goes through [`Encode`],
//! every value read back goes through [`Decode`]. Fields are laid out in write
//! order with no tags or padding:
//!
//! ```text
//! bool            1 byte, 0 or 1
//! i8 / u8         1 byte
//! i16 / u16       2 bytes, host byte order
//! i32 / u32       4 bytes, host byte order
//! i64 / u64       8 bytes, host byte order
//! f32 / f64       4 / 8 bytes, host representation
//! narrow string   u32 byte count, then the raw bytes (no NUL)
//! wide string     u32 character count, then one u32 per character
//! ```
//!
//! Multi-byte numbers are written exactly as the host stores them. Two peers
//! with different byte orders will disagree about every numeric field; this
//! format does not promise cross-architecture interop.

use bytes::{Buf, BufMut, BytesMut};

use crate::{Error, Result};

/// Size in bytes of a string length prefix
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size in bytes of one encoded wide character
pub const WIDE_CHAR_SIZE: usize = 4;

/// A value that can be appended to a packet
pub trait Encode {
    /// Append the encoded form of `self` to `buf`
    fn encode(&self, buf: &mut BytesMut);
}

/// A value that can be read back from a packet
pub trait Decode: Sized {
    /// Decode one value from the front of `reader`
    ///
    /// On error the caller discards everything consumed from `reader`, so
    /// implementations may fail halfway through a value.
    fn decode(reader: &mut Reader<'_>) -> Result<Self>;
}

/// Cursor over the unread bytes of a packet
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    start_len: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            start_len: buf.len(),
        }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Bytes consumed since the reader was created
    pub fn consumed(&self) -> usize {
        self.start_len - self.buf.len()
    }

    /// Fail unless at least `needed` bytes remain
    pub fn check_size(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                have: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Consume exactly `len` bytes
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        self.check_size(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    fn buf_mut(&mut self) -> &mut &'a [u8] {
        &mut self.buf
    }
}

macro_rules! impl_number {
    ($($ty:ty => $put:ident, $get:ident;)*) => {
        $(
            impl Encode for $ty {
                #[inline]
                fn encode(&self, buf: &mut BytesMut) {
                    buf.$put(*self);
                }
            }

            impl Decode for $ty {
                #[inline]
                fn decode(reader: &mut Reader<'_>) -> Result<Self> {
                    reader.check_size(std::mem::size_of::<$ty>())?;
                    Ok(reader.buf_mut().$get())
                }
            }
        )*
    };
}

impl_number! {
    u8 => put_u8, get_u8;
    i8 => put_i8, get_i8;
    u16 => put_u16_ne, get_u16_ne;
    i16 => put_i16_ne, get_i16_ne;
    u32 => put_u32_ne, get_u32_ne;
    i32 => put_i32_ne, get_i32_ne;
    u64 => put_u64_ne, get_u64_ne;
    i64 => put_i64_ne, get_i64_ne;
    f32 => put_f32_ne, get_f32_ne;
    f64 => put_f64_ne, get_f64_ne;
}

impl Encode for bool {
    #[inline]
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(u8::from(*self));
    }
}

impl Decode for bool {
    #[inline]
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        Ok(u8::decode(reader)? != 0)
    }
}

/// Write a `u32` length prefix followed by `bytes`
///
/// Anything past `u32::MAX` bytes cannot be described by the prefix and is
/// dropped.
fn encode_length_prefixed(buf: &mut BytesMut, bytes: &[u8]) {
    let len = u32::try_from(bytes.len()).unwrap_or(u32::MAX);
    buf.put_u32_ne(len);
    buf.put_slice(&bytes[..len as usize]);
}

impl Encode for str {
    fn encode(&self, buf: &mut BytesMut) {
        encode_length_prefixed(buf, self.as_bytes());
    }
}

impl Encode for String {
    fn encode(&self, buf: &mut BytesMut) {
        self.as_str().encode(buf);
    }
}

impl Decode for String {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let len = u32::decode(reader)? as usize;
        let bytes = reader.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::InvalidUtf8)
    }
}

impl<T: Encode + ?Sized> Encode for &T {
    #[inline]
    fn encode(&self, buf: &mut BytesMut) {
        (**self).encode(buf);
    }
}

/// A string carried as one 32-bit unit per character
///
/// Each character is widened to a `u32` regardless of how the platform
/// represents wide characters natively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct WideString(pub String);

impl WideString {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Number of characters, i.e. the value of the length prefix
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for WideString {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for WideString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

fn encode_wide<I>(buf: &mut BytesMut, count: usize, chars: I)
where
    I: Iterator<Item = char>,
{
    let count = u32::try_from(count).unwrap_or(u32::MAX);
    buf.reserve(LENGTH_PREFIX_SIZE + count as usize * WIDE_CHAR_SIZE);
    buf.put_u32_ne(count);
    for c in chars.take(count as usize) {
        buf.put_u32_ne(u32::from(c));
    }
}

impl Encode for WideString {
    fn encode(&self, buf: &mut BytesMut) {
        encode_wide(buf, self.char_count(), self.0.chars());
    }
}

impl Encode for [char] {
    fn encode(&self, buf: &mut BytesMut) {
        encode_wide(buf, self.len(), self.iter().copied());
    }
}

impl Decode for WideString {
    fn decode(reader: &mut Reader<'_>) -> Result<Self> {
        let count = u32::decode(reader)? as usize;
        let needed = count.checked_mul(WIDE_CHAR_SIZE).unwrap_or(usize::MAX);
        reader.check_size(needed)?;

        let mut out = String::with_capacity(count);
        for _ in 0..count {
            let unit = u32::decode(reader)?;
            out.push(char::from_u32(unit).ok_or(Error::InvalidChar(unit))?);
        }
        Ok(Self(out))
    }
}
