//! Error types for packet decoding

use thiserror::Error;

/// Result type alias for packet decoding
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a typed read from a [`Packet`](crate::Packet) can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Not enough unread bytes left for the requested value
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// Narrow string bytes are not valid UTF-8
    #[error("string is not valid utf-8")]
    InvalidUtf8,

    /// Wide string unit is not a Unicode scalar value
    #[error("invalid character: 0x{0:08x}")]
    InvalidChar(u32),

    /// An earlier read on this packet already failed
    #[error("packet invalidated by an earlier failed read")]
    Invalidated,
}
