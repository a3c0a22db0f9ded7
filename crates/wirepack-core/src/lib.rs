//! Wirepack Core
//!
//! Packet container and typed binary codec shared by every wirepack transport.
//!
//! This crate provides:
//! - The [`Packet`] container with its sticky-invalid read cursor
//! - Field encoding/decoding ([`Encode`], [`Decode`], [`WideString`])
//! - Wire transform hooks used by sockets ([`Transform`], [`Identity`])
//!
//! No I/O happens here.

pub mod codec;
pub mod error;
pub mod packet;
pub mod transform;

pub use codec::{Decode, Encode, Reader, WideString};
pub use error::{Error, Result};
pub use packet::Packet;
pub use transform::{Identity, Transform};
