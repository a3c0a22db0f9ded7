//! Send/receive hooks applied at the socket boundary
//!
//! Sockets never read a packet's buffer directly. They ask a [`Transform`] for
//! the bytes to put on the wire and hand received bytes back through it, so a
//! caller can compress, obfuscate or otherwise rewrite payloads without the
//! transport knowing.

use std::borrow::Cow;

use crate::Packet;

/// Wire-level rewrite of a packet's payload
pub trait Transform {
    /// Bytes to transmit for `packet`
    fn on_send<'a>(&mut self, packet: &'a Packet) -> Cow<'a, [u8]> {
        Cow::Borrowed(packet.as_bytes())
    }

    /// Rebuild `packet` from received wire bytes
    fn on_receive(&mut self, packet: &mut Packet, data: &[u8]) {
        packet.clear();
        packet.append(data);
    }
}

/// Sends the packet buffer as is
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {}

impl<T: Transform + ?Sized> Transform for &mut T {
    fn on_send<'a>(&mut self, packet: &'a Packet) -> Cow<'a, [u8]> {
        (**self).on_send(packet)
    }

    fn on_receive(&mut self, packet: &mut Packet, data: &[u8]) {
        (**self).on_receive(packet, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Xor(u8);

    impl Transform for Xor {
        fn on_send<'a>(&mut self, packet: &'a Packet) -> Cow<'a, [u8]> {
            Cow::Owned(packet.as_bytes().iter().map(|b| b ^ self.0).collect())
        }

        fn on_receive(&mut self, packet: &mut Packet, data: &[u8]) {
            let plain: Vec<u8> = data.iter().map(|b| b ^ self.0).collect();
            packet.clear();
            packet.append(&plain);
        }
    }

    #[test]
    fn test_identity_borrows() {
        let mut packet = Packet::new();
        packet.write(&3u8);
        assert!(matches!(Identity.on_send(&packet), Cow::Borrowed(b) if b == [3]));
    }

    #[test]
    fn test_identity_receive_replaces_contents() {
        let mut packet = Packet::new();
        packet.write(&1u32);
        let _: u64 = packet.read();

        Identity.on_receive(&mut packet, &[9, 8]);
        assert_eq!(packet.as_bytes(), &[9, 8]);
        assert!(packet.can_read());
        assert_eq!(packet.read_position(), 0);
    }

    #[test]
    fn test_custom_transform_roundtrip() {
        let mut xor = Xor(0x5a);
        let mut sent = Packet::new();
        sent.write("secret");

        let wire = xor.on_send(&sent).into_owned();
        assert_ne!(wire, sent.as_bytes());

        let mut received = Packet::new();
        xor.on_receive(&mut received, &wire);
        assert_eq!(received.read::<String>(), "secret");
    }
}
