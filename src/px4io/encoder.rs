//! # Packet Encoder
//!
//! Serializes packets into wire bytes.

use bytes::{BufMut, BytesMut};

use super::protocol::*;

/// Encode a packet into its wire form
///
/// Writes the 4-byte header followed by exactly `count` registers,
/// little-endian. The result is `HEADER_SIZE + count * 2` bytes long; it is
/// not padded to [`PACKET_SIZE`].
///
/// # Examples
///
/// ```
/// use rcio_bridge::px4io::encoder::encode_packet;
/// use rcio_bridge::px4io::protocol::Packet;
///
/// let packet = Packet::write_request(50, 14, &[22027]).unwrap();
/// let bytes = encode_packet(&packet);
/// assert_eq!(bytes, vec![0x41, 0xC4, 50, 14, 0x0B, 0x56]);
/// ```
pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    let mut buffer = BytesMut::with_capacity(packet.encoded_len());

    buffer.put_u8(packet.count_code);
    buffer.put_u8(packet.crc);
    buffer.put_u8(packet.page);
    buffer.put_u8(packet.offset);

    for &value in packet.registers.iter().take(packet.count() as usize) {
        buffer.put_u16_le(value);
    }

    buffer.to_vec()
}

/// Encode a packet into a full fixed-size transfer buffer
///
/// Unused register slots are zero-filled.
pub fn encode_packet_padded(packet: &Packet) -> [u8; PACKET_SIZE] {
    let mut buffer = [0u8; PACKET_SIZE];
    let encoded = encode_packet(packet);
    buffer[..encoded.len()].copy_from_slice(&encoded);
    buffer
}
