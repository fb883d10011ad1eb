//! # Packet Decoder
//!
//! Parses fixed-size transfer buffers back into packets.

use bytes::Buf;

use super::protocol::*;
use crate::error::{RcioError, Result};

/// Decode a packet from a full transfer buffer
///
/// Only the first `count` register pairs after the header are read; the
/// rest of the buffer is ignored. The CRC is not checked here, see
/// [`Packet::validate`].
///
/// # Errors
///
/// Returns error if:
/// - The buffer is not exactly [`PACKET_SIZE`] bytes (`MalformedBuffer`)
/// - The count bits claim more than 32 registers (`CorruptResponse`)
pub fn decode_packet(buffer: &[u8]) -> Result<Packet> {
    if buffer.len() != PACKET_SIZE {
        return Err(RcioError::MalformedBuffer {
            expected: PACKET_SIZE,
            actual: buffer.len(),
        });
    }

    let mut cursor = buffer;
    let count_code = cursor.get_u8();
    let crc = cursor.get_u8();
    let page = cursor.get_u8();
    let offset = cursor.get_u8();

    let count = (count_code & COUNT_MASK) as usize;
    if count > MAX_REGISTERS {
        return Err(RcioError::CorruptResponse(format!(
            "register count {} exceeds maximum {}",
            count, MAX_REGISTERS
        )));
    }

    let registers = (0..count).map(|_| cursor.get_u16_le()).collect();

    Ok(Packet {
        count_code,
        crc,
        page,
        offset,
        registers,
    })
}
