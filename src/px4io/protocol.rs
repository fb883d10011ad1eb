//! # PX4IO Protocol Constants and Types
//!
//! Core protocol definitions for register access to the IO co-processor.
//!
//! Communication is performed via reads from and writes to 16-bit virtual
//! registers organized into pages. Every transaction carries a page number
//! and a starting offset; the board advances the offset for each register
//! transferred. Offsets never wrap.

use std::time::Duration;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::crc::calculate_crc;
use crate::error::{RcioError, Result};

/// Highest protocol version this crate understands
pub const PROTOCOL_VERSION: u16 = 4;

/// Header size in bytes: count/code(1) + crc(1) + page(1) + offset(1)
pub const HEADER_SIZE: usize = 4;

/// Maximum number of registers carried by one packet
pub const MAX_REGISTERS: usize = 32;

/// Register payload slot size in bytes
pub const DATA_SIZE: usize = MAX_REGISTERS * 2;

/// Size of the full-duplex buffer exchanged with the board (68 bytes)
pub const PACKET_SIZE: usize = HEADER_SIZE + DATA_SIZE;

/// Masks the code bits of the count/code byte
pub const CODE_MASK: u8 = 0xC0;

/// Masks the count bits of the count/code byte
pub const COUNT_MASK: u8 = 0x3F;

/// Settling time the board needs on either side of a transfer
pub const TRANSFER_PACING_DELAY: Duration = Duration::from_micros(150);

/// Outbound (host to board) transaction code
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RequestCode {
    /// Read registers
    Read = 0x00,
    /// Write registers
    Write = 0x40,
}

/// Inbound (board to host) reply code
///
/// The reserved `0xC0` pattern has no variant, so `try_from` fails on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ResponseCode {
    /// Request served
    Success = 0x00,
    /// Request failed the board's CRC check
    Corrupt = 0x40,
    /// Register operation refused
    Error = 0x80,
}

/// One protocol transaction, request or response
///
/// `registers.len()` always equals the count bits of `count_code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Transaction code (bits 7-6) and register count (bits 5-0)
    pub count_code: u8,

    /// CRC-8 over the whole packet with this field taken as zero
    pub crc: u8,

    /// Register page
    pub page: u8,

    /// First register offset within the page
    pub offset: u8,

    /// Register values
    pub registers: Vec<u16>,
}

impl Packet {
    /// Create a packet with the given code bits and registers
    ///
    /// The CRC is left at zero; call [`Packet::seal`] before sending.
    ///
    /// # Errors
    ///
    /// Returns `TooManyRegisters` if more than 32 registers are supplied.
    pub fn new(code: u8, page: u8, offset: u8, registers: Vec<u16>) -> Result<Self> {
        if registers.len() > MAX_REGISTERS {
            return Err(RcioError::TooManyRegisters { count: registers.len() });
        }

        Ok(Self {
            count_code: (code & CODE_MASK) | registers.len() as u8,
            crc: 0,
            page,
            offset,
            registers,
        })
    }

    /// Build a sealed read request for `count` registers
    ///
    /// The register slots of a read request are zero-filled; they are
    /// still covered by the CRC and sent on the wire.
    pub fn read_request(page: u8, offset: u8, count: usize) -> Result<Self> {
        let mut packet = Self::new(RequestCode::Read.into(), page, offset, vec![0; count])?;
        packet.seal();
        Ok(packet)
    }

    /// Build a sealed write request carrying `values`
    pub fn write_request(page: u8, offset: u8, values: &[u16]) -> Result<Self> {
        let mut packet = Self::new(RequestCode::Write.into(), page, offset, values.to_vec())?;
        packet.seal();
        Ok(packet)
    }

    /// Code bits of the count/code byte
    pub fn code(&self) -> u8 {
        self.count_code & CODE_MASK
    }

    /// Register count bits of the count/code byte
    pub fn count(&self) -> u8 {
        self.count_code & COUNT_MASK
    }

    /// Recalculate and store the CRC. Must be the last field set.
    pub fn seal(&mut self) {
        self.crc = calculate_crc(self);
    }

    /// Check the stored CRC against a fresh calculation
    pub fn validate(&self) -> bool {
        self.crc == calculate_crc(self)
    }

    /// Length of the encoded packet: header plus `count` registers
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.count() as usize * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_size_constants() {
        assert_eq!(HEADER_SIZE, 4);
        assert_eq!(MAX_REGISTERS, 32);
        assert_eq!(PACKET_SIZE, 68);
        assert_eq!(CODE_MASK | COUNT_MASK, 0xFF);
        assert_eq!(CODE_MASK & COUNT_MASK, 0x00);
    }

    #[test]
    fn test_count_code_projection() {
        let packet = Packet::new(RequestCode::Write as u8, 50, 14, vec![22027]).unwrap();
        assert_eq!(packet.count_code, 0x41);
        assert_eq!(packet.code(), 0x40);
        assert_eq!(packet.count(), 1);
    }

    #[test]
    fn test_read_request_is_zero_filled() {
        let packet = Packet::read_request(0, 0, 9).unwrap();
        assert_eq!(packet.count(), 9);
        assert_eq!(packet.code(), RequestCode::Read as u8);
        assert_eq!(packet.registers, vec![0u16; 9]);
        // Sealed on construction
        assert_eq!(packet.crc, 0xCC);
    }

    #[test]
    fn test_write_request_is_sealed() {
        let packet = Packet::write_request(50, 14, &[22027]).unwrap();
        assert_eq!(packet.crc, 0xC4);
        assert!(packet.validate());
    }

    #[test]
    fn test_too_many_registers() {
        assert!(matches!(
            Packet::write_request(54, 0, &[0u16; 33]),
            Err(RcioError::TooManyRegisters { count: 33 })
        ));
        assert!(matches!(
            Packet::read_request(54, 0, 33),
            Err(RcioError::TooManyRegisters { count: 33 })
        ));
        assert!(Packet::write_request(54, 0, &[0u16; 32]).is_ok());
    }

    #[test]
    fn test_new_masks_count_bits_out_of_code() {
        let packet = Packet::new(0xFF, 1, 2, vec![1, 2, 3]).unwrap();
        assert_eq!(packet.code(), 0xC0);
        assert_eq!(packet.count(), 3);
    }

    #[test]
    fn test_code_conversions() {
        assert_eq!(u8::from(RequestCode::Read), 0x00);
        assert_eq!(u8::from(RequestCode::Write), 0x40);
        assert_eq!(RequestCode::try_from(0x40), Ok(RequestCode::Write));

        assert_eq!(ResponseCode::try_from(0x00), Ok(ResponseCode::Success));
        assert_eq!(ResponseCode::try_from(0x40), Ok(ResponseCode::Corrupt));
        assert_eq!(ResponseCode::try_from(0x80), Ok(ResponseCode::Error));
        assert!(ResponseCode::try_from(0xC0).is_err());
        assert!(ResponseCode::try_from(0x09).is_err());
    }

    #[test]
    fn test_response_code_from_masked_count_code() {
        let packet = Packet::new(0x89, 4, 0, vec![0; 9]).unwrap();
        assert_eq!(ResponseCode::try_from(packet.code()), Ok(ResponseCode::Error));
    }

    #[test]
    fn test_encoded_len_tracks_count() {
        assert_eq!(Packet::read_request(0, 0, 0).unwrap().encoded_len(), 4);
        assert_eq!(Packet::read_request(0, 0, 9).unwrap().encoded_len(), 22);
        assert_eq!(Packet::write_request(0, 0, &[1, 2]).unwrap().encoded_len(), 8);
    }
}
