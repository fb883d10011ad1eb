//! # PX4IO Protocol Module
//!
//! Implementation of the PX4IO register protocol spoken by the RC I/O
//! co-processor.
//!
//! This module handles:
//! - Fixed-size packet encoding and decoding (4-byte header + 32 registers)
//! - CRC-8 checksum calculation and validation
//! - The register page catalog and dynamic page lengths
//! - Typed decoding of register pages

pub mod protocol;
pub mod encoder;
pub mod decoder;
pub mod crc;
pub mod pages;
pub mod registers;
