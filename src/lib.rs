//! # RCIO Bridge Library
//!
//! Register-level access to a PX4IO-compatible RC I/O co-processor over a
//! serial link.
//!
//! This library provides the packet codec and CRC, a chunking transfer
//! engine, the register page catalog with typed page decoding, and a device
//! session that keeps the last full snapshot of the board.

pub mod config;
pub mod error;
pub mod px4io;
pub mod serial;
pub mod session;
pub mod transfer;
