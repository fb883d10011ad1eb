//! # Error Types
//!
//! Custom error types for RCIO Bridge using `thiserror`.

use thiserror::Error;

use crate::px4io::pages::Access;

/// Main error type for RCIO Bridge
#[derive(Debug, Error)]
pub enum RcioError {
    /// A buffer handed to the packet decoder is not exactly one packet long
    #[error("Malformed packet buffer: expected {expected} bytes, got {actual}")]
    MalformedBuffer { expected: usize, actual: usize },

    /// Response CRC mismatch or unrecognized response code
    #[error("Corrupt response: {0}")]
    CorruptResponse(String),

    /// The IO board failed the CRC check on our request
    #[error("Request rejected by IO board as corrupt")]
    RequestRejectedCorrupt,

    /// The IO board understood the request but refused the register operation
    #[error("Request rejected by IO board with an error")]
    RequestRejectedError,

    /// A read returned a different number of registers than requested
    #[error("Register count mismatch: requested {requested}, received {received}")]
    CountMismatch { requested: usize, received: usize },

    /// More registers than a single packet can carry
    #[error("Too many registers for one packet: {count} (maximum 32)")]
    TooManyRegisters { count: usize },

    /// Not enough registers to decode a typed page
    #[error("Page {page} too short: expected at least {expected} registers, got {actual}")]
    PageTooShort { page: u8, expected: usize, actual: usize },

    /// Page does not allow the attempted register operation
    #[error("Page {page} is {access:?} and cannot be {operation}")]
    PageAccess {
        page: u8,
        access: Access,
        operation: &'static str,
    },

    /// Bus failure or timeout during a transfer
    #[error("Transport error: {0}")]
    Transport(std::io::Error),

    /// Other I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors
    #[error("Serial port error: {0}")]
    Serial(String),

    /// No usable serial device
    #[error("No IO board serial port found (tried: {0})")]
    SerialPortNotFound(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),
}

/// Result type alias for RCIO Bridge
pub type Result<T> = std::result::Result<T, RcioError>;
