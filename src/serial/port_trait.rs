//! Trait abstraction for the register bus to enable testing

use async_trait::async_trait;
use std::io;

/// Exclusive, half-duplex byte link to the IO board
///
/// One request is written, then one fixed-size response is read back.
/// Implementations must not be shared between concurrent callers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegisterBus: Send {
    /// Write all data to the bus
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Fill `buffer` completely from the bus
    async fn read_exact(&mut self, buffer: &mut [u8]) -> io::Result<()>;

    /// Discard any received bytes not yet read
    ///
    /// Called before each request so a reply that arrived after an earlier
    /// timeout is not taken as the answer to the next one.
    async fn clear_input(&mut self) -> io::Result<()>;
}
