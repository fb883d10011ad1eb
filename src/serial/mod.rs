//! # Serial Communication Module
//!
//! Handles the UART link to the IO board.
//!
//! This module handles:
//! - Opening the serial port at the configured baud rate (8N1, no flow control)
//! - Falling back to common device paths when the configured one is missing
//! - Bounding every response read with a timeout

pub mod port_trait;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use crate::config::SerialConfig;
use crate::error::{RcioError, Result};
pub use port_trait::RegisterBus;

/// Device paths tried after the configured one (in order of preference)
const FALLBACK_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyAMA0", // Raspberry Pi primary UART
    "/dev/serial0", // Raspberry Pi UART alias
    "/dev/ttyS0",
];

/// IO board serial link
pub struct SerialBus {
    port: tokio_serial::SerialStream,
    device_path: String,
    read_timeout: Duration,
}

impl std::fmt::Debug for SerialBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialBus")
            .field("device_path", &self.device_path)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialBus {
    /// Open the IO board link described by `config`
    ///
    /// The configured port is tried first, then the fallback paths.
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` if no candidate path could be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use rcio_bridge::config::SerialConfig;
    /// use rcio_bridge::serial::SerialBus;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let bus = SerialBus::open(&SerialConfig::default())?;
    ///     println!("Connected to {}", bus.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let mut paths = vec![config.port.as_str()];
        paths.extend(
            FALLBACK_DEVICE_PATHS
                .iter()
                .copied()
                .filter(|path| *path != config.port),
        );

        Self::open_with_paths(
            &paths,
            config.baud_rate,
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Open the first usable path from `paths`
    pub fn open_with_paths(paths: &[&str], baud_rate: u32, read_timeout: Duration) -> Result<Self> {
        for path in paths {
            debug!("Trying to open serial port: {}", path);

            match Self::open_port(path, baud_rate) {
                Ok(port) => {
                    info!("Opened IO board link at {} ({} baud)", path, baud_rate);
                    return Ok(Self {
                        port,
                        device_path: path.to_string(),
                        read_timeout,
                    });
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                }
            }
        }

        Err(RcioError::SerialPortNotFound(paths.join(", ")))
    }

    fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
        tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| RcioError::Serial(format!("Failed to open {}: {}", path, e)))
    }

    /// Path of the device that was opened
    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[async_trait]
impl RegisterBus for SerialBus {
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        self.port.flush().await
    }

    async fn read_exact(&mut self, buffer: &mut [u8]) -> io::Result<()> {
        match tokio::time::timeout(self.read_timeout, self.port.read_exact(buffer)).await {
            Ok(result) => result.map(|_| ()),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("No response from IO board within {:?}", self.read_timeout),
            )),
        }
    }

    async fn clear_input(&mut self) -> io::Result<()> {
        tokio_serial::SerialPort::clear(&self.port, tokio_serial::ClearBuffer::Input)
            .map_err(io::Error::from)
    }
}
