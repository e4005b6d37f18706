//! Port abstraction for cross-platform serial communication.
//!
//! This module provides a unified `Port` trait that separates I/O from
//! protocol logic, so the upload engine is I/O-agnostic:
//!
//! ```text
//! +------------------+     +------------------+
//! |   Upload engine  |     |   Upload engine  |
//! |    (uploader)    |     |    (uploader)    |
//! +--------+---------+     +--------+---------+
//!          |                        |
//!          v                        v
//! +--------+---------+     +--------+---------+
//! |   Port Trait     |     |   Port Trait     |
//! +--------+---------+     +--------+---------+
//!          |                        |
//!          v                        v
//! +--------+---------+     +--------+---------+
//! | Native SerialPort|     |   MockPort       |
//! |   (serialport)   |     |   (tests)        |
//! +------------------+     +------------------+
//!       Desktop                 Test double
//! ```
//!
//! The Nextion wire protocol distinguishes two kinds of writes: raw payload
//! bytes, and ASCII commands terminated by `0xFF 0xFF 0xFF`. Both are
//! provided methods on the trait so every implementation frames commands the
//! same way.

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::protocol::command::COMMAND_TERMINATOR;

/// Serial port configuration.
///
/// Nextion displays always talk 8N1 without flow control, so only the port
/// path, baud rate and read timeout are configurable.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout.
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: 115200,
            timeout: Duration::from_millis(1000),
        }
    }
}

impl SerialConfig {
    /// Create a new configuration with port name and baud rate.
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            ..Default::default()
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Unified port trait for serial communication.
///
/// Implementations exist for native platforms via the `serialport` crate and
/// for tests via a scripted mock.
pub trait Port: Read + Write + Send {
    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Get the current read timeout.
    fn timeout(&self) -> Duration;

    /// Set the baud rate.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Get the current baud rate.
    fn baud_rate(&self) -> u32;

    /// Number of bytes already received and waiting to be read.
    fn bytes_available(&mut self) -> Result<usize>;

    /// Discard any received but unread bytes.
    fn clear_input(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Write raw payload bytes and wait for transmission to complete.
    ///
    /// Firmware data is written without any framing; `flush` is the bounded
    /// wait for the bytes to leave the host.
    fn write_all_bytes(&mut self, buf: &[u8]) -> Result<()> {
        std::io::Write::write_all(self, buf)?;
        std::io::Write::flush(self)?;
        Ok(())
    }

    /// Write an ASCII command followed by the `0xFF 0xFF 0xFF` terminator.
    fn write_command(&mut self, text: &str) -> Result<()> {
        std::io::Write::write_all(self, text.as_bytes())?;
        std::io::Write::write_all(self, &COMMAND_TERMINATOR)?;
        std::io::Write::flush(self)?;
        Ok(())
    }
}

// Re-export the native implementation when available
#[cfg(feature = "native")]
pub use native::NativePort;
