//! Error types for nexflash.

use std::io;
use thiserror::Error;

/// Result type for nexflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for nexflash operations.
///
/// Protocol failures are terminal for the current upload session: the caller
/// must discard the session state and re-run `connect` to retry. No partial
/// window is retried or replayed internally.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Wake acknowledgement (0x1A) not observed; likely a misconfigured
    /// connect baud rate or wrong wiring.
    #[error("Wrong baud rate: display did not acknowledge the wake command")]
    WrongBaudRate,

    /// Handshake reply did not carry the expected `comok` marker.
    #[error("Wrong handshake response: display did not answer `connect`")]
    WrongHandshakeResponse,

    /// Display did not signal readiness (0x05) after the upload-mode command.
    #[error("Wrong ready response: display did not enter upload mode")]
    WrongReadyResponse,

    /// Display did not acknowledge a completed 4096-byte data window.
    #[error("Window not acknowledged: display rejected a 4096-byte block")]
    WindowAck,

    /// `send` was called without a successful `connect`, or after a prior
    /// failure ended the session.
    #[error("Session not connected: call connect() first")]
    NotConnected,

    /// No usable serial port was found on the host.
    #[error("Device not found: no serial port available")]
    DeviceNotFound,
}
