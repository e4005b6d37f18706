//! # nexflash
//!
//! A library for uploading firmware to Nextion HMI displays.
//!
//! This crate provides the core functionality for talking to a Nextion
//! display over a serial port, including:
//!
//! - The vendor wake/connect handshake and baud-rate renegotiation
//! - Windowed, acknowledgement-gated transfer of `.tft` firmware images
//! - Device identification from the handshake reply
//! - Host-side serial port discovery
//!
//! The firmware image is treated as an opaque byte stream of known length;
//! the engine never inspects its internal structure.
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use nexflash::{UploadConfig, Uploader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = std::fs::read("ui.tft")?;
//!
//!     // Open the port at the handshake rate and create a session
//!     let config = UploadConfig::default();
//!     let mut uploader = Uploader::open("/dev/ttyUSB0", config)?;
//!
//!     // Handshake, renegotiate the baud rate, stream the image
//!     uploader.upload(&image, |sent, total| {
//!         println!("{sent}/{total} bytes");
//!     })?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod device;
pub mod error;
pub mod port;
pub mod protocol;
pub mod uploader;

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    device::{BridgeKind, DetectedPort, auto_detect_port, detect_ports, format_port_list},
    error::{Error, Result},
    port::{Port, SerialConfig},
    protocol::{
        DEFAULT_BAUD, DeviceInfo, HIGH_BAUD, ResponseReader, contains_handshake_ack,
        contains_ready_ack, is_wake_ack,
    },
    uploader::{Progress, UploadConfig, Uploader, WINDOW_SIZE},
};
