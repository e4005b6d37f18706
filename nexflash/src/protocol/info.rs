//! Device identification from the handshake reply.
//!
//! A display answers `connect` with a status line of the form
//!
//! ```text
//! comok 1,30601-0,NX4832T035_011R,52,61488,DE6D9F0B2D173E24,16777216
//! ```
//!
//! whose comma-separated fields are: touch support, reserved address, model
//! code, firmware version, MCU code, serial number and flash size in bytes.

use std::fmt;

use crate::protocol::command::HANDSHAKE_ACK;

/// Identity reported by the display during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInfo {
    /// Whether the display has a touch panel.
    pub touch: bool,
    /// Model code (e.g., "NX4832T035_011R").
    pub model: String,
    /// Firmware version number.
    pub firmware_version: u32,
    /// Device serial number.
    pub serial: String,
    /// Flash size in bytes; an uploaded image must fit inside it.
    pub flash_size: u32,
}

impl DeviceInfo {
    /// Parse a `comok` status line out of a raw handshake reply.
    ///
    /// Returns `None` when the reply does not carry a well-formed status
    /// line; identification is best-effort and never fails an upload.
    pub fn parse(reply: &[u8]) -> Option<Self> {
        let start = reply
            .windows(HANDSHAKE_ACK.len())
            .position(|w| w == HANDSHAKE_ACK)?;
        let line: &[u8] = reply[start..]
            .split(|&b| b == 0xFF)
            .next()
            .unwrap_or_default();
        let line = std::str::from_utf8(line).ok()?;

        let fields: Vec<&str> = line.strip_prefix("comok ")?.split(',').collect();
        if fields.len() < 7 {
            return None;
        }

        Some(Self {
            touch: fields[0].trim() == "1",
            model: fields[2].trim().to_string(),
            firmware_version: fields[3].trim().parse().ok()?,
            serial: fields[5].trim().to_string(),
            flash_size: fields[6].trim().parse().ok()?,
        })
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (touch: {}, fw: {}, serial: {}, flash: {} bytes)",
            self.model,
            if self.touch { "yes" } else { "no" },
            self.firmware_version,
            self.serial,
            self.flash_size
        )
    }
}
