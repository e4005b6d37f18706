//! Host-side serial port discovery and classification.
//!
//! Nextion displays have a bare TTL UART and reach the host through a
//! USB-to-serial bridge; classifying the bridge chip is the best signal
//! available for picking the right port automatically.

use crate::error::{Error, Result};

#[cfg(feature = "native")]
use log::{debug, info, trace};

/// Known USB bridge kinds commonly wired to Nextion displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeKind {
    /// CH340/CH341 USB-to-Serial converter.
    Ch340,
    /// Silicon Labs CP210x USB-to-Serial converter.
    Cp210x,
    /// FTDI FT232/FT2232/FT4232 USB-to-Serial converter.
    Ftdi,
    /// Prolific PL2303 USB-to-Serial converter.
    Prolific,
    /// Unknown device.
    Unknown,
}

/// Known USB VID/PID pairs for common USB-to-UART bridges.
const KNOWN_USB_BRIDGES: &[(u16, &[u16], BridgeKind)] = &[
    (
        0x1A86,
        &[0x7523, 0x7522, 0x5523, 0x5512, 0x55D4],
        BridgeKind::Ch340,
    ),
    (0x10C4, &[0xEA60, 0xEA70, 0xEA71, 0xEA63], BridgeKind::Cp210x),
    (
        0x0403,
        &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
        BridgeKind::Ftdi,
    ),
    (
        0x067B,
        &[0x2303, 0x23A3, 0x23C3, 0x23D3],
        BridgeKind::Prolific,
    ),
];

impl BridgeKind {
    /// Classify a VID/PID combination.
    #[must_use]
    pub fn from_vid_pid(vid: u16, pid: u16) -> Self {
        for (known_vid, pids, bridge) in KNOWN_USB_BRIDGES {
            if vid == *known_vid && (pids.is_empty() || pids.contains(&pid)) {
                return *bridge;
            }
        }
        Self::Unknown
    }

    /// Get a human-readable name for the bridge kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ch340 => "CH340/CH341",
            Self::Cp210x => "CP210x",
            Self::Ftdi => "FTDI",
            Self::Prolific => "PL2303",
            Self::Unknown => "Unknown",
        }
    }

    /// Check if this is a known/expected bridge kind.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Discovered serial endpoint information.
#[derive(Debug, Clone)]
pub struct DetectedPort {
    /// Endpoint name/path (e.g., "/dev/ttyUSB0" or "COM3").
    pub name: String,
    /// Classified USB bridge kind.
    pub bridge: BridgeKind,
    /// USB Vendor ID (if available).
    pub vid: Option<u16>,
    /// USB Product ID (if available).
    pub pid: Option<u16>,
    /// Device manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Device product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial: Option<String>,
}

impl DetectedPort {
    /// Check if this endpoint sits behind a recognized USB-UART bridge.
    pub fn is_likely_display(&self) -> bool {
        self.bridge.is_known()
    }
}

/// Detect all available serial endpoints with metadata.
#[cfg(feature = "native")]
pub fn detect_ports() -> Vec<DetectedPort> {
    let mut result = Vec::new();

    match serialport::available_ports() {
        Ok(ports) => {
            for port_info in ports {
                let mut detected = DetectedPort {
                    name: port_info.port_name.clone(),
                    bridge: BridgeKind::Unknown,
                    vid: None,
                    pid: None,
                    manufacturer: None,
                    product: None,
                    serial: None,
                };

                if let serialport::SerialPortType::UsbPort(usb_info) = port_info.port_type {
                    detected.vid = Some(usb_info.vid);
                    detected.pid = Some(usb_info.pid);
                    detected.manufacturer = usb_info.manufacturer;
                    detected.product = usb_info.product;
                    detected.serial = usb_info.serial_number;
                    detected.bridge = BridgeKind::from_vid_pid(usb_info.vid, usb_info.pid);

                    trace!(
                        "Found USB port: {} (VID: {:04X}, PID: {:04X}, Bridge: {:?})",
                        port_info.port_name, usb_info.vid, usb_info.pid, detected.bridge
                    );
                }

                result.push(detected);
            }
        },
        Err(e) => {
            debug!("Failed to enumerate serial ports: {e}");
        },
    }

    result
}

/// Detect all available serial endpoints (stub without native support).
#[cfg(not(feature = "native"))]
pub fn detect_ports() -> Vec<DetectedPort> {
    Vec::new()
}

/// Auto-detect the best serial port candidate.
///
/// Prefers recognized USB-UART bridges and falls back to the first available
/// port; errors when the host has none.
#[cfg(feature = "native")]
pub fn auto_detect_port() -> Result<DetectedPort> {
    let ports = detect_ports();

    if let Some(port) = ports.iter().find(|p| p.bridge.is_known()) {
        info!(
            "Auto-detected {} USB-UART bridge: {}",
            port.bridge.name(),
            port.name
        );
        return Ok(port.clone());
    }

    if let Some(port) = ports.into_iter().next() {
        info!("Using first available port: {}", port.name);
        return Ok(port);
    }

    Err(Error::DeviceNotFound)
}

/// Auto-detect the best serial port candidate (stub without native support).
#[cfg(not(feature = "native"))]
pub fn auto_detect_port() -> Result<DetectedPort> {
    Err(Error::DeviceNotFound)
}

/// Format a list of detected endpoints for display.
pub fn format_port_list(ports: &[DetectedPort]) -> Vec<String> {
    let mut result = Vec::new();

    for port in ports {
        let bridge_info = if port.bridge.is_known() {
            format!(" [{}]", port.bridge.name())
        } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" [VID:{vid:04X} PID:{pid:04X}]")
        } else {
            String::new()
        };

        let product_info = port
            .product
            .as_ref()
            .map(|p| format!(" - {p}"))
            .unwrap_or_default();

        result.push(format!("{}{}{}", port.name, bridge_info, product_info));
    }

    result
}
