//! Nextion firmware upload session.
//!
//! Implements the vendor upload sequence: wake the display and verify the
//! baud-rate lock, handshake with `connect`, switch both sides to the
//! high-speed upload rate via `whmi-wri`, then stream the image in
//! acknowledgement-gated 4096-byte windows.
//!
//! ## Example
//!
//! ```rust,no_run
//! use nexflash::{UploadConfig, Uploader};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let image = std::fs::read("ui.tft")?;
//!
//!     let mut uploader = Uploader::open("/dev/ttyUSB0", UploadConfig::default())?;
//!     uploader.upload(&image, |sent, total| {
//!         println!("{sent}/{total} bytes");
//!     })?;
//!
//!     Ok(())
//! }
//! ```

use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::command::{
    CONNECT_COMMAND, DEFAULT_BAUD, HIGH_BAUD, READY_ACK, WAKE_COMMAND, contains_handshake_ack,
    contains_ready_ack, is_wake_ack, upload_command,
};
use crate::protocol::info::DeviceInfo;
use crate::protocol::response::ResponseReader;
use log::{debug, info, trace, warn};
use std::thread;
use std::time::Duration;

/// Span of payload bytes the display accepts before requiring an
/// acknowledgement.
pub const WINDOW_SIZE: usize = 4096;

/// Time the display needs to reboot and re-arm after the last data byte.
const SETTLE_DELAY: Duration = Duration::from_millis(1600);

/// Interval between reply polls.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Reply poll iterations before giving up (about 2 s with the default
/// interval).
const POLL_ITERATIONS: usize = 200;

/// Upload session configuration.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Baud rate for the initial handshake; must match what the display is
    /// currently configured for.
    pub connect_baud: u32,
    /// Baud rate negotiated for the bulk data phase.
    pub upload_baud: u32,
    /// Wait after the last data byte before re-probing the display.
    pub settle_delay: Duration,
    /// Interval between reply polls.
    pub poll_interval: Duration,
    /// Maximum reply poll iterations per round trip.
    pub poll_iterations: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            connect_baud: DEFAULT_BAUD,
            upload_baud: HIGH_BAUD,
            settle_delay: SETTLE_DELAY,
            poll_interval: POLL_INTERVAL,
            poll_iterations: POLL_ITERATIONS,
        }
    }
}

impl UploadConfig {
    /// Set the handshake baud rate.
    #[must_use]
    pub fn with_connect_baud(mut self, baud: u32) -> Self {
        self.connect_baud = baud;
        self
    }

    /// Set the bulk data phase baud rate.
    #[must_use]
    pub fn with_upload_baud(mut self, baud: u32) -> Self {
        self.upload_baud = baud;
        self
    }

    /// Set the post-upload settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Set the reply poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the reply poll iteration bound.
    #[must_use]
    pub fn with_poll_iterations(mut self, iterations: usize) -> Self {
        self.poll_iterations = iterations;
        self
    }
}

/// Connection phase of an upload session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// No handshake performed yet, or the previous upload completed.
    Disconnected,
    /// Handshake done; the display is in firmware-receive mode.
    Ready,
    /// A protocol step failed; only `connect` can revive the session.
    Failed,
}

/// Outcome of a successful [`Uploader::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More data is expected.
    Continue,
    /// The whole image was delivered and the session was reset.
    Complete,
}

/// Drives a firmware upload over a [`Port`].
///
/// One session serves one upload at a time and must not be driven from more
/// than one logical caller. Every operation is a blocking round trip with a
/// bounded timeout; there is no cancellation mid-call.
pub struct Uploader<P: Port> {
    port: P,
    config: UploadConfig,
    image_size: usize,
    sent: usize,
    window_fill: usize,
    phase: Phase,
    response: ResponseReader,
    device: Option<DeviceInfo>,
}

impl<P: Port> Uploader<P> {
    /// Create an upload session over an already opened port.
    pub fn new(port: P, config: UploadConfig) -> Self {
        let response = ResponseReader::new(config.poll_interval, config.poll_iterations);
        Self {
            port,
            config,
            image_size: 0,
            sent: 0,
            window_fill: 0,
            phase: Phase::Disconnected,
            response,
            device: None,
        }
    }

    /// Get a reference to the underlying port.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the session and return the underlying port.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Identity reported by the display during the last handshake, if it
    /// could be parsed.
    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Payload bytes delivered so far in the current upload.
    pub fn bytes_sent(&self) -> usize {
        self.sent
    }

    /// Whether the display is currently in firmware-receive mode.
    pub fn is_connected(&self) -> bool {
        self.phase == Phase::Ready
    }

    /// Place the display into firmware-receive mode for an image of
    /// `image_size` bytes.
    ///
    /// Runs the wake/connect/`whmi-wri` sequence and switches the local baud
    /// rate to the upload rate. Any mismatch aborts with a distinct error and
    /// leaves the session unusable until `connect` is called again.
    pub fn connect(&mut self, image_size: usize) -> Result<()> {
        // Every early return below leaves the session failed; only the full
        // sequence re-arms it.
        self.phase = Phase::Failed;
        self.device = None;

        // A previous failed attempt may have left the local side at the
        // upload rate with half a reply in the receive buffer.
        self.port.set_baud_rate(self.config.connect_baud)?;
        self.port.clear_input()?;

        debug!(
            "probing display on {} at {} baud",
            self.port.name(),
            self.config.connect_baud
        );
        self.port.write_command(WAKE_COMMAND)?;
        self.response.poll(&mut self.port)?;
        if !is_wake_ack(self.response.bytes()) {
            return Err(Error::WrongBaudRate);
        }

        self.port.write_command(CONNECT_COMMAND)?;
        self.response.poll(&mut self.port)?;
        if !contains_handshake_ack(self.response.bytes()) {
            return Err(Error::WrongHandshakeResponse);
        }
        self.device = DeviceInfo::parse(self.response.bytes());
        match &self.device {
            Some(device) => info!("display identified: {device}"),
            None => info!(
                "display answered: {}",
                String::from_utf8_lossy(self.response.bytes()).trim_end_matches('\u{fffd}')
            ),
        }

        self.port
            .write_command(&upload_command(image_size, self.config.upload_baud))?;
        // The display reconfigures its UART while processing whmi-wri; the
        // local side must match it before the reply arrives.
        self.port.set_baud_rate(self.config.upload_baud)?;
        self.response.poll(&mut self.port)?;
        if !contains_ready_ack(self.response.bytes()) {
            return Err(Error::WrongReadyResponse);
        }

        self.image_size = image_size;
        self.sent = 0;
        self.window_fill = 0;
        self.phase = Phase::Ready;
        info!(
            "display ready to receive {} bytes at {} baud",
            image_size, self.config.upload_baud
        );
        Ok(())
    }

    /// Deliver the next slice of the image.
    ///
    /// The caller may supply chunks of any size; slices that straddle a
    /// 4096-byte window boundary are split, with the acknowledgement for the
    /// filled window collected in between. Bytes beyond the declared image
    /// size are dropped.
    ///
    /// Returns [`Progress::Complete`] once the cumulative payload equals the
    /// image size; the session is then reset and can be connected again. On
    /// error the session is unusable until the next `connect`.
    pub fn send(&mut self, chunk: &[u8]) -> Result<Progress> {
        if self.phase != Phase::Ready {
            return Err(Error::NotConnected);
        }
        // Pessimistically fail the session; restored right before returning.
        self.phase = Phase::Failed;

        let remaining = self.image_size - self.sent;
        let chunk = &chunk[..chunk.len().min(remaining)];
        let len = chunk.len();

        if self.window_fill + len > WINDOW_SIZE {
            // Fill the current window, collect its acknowledgement, then
            // start the next window with the remainder.
            let head = WINDOW_SIZE - self.window_fill;
            self.port.write_all_bytes(&chunk[..head])?;
            self.response.poll(&mut self.port)?;
            if self.response.bytes().first() != Some(&READY_ACK) {
                return Err(Error::WindowAck);
            }
            trace!("window acknowledged at {} bytes", self.sent + head);

            let rest = &chunk[head..];
            self.port.write_all_bytes(rest)?;
            self.window_fill = rest.len();
        } else {
            self.port.write_all_bytes(chunk)?;
            self.window_fill += len;
        }
        self.sent += len;

        if self.sent == self.image_size {
            self.finalize()?;
            return Ok(Progress::Complete);
        }

        self.phase = Phase::Ready;
        Ok(Progress::Continue)
    }

    /// Upload a complete image, feeding it through [`send`](Self::send) in
    /// window-sized chunks.
    ///
    /// `progress` is invoked with `(sent, total)` after every chunk.
    pub fn upload<F>(&mut self, data: &[u8], mut progress: F) -> Result<()>
    where
        F: FnMut(usize, usize),
    {
        let total = data.len();
        self.connect(total)?;

        let mut offset = 0;
        while offset < total {
            let end = (offset + WINDOW_SIZE).min(total);
            self.send(&data[offset..end])?;
            offset = end;
            progress(offset, total);
        }
        Ok(())
    }

    /// Reset the session and bring the display back to its normal,
    /// responsive state after the last byte was delivered.
    fn finalize(&mut self) -> Result<()> {
        debug!("all {} bytes delivered, re-arming display", self.image_size);
        self.sent = 0;
        self.window_fill = 0;
        self.phase = Phase::Disconnected;

        self.port.set_baud_rate(self.config.connect_baud)?;
        thread::sleep(self.config.settle_delay);
        self.port.clear_input()?;

        // The display reboots into the new firmware; probe it once so it ends
        // up awake. The upload itself is already complete, so the reply only
        // rates a warning.
        self.port.write_command(WAKE_COMMAND)?;
        let fresh = self.response.poll(&mut self.port)?;
        if !fresh || !is_wake_ack(self.response.bytes()) {
            warn!("display did not answer the post-upload wake command");
        }
        Ok(())
    }
}

// Native-specific convenience functions
#[cfg(feature = "native")]
mod native_impl {
    use super::{Result, UploadConfig, Uploader};
    use crate::port::{NativePort, SerialConfig};

    impl Uploader<NativePort> {
        /// Create an upload session by opening a serial port.
        ///
        /// The port is opened at the configured handshake baud rate.
        ///
        /// # Arguments
        ///
        /// * `port_name` - Serial port name (e.g., "/dev/ttyUSB0" or "COM3")
        /// * `config` - Upload session configuration
        pub fn open(port_name: &str, config: UploadConfig) -> Result<Self> {
            let port = NativePort::open(&SerialConfig::new(port_name, config.connect_baud))?;
            Ok(Self::new(port, config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockPort;
    use crate::protocol::command::WAKE_ACK;

    const COMOK_REPLY: &[u8] =
        b"comok 1,30601-0,NX4832T035_011R,52,61488,DE6D9F0B2D173E24,16777216\xFF\xFF\xFF";

    /// Config with a near-instant poll loop and no settle delay so protocol
    /// failures do not stall the test run.
    fn test_config() -> UploadConfig {
        UploadConfig::default()
            .with_settle_delay(Duration::ZERO)
            .with_poll_interval(Duration::from_millis(1))
            .with_poll_iterations(3)
    }

    /// Replies for a successful wake/connect/whmi-wri handshake.
    fn handshake_replies() -> Vec<Vec<u8>> {
        vec![
            vec![WAKE_ACK, 0xFF, 0xFF, 0xFF],
            COMOK_REPLY.to_vec(),
            vec![READY_ACK],
        ]
    }

    /// Connected session with extra scripted replies for the data phase.
    fn connected_uploader(image_size: usize, extra: Vec<Vec<u8>>) -> Uploader<MockPort> {
        let mut replies = handshake_replies();
        replies.extend(extra);
        let mut uploader = Uploader::new(MockPort::new(replies), test_config());
        uploader
            .connect(image_size)
            .expect("handshake should succeed");
        uploader
    }

    /// Total payload bytes among the recorded writes. Tests use 0xAA-filled
    /// payload so it cannot be mistaken for command text or terminators.
    fn payload_bytes(port: &MockPort) -> usize {
        port.writes
            .iter()
            .filter(|w| !w.is_empty() && w.iter().all(|&b| b == 0xAA))
            .map(Vec::len)
            .sum()
    }

    // ---- connect ----

    #[test]
    fn test_connect_performs_full_handshake() {
        let uploader = connected_uploader(1000, vec![]);
        let port = uploader.port();

        assert!(uploader.is_connected());
        assert_eq!(uploader.bytes_sent(), 0);

        // Local side re-armed at the handshake rate, then switched to the
        // upload rate together with the whmi-wri command.
        assert_eq!(port.baud_changes, vec![115200, 921600]);
        assert_eq!(port.input_flushes, 1);

        let written = port.written();
        let expected: Vec<u8> = [
            crate::protocol::command::frame_command(WAKE_COMMAND),
            crate::protocol::command::frame_command(CONNECT_COMMAND),
            crate::protocol::command::frame_command("whmi-wri 1000,921600,0"),
        ]
        .concat();
        assert_eq!(written, expected);
    }

    #[test]
    fn test_connect_parses_device_info() {
        let uploader = connected_uploader(1000, vec![]);
        let info = uploader.device_info().expect("comok reply should parse");
        assert_eq!(info.model, "NX4832T035_011R");
        assert_eq!(info.flash_size, 16777216);
    }

    #[test]
    fn test_connect_wrong_wake_byte_is_baud_error() {
        // First reply byte is not 0x1A.
        let mut uploader = Uploader::new(
            MockPort::new(vec![vec![0x00, 0xFF, 0xFF, 0xFF]]),
            test_config(),
        );

        assert!(matches!(uploader.connect(1000), Err(Error::WrongBaudRate)));
        assert!(!uploader.is_connected());

        // Nothing beyond the wake command was ever written.
        let expected = crate::protocol::command::frame_command(WAKE_COMMAND);
        assert_eq!(uploader.port().written(), expected);
    }

    #[test]
    fn test_connect_timeout_surfaces_as_baud_error() {
        // The display never answers. The poll leaves the (empty)
        // response buffer untouched and the wake check fails; the timeout is
        // deliberately indistinguishable from a wrong-baud reply.
        let mut uploader = Uploader::new(MockPort::new(vec![]), test_config());
        assert!(matches!(uploader.connect(1000), Err(Error::WrongBaudRate)));
    }

    #[test]
    fn test_connect_missing_comok_is_handshake_error() {
        let mut uploader = Uploader::new(
            MockPort::new(vec![vec![WAKE_ACK, 0xFF], b"huh?".to_vec()]),
            test_config(),
        );

        assert!(matches!(
            uploader.connect(1000),
            Err(Error::WrongHandshakeResponse)
        ));
        // Wake and connect commands only; whmi-wri was never sent.
        let expected: Vec<u8> = [
            crate::protocol::command::frame_command(WAKE_COMMAND),
            crate::protocol::command::frame_command(CONNECT_COMMAND),
        ]
        .concat();
        assert_eq!(uploader.port().written(), expected);
    }

    #[test]
    fn test_connect_without_ready_byte_is_ready_error() {
        let mut uploader = Uploader::new(
            MockPort::new(vec![
                vec![WAKE_ACK, 0xFF],
                COMOK_REPLY.to_vec(),
                vec![0xFF, 0xFF],
            ]),
            test_config(),
        );

        assert!(matches!(
            uploader.connect(1000),
            Err(Error::WrongReadyResponse)
        ));
        // The local baud was already switched together with whmi-wri.
        assert_eq!(uploader.port().baud_changes, vec![115200, 921600]);
    }

    #[test]
    fn test_reconnect_after_failed_ready_rearms_handshake_baud() {
        let mut replies = vec![vec![WAKE_ACK, 0xFF], COMOK_REPLY.to_vec(), vec![0xFF]];
        replies.extend(handshake_replies());
        let mut uploader = Uploader::new(MockPort::new(replies), test_config());

        assert!(uploader.connect(1000).is_err());
        uploader.connect(1000).expect("second attempt should succeed");

        assert!(uploader.is_connected());
        assert_eq!(
            uploader.port().baud_changes,
            vec![115200, 921600, 115200, 921600]
        );
    }

    // ---- send ----

    #[test]
    fn test_send_before_connect_is_rejected() {
        let mut uploader = Uploader::new(MockPort::new(vec![]), test_config());
        assert!(matches!(
            uploader.send(&[0xAA; 16]),
            Err(Error::NotConnected)
        ));
        assert!(uploader.port().writes.is_empty());
    }

    #[test]
    fn test_send_splits_at_window_boundary() {
        // image_size = 5000: 4096 fills the first window exactly (no ack
        // yet), the next 904 cross the boundary and require the ack first.
        let mut uploader = connected_uploader(
            5000,
            vec![vec![READY_ACK], vec![WAKE_ACK, 0xFF, 0xFF, 0xFF]],
        );

        assert_eq!(uploader.send(&[0xAA; 4096]).unwrap(), Progress::Continue);
        // Exact fill: the window ack is still pending, not consumed.
        assert_eq!(uploader.port().pending_replies(), 2);

        assert_eq!(uploader.send(&[0xAA; 904]).unwrap(), Progress::Complete);
        assert_eq!(payload_bytes(uploader.port()), 5000);
        assert_eq!(uploader.port().pending_replies(), 0);
        assert_eq!(uploader.bytes_sent(), 0);
        assert!(!uploader.is_connected());
    }

    #[test]
    fn test_exact_single_window_skips_mid_ack() {
        // image_size = 4096 in one send: fill hits the limit without
        // exceeding it, so no mid-window ack is requested and the upload
        // finalizes immediately.
        let mut uploader = connected_uploader(4096, vec![vec![WAKE_ACK]]);

        assert_eq!(uploader.send(&[0xAA; 4096]).unwrap(), Progress::Complete);
        assert_eq!(payload_bytes(uploader.port()), 4096);
        assert_eq!(uploader.port().pending_replies(), 0);
    }

    #[test]
    fn test_finalize_restores_baud_and_reprobes() {
        let mut uploader = connected_uploader(4096, vec![vec![WAKE_ACK]]);
        uploader.send(&[0xAA; 4096]).unwrap();

        let port = uploader.port();
        // connect switched to the upload rate; finalize switched back.
        assert_eq!(port.baud_changes, vec![115200, 921600, 115200]);
        // One flush at connect, one before the post-upload probe.
        assert_eq!(port.input_flushes, 2);
        // The trailing wake command went out.
        let written = port.written();
        let wake = crate::protocol::command::frame_command(WAKE_COMMAND);
        assert!(written.ends_with(&wake));
    }

    #[test]
    fn test_finalize_ignores_missing_wake_reply() {
        // The trailing probe's reply is advisory: its absence still completes
        // the upload.
        let mut uploader = connected_uploader(4096, vec![]);
        assert_eq!(uploader.send(&[0xAA; 4096]).unwrap(), Progress::Complete);
    }

    #[test]
    fn test_window_ack_failure_ends_session() {
        let mut uploader = connected_uploader(5000, vec![vec![0xFF]]);

        assert_eq!(uploader.send(&[0xAA; 4096]).unwrap(), Progress::Continue);
        assert!(matches!(
            uploader.send(&[0xAA; 904]),
            Err(Error::WindowAck)
        ));

        // Failure idempotence: no further writes until connect() runs again.
        let writes_after_failure = uploader.port().writes.len();
        assert!(matches!(
            uploader.send(&[0xAA; 904]),
            Err(Error::NotConnected)
        ));
        assert_eq!(uploader.port().writes.len(), writes_after_failure);
    }

    #[test]
    fn test_chunks_misaligned_with_window_boundaries() {
        // 10000 bytes in 3000-byte chunks crosses the 4096 and 8192
        // boundaries mid-chunk; exactly two window acks are consumed.
        let mut uploader = connected_uploader(
            10000,
            vec![vec![READY_ACK], vec![READY_ACK], vec![WAKE_ACK]],
        );

        assert_eq!(uploader.send(&[0xAA; 3000]).unwrap(), Progress::Continue);
        assert_eq!(uploader.send(&[0xAA; 3000]).unwrap(), Progress::Continue);
        assert_eq!(uploader.send(&[0xAA; 3000]).unwrap(), Progress::Continue);
        assert_eq!(uploader.send(&[0xAA; 1000]).unwrap(), Progress::Complete);

        assert_eq!(payload_bytes(uploader.port()), 10000);
        assert_eq!(uploader.port().pending_replies(), 0);
    }

    #[test]
    fn test_send_clamps_excess_beyond_image_size() {
        let mut uploader = connected_uploader(100, vec![vec![WAKE_ACK]]);

        assert_eq!(uploader.send(&[0xAA; 150]).unwrap(), Progress::Complete);
        assert_eq!(payload_bytes(uploader.port()), 100);
    }

    // ---- upload ----

    #[test]
    fn test_upload_drives_whole_image() {
        // 9000 bytes = window-sized chunks 4096 + 4096 + 808; the second and
        // third chunks each cross a boundary.
        let mut replies = handshake_replies();
        replies.extend(vec![vec![READY_ACK], vec![READY_ACK], vec![WAKE_ACK]]);
        let mut uploader = Uploader::new(MockPort::new(replies), test_config());

        let image = vec![0xAA; 9000];
        let mut reported = Vec::new();
        uploader
            .upload(&image, |sent, total| reported.push((sent, total)))
            .expect("upload should succeed");

        assert_eq!(reported, vec![(4096, 9000), (8192, 9000), (9000, 9000)]);
        assert_eq!(payload_bytes(uploader.port()), 9000);
        assert_eq!(uploader.port().pending_replies(), 0);
    }

    #[test]
    fn test_upload_aborts_on_handshake_failure() {
        let mut uploader = Uploader::new(MockPort::new(vec![vec![0x00]]), test_config());
        let image = vec![0xAA; 9000];

        assert!(matches!(
            uploader.upload(&image, |_, _| {}),
            Err(Error::WrongBaudRate)
        ));
        assert_eq!(payload_bytes(uploader.port()), 0);
    }
}
