//! Nextion instruction framing and reply classification.
//!
//! The display speaks an ASCII instruction set over the serial line. Every
//! instruction is terminated by three `0xFF` bytes; raw firmware payload is
//! written without any framing. Replies are short byte strings whose meaning
//! is inferred from specific byte positions or substrings:
//!
//! ```text
//! host -> display:  D R A K J H S U Y D G B N C J H G J K S H B D N FF FF FF
//! display -> host:  1A FF FF FF                 (baud rate locked)
//! host -> display:  c o n n e c t FF FF FF
//! display -> host:  comok 1,...,NX4832T035_011R,...,61488,...  (model info)
//! host -> display:  w h m i - w r i  <size>,<baud>,0 FF FF FF
//! display -> host:  05                          (ready for data)
//! ```

/// Instruction terminator appended to every ASCII command.
pub const COMMAND_TERMINATOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Wake/probe command; a display listening at the right baud rate answers
/// with [`WAKE_ACK`].
pub const WAKE_COMMAND: &str = "DRAKJHSUYDGBNCJHGJKSHBDN";

/// Handshake command; the display answers with a `comok` status line.
pub const CONNECT_COMMAND: &str = "connect";

/// First reply byte confirming baud-rate lock after [`WAKE_COMMAND`].
pub const WAKE_ACK: u8 = 0x1A;

/// Reply byte acknowledging a completed data window, and signalling
/// upload-mode readiness after the `whmi-wri` command.
pub const READY_ACK: u8 = 0x05;

/// Marker contained in a successful handshake reply.
pub const HANDSHAKE_ACK: &[u8] = b"comok";

/// Default baud rate for the initial handshake.
pub const DEFAULT_BAUD: u32 = 115200;

/// High-speed baud rate for the bulk data phase.
pub const HIGH_BAUD: u32 = 921600;

/// Frame an ASCII instruction: text followed by the terminator.
pub fn frame_command(text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(text.len() + COMMAND_TERMINATOR.len());
    frame.extend_from_slice(text.as_bytes());
    frame.extend_from_slice(&COMMAND_TERMINATOR);
    frame
}

/// Build the `whmi-wri` instruction that switches the display into firmware
/// receive mode.
///
/// The display reconfigures its own UART to `baud` while processing this
/// instruction; the host must switch its side right after the write, without
/// an intervening round trip.
pub fn upload_command(image_size: usize, baud: u32) -> String {
    format!("whmi-wri {image_size},{baud},0")
}

/// Check whether a reply starts with the wake acknowledgement byte.
pub fn is_wake_ack(reply: &[u8]) -> bool {
    reply.first() == Some(&WAKE_ACK)
}

/// Check whether a reply contains the `comok` handshake marker anywhere.
pub fn contains_handshake_ack(reply: &[u8]) -> bool {
    reply
        .windows(HANDSHAKE_ACK.len())
        .any(|w| w == HANDSHAKE_ACK)
}

/// Check whether any byte of a reply is the ready/window acknowledgement.
pub fn contains_ready_ack(reply: &[u8]) -> bool {
    reply.contains(&READY_ACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_command_appends_terminator() {
        let frame = frame_command("connect");
        assert_eq!(&frame[..7], b"connect");
        assert_eq!(&frame[7..], &[0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_frame_command_empty_text() {
        assert_eq!(frame_command(""), vec![0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_upload_command_format() {
        assert_eq!(upload_command(197844, 921600), "whmi-wri 197844,921600,0");
        assert_eq!(upload_command(0, 115200), "whmi-wri 0,115200,0");
    }

    #[test]
    fn test_is_wake_ack() {
        assert!(is_wake_ack(&[0x1A]));
        assert!(is_wake_ack(&[0x1A, 0xFF, 0xFF, 0xFF]));
        assert!(!is_wake_ack(&[0xFF, 0x1A]));
        assert!(!is_wake_ack(&[]));
    }

    #[test]
    fn test_contains_handshake_ack() {
        assert!(contains_handshake_ack(b"comok 1,555,NX4832T035_011R,52"));
        // Marker does not have to start the buffer
        assert!(contains_handshake_ack(b"\x1A\xFF\xFF\xFFcomok 0,..."));
        assert!(!contains_handshake_ack(b"como"));
        assert!(!contains_handshake_ack(b""));
    }

    #[test]
    fn test_contains_ready_ack() {
        assert!(contains_ready_ack(&[0x05]));
        assert!(contains_ready_ack(&[0xFF, 0xFF, 0x05, 0xFF]));
        assert!(!contains_ready_ack(&[0x1A, 0xFF]));
    }
}
