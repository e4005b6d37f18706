//! Nextion upload protocol implementation.

pub mod command;
pub mod info;
pub mod response;

// Re-export common types
pub use command::{
    CONNECT_COMMAND, DEFAULT_BAUD, HIGH_BAUD, READY_ACK, WAKE_ACK, WAKE_COMMAND,
    contains_handshake_ack, contains_ready_ack, is_wake_ack, upload_command,
};
pub use info::DeviceInfo;
pub use response::ResponseReader;
