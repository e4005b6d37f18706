//! Scripted serial port double for protocol tests.
//!
//! `MockPort` plays the role of the display: it holds a queue of canned
//! reply bursts and records everything the engine writes. Each burst becomes
//! readable as soon as the previous one has been fully drained, which matches
//! the strictly sequential request/reply shape of the upload protocol.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;
use crate::port::Port;

pub(crate) struct MockPort {
    replies: VecDeque<Vec<u8>>,
    current: VecDeque<u8>,
    /// Every `write` call, in order.
    pub writes: Vec<Vec<u8>>,
    /// Baud rates set via `set_baud_rate`, in order.
    pub baud_changes: Vec<u32>,
    /// Number of `clear_input` calls.
    pub input_flushes: usize,
    baud: u32,
    timeout: Duration,
}

impl MockPort {
    pub(crate) fn new(replies: Vec<Vec<u8>>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            current: VecDeque::new(),
            writes: Vec::new(),
            baud_changes: Vec::new(),
            input_flushes: 0,
            baud: 115200,
            timeout: Duration::from_millis(1000),
        }
    }

    /// Replies not yet consumed by the engine.
    pub(crate) fn pending_replies(&self) -> usize {
        self.replies.len() + usize::from(!self.current.is_empty())
    }

    /// All written bytes flattened into one stream.
    pub(crate) fn written(&self) -> Vec<u8> {
        self.writes.concat()
    }

    fn promote_reply(&mut self) {
        if self.current.is_empty() {
            if let Some(next) = self.replies.pop_front() {
                self.current = next.into_iter().collect();
            }
        }
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        self.baud_changes.push(baud_rate);
        self.baud = baud_rate;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.baud
    }

    fn bytes_available(&mut self) -> Result<usize> {
        self.promote_reply();
        Ok(self.current.len())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.input_flushes += 1;
        self.current.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.promote_reply();
        if self.current.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no data"));
        }
        let n = buf.len().min(self.current.len());
        for b in buf.iter_mut().take(n) {
            *b = self.current.pop_front().expect("current is non-empty");
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writes.push(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
