//! Response polling.
//!
//! The display answers every instruction with a short burst of bytes. Rather
//! than blocking on a hard read, the reader polls the port's receive count at
//! a fixed interval and drains whatever arrived on the first hit. This keeps
//! a single-threaded host responsive while waiting and puts an explicit upper
//! bound on every round trip.

use std::io::Read;
use std::thread;
use std::time::Duration;

use log::warn;

use crate::error::Result;
use crate::port::Port;

/// Fixed capacity of the response buffer.
///
/// A single drain reads at most `RESPONSE_CAPACITY - 1` bytes; replies are a
/// handful of bytes plus terminators, so anything longer is truncated.
pub const RESPONSE_CAPACITY: usize = 128;

/// Bounded read time for draining an announced burst.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(5);

/// Polls a [`Port`] for device replies into a fixed-capacity buffer.
///
/// The buffer always holds the most recent reply. A poll that times out
/// leaves the previous contents in place — callers must not assume freshness
/// unless [`poll`](ResponseReader::poll) returned `true`.
#[derive(Debug)]
pub struct ResponseReader {
    interval: Duration,
    max_iterations: usize,
    buf: Vec<u8>,
}

impl ResponseReader {
    /// Create a reader with an explicit poll interval and iteration bound.
    ///
    /// The total timeout is `interval * max_iterations` (about 2 s with the
    /// defaults used by the uploader).
    pub fn new(interval: Duration, max_iterations: usize) -> Self {
        Self {
            interval,
            max_iterations,
            buf: Vec::with_capacity(RESPONSE_CAPACITY),
        }
    }

    /// The most recent reply.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Wait for the device to produce a reply and drain it into the buffer.
    ///
    /// Sleeps `interval` per iteration, up to `max_iterations` times, and
    /// performs a single bounded read the first time the port reports
    /// available bytes. Returns `Ok(true)` if the buffer was overwritten with
    /// fresh data, `Ok(false)` on timeout — in which case the buffer is left
    /// untouched and may hold a stale reply from an earlier round trip.
    pub fn poll<P: Port>(&mut self, port: &mut P) -> Result<bool> {
        for _ in 0..self.max_iterations {
            thread::sleep(self.interval);

            if port.bytes_available()? == 0 {
                continue;
            }

            let saved_timeout = port.timeout();
            port.set_timeout(DRAIN_TIMEOUT)?;

            let mut tmp = [0u8; RESPONSE_CAPACITY - 1];
            let drained = match port.read(&mut tmp) {
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
                Err(e) => {
                    let _ = port.set_timeout(saved_timeout);
                    return Err(e.into());
                },
            };
            port.set_timeout(saved_timeout)?;

            self.buf.clear();
            self.buf.extend_from_slice(&tmp[..drained]);
            return Ok(true);
        }

        warn!(
            "no reply from display within {:?}",
            self.interval * self.max_iterations as u32
        );
        Ok(false)
    }
}
