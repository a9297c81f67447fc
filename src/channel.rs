//! Channel abstraction
//!
//! This module defines the operations an echo session performs on its
//! encrypted channel, abstracting over the concrete TLS transport. The
//! session code is written against this trait so its state machine can be
//! exercised with an instrumented fake in tests.

use std::io;

/// Operations on one bidirectional, encrypted byte stream.
///
/// A channel is exclusively owned by one session. After `shutdown` returns,
/// no further operation may be performed on the channel.
pub trait Channel {
    /// Read data from the channel.
    ///
    /// Returns `Ok(0)` when the peer closed its side cleanly.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write data to the channel, returning the number of bytes accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Shut the channel down, releasing transport resources.
    fn shutdown(&mut self) -> io::Result<()>;

    /// Write the whole buffer to the channel.
    ///
    /// A short write of zero bytes is reported as an error rather than
    /// looping forever.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            let n = self.write(buf)?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "channel accepted no data",
                ));
            }
            buf = &buf[n..];
        }
        Ok(())
    }
}
