//! The transport trait consumed by the session engine.

use std::time::Duration;

use crate::TransportError;

/// One point-to-point OBEX link.
///
/// Implementations are byte pipes; packet boundaries are the session's
/// business. Custom cable transports implement this trait directly and are
/// handed to the session in place of a built-in one.
pub trait ObexTransport: Send {
    /// Establishes the link. Called once, before the OBEX CONNECT request.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Tears the link down. Idempotent.
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Writes the whole buffer to the link.
    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError>;

    /// Reads up to `buf.len()` bytes, waiting at most `timeout`.
    ///
    /// Returns `Ok(0)` for an orderly close by the peer and
    /// [`TransportError::TimedOut`] when nothing arrived in time.
    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
}
