//! Transport error type.

use thiserror::Error;

/// Errors raised by the link layer.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing arrived within the caller's timeout. Not fatal; the session
    /// loop polls again.
    #[error("read timed out")]
    TimedOut,

    /// The transport was used before `connect` or after `disconnect`.
    #[error("transport is not connected")]
    NotConnected,

    /// No peer answered IrDA discovery.
    #[error("no IrDA device discovered")]
    NoPeer,

    /// A Bluetooth address string was not `XX:XX:XX:XX:XX:XX`.
    #[error("invalid Bluetooth address `{0}`")]
    InvalidAddress(String),

    /// The RFCOMM channel is outside 1..=30.
    #[error("RFCOMM channel {0} out of range")]
    InvalidChannel(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
