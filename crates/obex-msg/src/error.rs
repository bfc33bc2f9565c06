//! Error type for OBEX packet encoding and decoding.

use thiserror::Error;

/// Errors produced while building or parsing OBEX packets.
#[derive(Debug, Error)]
pub enum ObexMsgError {
    /// The byte stream could not be decoded as the expected structure.
    #[error("malformed packet: {0}")]
    Malformed(#[from] binrw::Error),

    /// A response packet carried a code outside the OBEX table.
    #[error("unknown response code {0:#04x}")]
    UnknownResponseCode(u8),

    /// The length prefix disagrees with the bytes actually framed.
    #[error("declared packet length {declared} does not match the {actual} bytes received")]
    LengthMismatch { declared: u16, actual: usize },

    /// A request was asked to fit a single packet and could not.
    #[error("request of {size} bytes does not fit the {max_packet}-byte packet limit")]
    RequestTooLarge { size: usize, max_packet: u16 },
}
