//! Client error type.

use obex_msg::{ObexMsgError, ResponseCode};
use obex_transport::TransportError;
use thiserror::Error;

/// Errors surfaced by session operations and discovery.
#[derive(Debug, Error)]
pub enum Error {
    /// The link failed; the session is no longer usable.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The server answered with a non-success response. The session stays
    /// usable and the next operation may be tried.
    #[error("{op} rejected with {code}")]
    Request { op: &'static str, code: ResponseCode },

    /// The peer sent bytes that do not decode as OBEX.
    #[error(transparent)]
    Msg(#[from] ObexMsgError),

    /// A local resource (file, directory) could not be used.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Device or service discovery came up empty-handed.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// The caller broke an interface contract; no events were emitted.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
