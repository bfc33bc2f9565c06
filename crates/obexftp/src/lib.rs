//! OBEX file-transfer client.
//!
//! A [`Session`] drives one OBEX conversation (list, get, put, delete,
//! rename, navigate) over any [`obex_transport::ObexTransport`], reporting
//! progress through an [`EventSink`]. The [`discovery`] module locates an
//! OBEX service on a Bluetooth peer and yields the RFCOMM channel to dial.

pub mod apparam;
pub mod client;
pub mod discovery;
pub mod error;
pub mod event;
pub mod path;
pub mod session;

pub use apparam::{INFO_MEMORY_FREE, INFO_MEMORY_USED, InfoParam};
pub use error::Error;
pub use event::{Event, EventSink, NullSink};
pub use session::{PUMP_TIMEOUT, STREAM_CHUNK, Session, SessionConfig};

pub use obex_msg as msg;
pub use obex_transport as transport;

/// OBEX client Result type
pub type Result<T> = std::result::Result<T, crate::Error>;
