//! OBEX wire model: packets, headers and request objects.
//!
//! This crate owns the bit layout of the protocol so the session engine in
//! `obexftp` never has to. Everything is big-endian, per IrOBEX 1.2.

#![forbid(unsafe_code)]

pub mod binrw_util;
pub mod error;
pub mod header;
pub mod packet;
pub mod request;

pub use binrw_util::{AsciiZ, UnicodeName};
pub use error::ObexMsgError;
pub use header::{Header, HeaderClass, RawHeader, RawValue, header_id};
pub use packet::{
    ConnectFields, DEFAULT_MAX_PACKET, MINIMUM_MAX_PACKET, OBEX_VERSION, OpCode,
    PACKET_PREFIX_LEN, ResponseCode, ResponsePacket, SetPathFields, SetPathFlags,
};
pub use request::{FOLDER_LISTING_TYPE, Request, RequestFields, TARGET_FBS, TARGET_S45};

/// OBEX message Result type
pub type Result<T> = std::result::Result<T, ObexMsgError>;
