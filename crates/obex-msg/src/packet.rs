//! OBEX packet framing: opcodes, response codes and the length prefix.
//!
//! Every packet starts with `code (u8) | length (u16 BE)` where the length
//! counts the whole packet, prefix included. CONNECT packets carry four fixed
//! bytes between the prefix and the headers; SETPATH requests carry two.

use std::io::{Read, Seek, Write};

use binrw::{Endian, prelude::*};
use modular_bitfield::prelude::*;

use crate::{Header, ObexMsgError};

/// OBEX protocol version 1.0, major/minor nibbles.
pub const OBEX_VERSION: u8 = 0x10;

/// Bytes of the `code | length` packet prefix.
pub const PACKET_PREFIX_LEN: usize = 3;

/// Receive MTU advertised in CONNECT requests.
pub const DEFAULT_MAX_PACKET: u16 = 8192;

/// Smallest maximum-packet-size a peer is allowed to advertise.
pub const MINIMUM_MAX_PACKET: u16 = 255;

/// An OBEX operation code. The high bit marks the packet as final; CONNECT,
/// DISCONNECT, SETPATH and ABORT carry it always, GET and PUT only on their
/// last packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
pub struct OpCode(pub u8);

impl OpCode {
    pub const FINAL: u8 = 0x80;

    pub const CONNECT: OpCode = OpCode(0x80);
    pub const DISCONNECT: OpCode = OpCode(0x81);
    pub const PUT: OpCode = OpCode(0x02);
    pub const GET: OpCode = OpCode(0x03);
    pub const SETPATH: OpCode = OpCode(0x85);
    pub const ABORT: OpCode = OpCode(0xFF);

    pub fn is_final(self) -> bool {
        self.0 & Self::FINAL != 0
    }

    pub fn with_final(self) -> OpCode {
        OpCode(self.0 | Self::FINAL)
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match OpCode(self.0 | Self::FINAL) {
            OpCode::CONNECT => "Connect",
            OpCode::DISCONNECT => "Disconnect",
            OpCode(0x82) => "Put",
            OpCode(0x83) => "Get",
            OpCode::SETPATH => "SetPath",
            OpCode::ABORT => "Abort",
            _ => "Unknown",
        };
        write!(f, "{} ({:#04x})", name, self.0)
    }
}

macro_rules! make_response_code {
    (
        $($name:ident = $value:literal: $description:literal, )+
    ) => {

/// OBEX response codes as they appear on the wire, final bit included.
///
/// The table mirrors the HTTP status space shifted into one byte; only
/// [`Continue`][ResponseCode::Continue] leaves a request in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead, BinWrite)]
#[brw(repr(u8))]
#[repr(u8)]
pub enum ResponseCode {
    $(
        #[doc = concat!($description, " (", stringify!($value), ")")]
        $name = $value,
    )+
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message_as_string = match self {
            $(
                ResponseCode::$name => $description,
            )+
        };
        write!(f, "{} ({:#04x})", message_as_string, *self as u8)
    }
}

impl ResponseCode {
    /// A helper that tries converting a raw byte to a [`ResponseCode`] and
    /// returns its description, falling back to the hex representation for
    /// codes outside the table.
    pub fn try_display_as_code(value: u8) -> String {
        match Self::try_from(value) {
            Ok(code) => format!("{}", code),
            Err(_) => format!("{:#04x}", value),
        }
    }
}
    };
}

make_response_code! {
    Continue = 0x90: "Continue",
    Success = 0xA0: "Success",
    Created = 0xA1: "Created",
    Accepted = 0xA2: "Accepted",
    NonAuthoritative = 0xA3: "Non-Authoritative Information",
    NoContent = 0xA4: "No Content",
    ResetContent = 0xA5: "Reset Content",
    PartialContent = 0xA6: "Partial Content",
    MultipleChoices = 0xB0: "Multiple Choices",
    MovedPermanently = 0xB1: "Moved Permanently",
    MovedTemporarily = 0xB2: "Moved Temporarily",
    SeeOther = 0xB3: "See Other",
    NotModified = 0xB4: "Not Modified",
    UseProxy = 0xB5: "Use Proxy",
    BadRequest = 0xC0: "Bad Request",
    Unauthorized = 0xC1: "Unauthorized",
    PaymentRequired = 0xC2: "Payment Required",
    Forbidden = 0xC3: "Forbidden",
    NotFound = 0xC4: "Not Found",
    MethodNotAllowed = 0xC5: "Method Not Allowed",
    NotAcceptable = 0xC6: "Not Acceptable",
    ProxyAuthRequired = 0xC7: "Proxy Authentication Required",
    RequestTimeout = 0xC8: "Request Timeout",
    Conflict = 0xC9: "Conflict",
    Gone = 0xCA: "Gone",
    LengthRequired = 0xCB: "Length Required",
    PreconditionFailed = 0xCC: "Precondition Failed",
    RequestEntityTooLarge = 0xCD: "Request Entity Too Large",
    RequestUrlTooLarge = 0xCE: "Request URL Too Large",
    UnsupportedMediaType = 0xCF: "Unsupported Media Type",
    InternalServerError = 0xD0: "Internal Server Error",
    NotImplemented = 0xD1: "Not Implemented",
    BadGateway = 0xD2: "Bad Gateway",
    ServiceUnavailable = 0xD3: "Service Unavailable",
    GatewayTimeout = 0xD4: "Gateway Timeout",
    HttpVersionNotSupported = 0xD5: "HTTP Version Not Supported",
    DatabaseFull = 0xE0: "Database Full",
    DatabaseLocked = 0xE1: "Database Locked",
}

impl ResponseCode {
    pub fn is_success(self) -> bool {
        self == ResponseCode::Success
    }

    /// The request is still in progress and wants another packet exchanged.
    pub fn is_continue(self) -> bool {
        self == ResponseCode::Continue
    }
}

impl TryFrom<u8> for ResponseCode {
    type Error = ObexMsgError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        ResponseCode::read_be(&mut binrw::io::Cursor::new([value]))
            .map_err(|_| ObexMsgError::UnknownResponseCode(value))
    }
}

/// Fixed fields of CONNECT requests and responses.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectFields {
    pub version: u8,
    pub flags: u8,
    pub max_packet_size: u16,
}

impl Default for ConnectFields {
    fn default() -> Self {
        ConnectFields {
            version: OBEX_VERSION,
            flags: 0,
            max_packet_size: DEFAULT_MAX_PACKET,
        }
    }
}

/// Flags byte of a SETPATH request.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPathFlags {
    /// Go one level up before applying any NAME header.
    pub backup: bool,
    /// Do not create the folder if it is missing.
    pub dont_create: bool,
    #[skip]
    __: B6,
}

impl BinRead for SetPathFlags {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let byte = u8::read_options(reader, Endian::Big, ())?;
        Ok(SetPathFlags::from_bytes([byte]))
    }
}

impl BinWrite for SetPathFlags {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        self.into_bytes()[0].write_options(writer, Endian::Big, ())
    }
}

/// Fixed fields of a SETPATH request; the constants byte is reserved zero.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetPathFields {
    pub flags: SetPathFlags,
    #[bw(calc = 0)]
    #[br(temp)]
    _constants: u8,
}

/// A parsed response packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePacket {
    pub code: ResponseCode,
    /// Present on CONNECT replies that carry the negotiation fields.
    pub connect: Option<ConnectFields>,
    pub headers: Vec<Header>,
}

impl ResponsePacket {
    /// Parses one whole response packet. `connect_reply` selects the CONNECT
    /// layout, whose negotiation fields sit between the prefix and the
    /// headers; some servers omit them on failure replies, so they are only
    /// consumed when present.
    pub fn parse(buf: &[u8], connect_reply: bool) -> crate::Result<ResponsePacket> {
        let mut cursor = binrw::io::Cursor::new(buf);
        let raw_code = u8::read_options(&mut cursor, Endian::Big, ())?;
        let code = ResponseCode::try_from(raw_code)?;
        let declared = u16::read_options(&mut cursor, Endian::Big, ())?;
        if declared as usize != buf.len() {
            return Err(ObexMsgError::LengthMismatch {
                declared,
                actual: buf.len(),
            });
        }

        let remaining = buf.len() - cursor.position() as usize;
        let connect = if connect_reply && remaining >= 4 {
            Some(ConnectFields::read(&mut cursor)?)
        } else {
            None
        };

        let mut headers = Vec::new();
        while (cursor.position() as usize) < buf.len() {
            headers.push(Header::read_options(&mut cursor, Endian::Big, ())?);
        }

        Ok(ResponsePacket {
            code,
            connect,
            headers,
        })
    }

    /// Total packet length announced by a prefix.
    pub fn declared_len(prefix: &[u8; PACKET_PREFIX_LEN]) -> usize {
        u16::from_be_bytes([prefix[1], prefix[2]]) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obex_tests::decode_hex;

    #[test]
    fn test_response_code_wire_values() {
        assert_eq!(ResponseCode::try_from(0xA0).unwrap(), ResponseCode::Success);
        assert_eq!(
            ResponseCode::try_from(0xC3).unwrap(),
            ResponseCode::Forbidden
        );
        assert!(ResponseCode::try_from(0x12).is_err());
        assert!(ResponseCode::Continue.is_continue());
        assert!(!ResponseCode::Created.is_success());
    }

    #[test]
    fn test_parse_connect_success() {
        let packet = ResponsePacket::parse(
            &decode_hex("a0 000c 10 00 2000 cb 00000001"),
            true,
        )
        .unwrap();
        assert_eq!(packet.code, ResponseCode::Success);
        assert_eq!(
            packet.connect,
            Some(ConnectFields {
                version: 0x10,
                flags: 0,
                max_packet_size: 0x2000,
            })
        );
        assert_eq!(packet.headers, vec![Header::ConnectionId(1)]);
    }

    #[test]
    fn test_parse_plain_with_body() {
        let packet =
            ResponsePacket::parse(&decode_hex("a0 0009 49 0006 414243"), false).unwrap();
        assert_eq!(packet.code, ResponseCode::Success);
        assert_eq!(packet.headers, vec![Header::EndOfBody(b"ABC".to_vec())]);
    }

    #[test]
    fn test_parse_length_mismatch() {
        assert!(matches!(
            ResponsePacket::parse(&decode_hex("a0 0009 49 0006 41"), false),
            Err(ObexMsgError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_bare_failure_connect_reply() {
        // A forbidden CONNECT reply without negotiation fields.
        let packet = ResponsePacket::parse(&decode_hex("c3 0003"), true).unwrap();
        assert_eq!(packet.code, ResponseCode::Forbidden);
        assert_eq!(packet.connect, None);
        assert!(packet.headers.is_empty());
    }
}
