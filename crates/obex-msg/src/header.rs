//! OBEX header TLV codec.
//!
//! A header id encodes its value shape in the two top bits: `0b00` unicode
//! text with a length prefix, `0b01` a byte sequence with a length prefix,
//! `0b10` a single byte, `0b11` a big-endian quad. Length prefixes count the
//! id and length bytes themselves.

use std::io::{Read, Seek, Write};

use binrw::{Endian, prelude::*};

use crate::binrw_util::{AsciiZ, UnicodeName};

/// Header identifiers used by the file-transfer profile.
pub mod header_id {
    pub const NAME: u8 = 0x01;
    pub const TYPE: u8 = 0x42;
    pub const TARGET: u8 = 0x46;
    pub const BODY: u8 = 0x48;
    pub const END_OF_BODY: u8 = 0x49;
    pub const WHO: u8 = 0x4A;
    pub const APP_PARAMS: u8 = 0x4C;
    pub const LENGTH: u8 = 0xC3;
    pub const CONNECTION_ID: u8 = 0xCB;
}

/// Value shape of a header id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    Unicode,
    Bytes,
    Byte,
    Quad,
}

impl HeaderClass {
    pub fn of(id: u8) -> HeaderClass {
        match id >> 6 {
            0b00 => HeaderClass::Unicode,
            0b01 => HeaderClass::Bytes,
            0b10 => HeaderClass::Byte,
            _ => HeaderClass::Quad,
        }
    }
}

/// A single decoded OBEX header.
///
/// Headers the profile does not interpret are preserved as [`Header::Other`]
/// so response processing can skip them instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header {
    Name(UnicodeName),
    Type(AsciiZ),
    Length(u32),
    Target(Vec<u8>),
    Body(Vec<u8>),
    EndOfBody(Vec<u8>),
    Who(Vec<u8>),
    AppParams(Vec<u8>),
    ConnectionId(u32),
    Other(RawHeader),
}

/// An uninterpreted header, id plus shape-typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub id: u8,
    pub value: RawValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Unicode(Vec<u8>),
    Bytes(Vec<u8>),
    Byte(u8),
    Quad(u32),
}

impl Header {
    pub fn name(name: &str) -> Header {
        Header::Name(UnicodeName::from(name))
    }

    pub fn mime_type(ty: &str) -> Header {
        Header::Type(AsciiZ::from(ty))
    }

    pub fn id(&self) -> u8 {
        match self {
            Header::Name(_) => header_id::NAME,
            Header::Type(_) => header_id::TYPE,
            Header::Length(_) => header_id::LENGTH,
            Header::Target(_) => header_id::TARGET,
            Header::Body(_) => header_id::BODY,
            Header::EndOfBody(_) => header_id::END_OF_BODY,
            Header::Who(_) => header_id::WHO,
            Header::AppParams(_) => header_id::APP_PARAMS,
            Header::ConnectionId(_) => header_id::CONNECTION_ID,
            Header::Other(raw) => raw.id,
        }
    }

    /// Size of this header on the wire, id and length prefix included.
    pub fn encoded_len(&self) -> usize {
        match self.to_payload() {
            HeaderPayload::Sized(bytes) => 3 + bytes.len(),
            HeaderPayload::Byte(_) => 2,
            HeaderPayload::Quad(_) => 5,
        }
    }

    fn to_payload(&self) -> HeaderPayload {
        match self {
            Header::Name(name) => HeaderPayload::Sized(name.to_wire()),
            Header::Type(ty) => HeaderPayload::Sized(ty.to_wire()),
            Header::Length(len) => HeaderPayload::Quad(*len),
            Header::Target(b)
            | Header::Body(b)
            | Header::EndOfBody(b)
            | Header::Who(b)
            | Header::AppParams(b) => HeaderPayload::Sized(b.clone()),
            Header::ConnectionId(id) => HeaderPayload::Quad(*id),
            Header::Other(raw) => match &raw.value {
                RawValue::Unicode(b) | RawValue::Bytes(b) => HeaderPayload::Sized(b.clone()),
                RawValue::Byte(v) => HeaderPayload::Byte(*v),
                RawValue::Quad(v) => HeaderPayload::Quad(*v),
            },
        }
    }
}

enum HeaderPayload {
    Sized(Vec<u8>),
    Byte(u8),
    Quad(u32),
}

fn bad_value<T>(pos: u64, message: String) -> BinResult<T> {
    Err(binrw::Error::AssertFail { pos, message })
}

impl BinRead for Header {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let id = u8::read_options(reader, Endian::Big, ())?;
        use header_id::*;
        let header = match HeaderClass::of(id) {
            class @ (HeaderClass::Unicode | HeaderClass::Bytes) => {
                let declared = u16::read_options(reader, Endian::Big, ())?;
                if declared < 3 {
                    return bad_value(pos, format!("header {id:#04x} length {declared} below minimum"));
                }
                let mut payload = vec![0u8; declared as usize - 3];
                reader.read_exact(&mut payload)?;
                match id {
                    NAME => Header::Name(
                        UnicodeName::from_wire(&payload).or_else(|e| bad_value(pos, e))?,
                    ),
                    TYPE => {
                        Header::Type(AsciiZ::from_wire(&payload).or_else(|e| bad_value(pos, e))?)
                    }
                    TARGET => Header::Target(payload),
                    BODY => Header::Body(payload),
                    END_OF_BODY => Header::EndOfBody(payload),
                    WHO => Header::Who(payload),
                    APP_PARAMS => Header::AppParams(payload),
                    _ => Header::Other(RawHeader {
                        id,
                        value: match class {
                            HeaderClass::Unicode => RawValue::Unicode(payload),
                            _ => RawValue::Bytes(payload),
                        },
                    }),
                }
            }
            HeaderClass::Byte => {
                let value = u8::read_options(reader, Endian::Big, ())?;
                Header::Other(RawHeader {
                    id,
                    value: RawValue::Byte(value),
                })
            }
            HeaderClass::Quad => {
                let value = u32::read_options(reader, Endian::Big, ())?;
                match id {
                    LENGTH => Header::Length(value),
                    CONNECTION_ID => Header::ConnectionId(value),
                    _ => Header::Other(RawHeader {
                        id,
                        value: RawValue::Quad(value),
                    }),
                }
            }
        };
        Ok(header)
    }
}

impl BinWrite for Header {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        _: Endian,
        _: Self::Args<'_>,
    ) -> BinResult<()> {
        let pos = writer.stream_position()?;
        self.id().write_options(writer, Endian::Big, ())?;
        match self.to_payload() {
            HeaderPayload::Sized(bytes) => {
                let total = bytes.len() + 3;
                let declared: u16 = match total.try_into() {
                    Ok(v) => v,
                    Err(_) => {
                        return bad_value(pos, format!("header payload of {total} bytes too long"));
                    }
                };
                declared.write_options(writer, Endian::Big, ())?;
                writer.write_all(&bytes)?;
            }
            HeaderPayload::Byte(value) => value.write_options(writer, Endian::Big, ())?,
            HeaderPayload::Quad(value) => value.write_options(writer, Endian::Big, ())?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obex_tests::*;

    test_codec! {
        Header => name: Header::name("a.mp3") => "01 000f 0061002e006d00700033 0000"
    }

    test_codec! {
        Header => name_empty: Header::name("") => "01 0003"
    }

    test_codec! {
        Header => folder_listing_type:
            Header::mime_type("x-obex/folder-listing") =>
            "42 0019 782d6f6265782f666f6c6465722d6c697374696e67 00"
    }

    test_codec! {
        Header => length: Header::Length(4096) => "c3 00001000"
    }

    test_codec! {
        Header => connection_id: Header::ConnectionId(1) => "cb 00000001"
    }

    test_codec! {
        Header => body: Header::Body(b"abc".to_vec()) => "48 0006 616263"
    }

    test_codec! {
        Header => end_of_body_empty: Header::EndOfBody(Vec::new()) => "49 0003"
    }

    test_codec! {
        Header => unknown_quad:
            Header::Other(RawHeader { id: 0xCF, value: RawValue::Quad(7) }) =>
            "cf 00000007"
    }

    #[test]
    fn test_short_declared_length_rejected() {
        use binrw::BinRead;
        let bytes = decode_hex("48 0002");
        let mut cursor = binrw::io::Cursor::new(&bytes);
        assert!(Header::read_options(&mut cursor, binrw::Endian::Big, ()).is_err());
    }
}
