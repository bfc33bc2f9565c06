//! Application-parameter codec for the device-info exchange.
//!
//! The profile uses a single fixed shape: code, a length byte that is always
//! 4, and a big-endian 32-bit value. Anything else in an APPARAM header is
//! ignored.

use binrw::prelude::*;

/// Memory-in-use info opcode.
pub const INFO_MEMORY_USED: u8 = 0x01;
/// Free-memory info opcode.
pub const INFO_MEMORY_FREE: u8 = 0x02;

/// Encoded size of an [`InfoParam`].
pub const INFO_PARAM_LEN: usize = 6;

/// The 6-byte `code | len=4 | value` application-parameter record.
#[binrw]
#[brw(big)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoParam {
    pub code: u8,
    #[bw(calc = 4)]
    #[br(temp, assert(_value_len == 4))]
    _value_len: u8,
    pub value: u32,
}

impl InfoParam {
    pub fn new(code: u8, value: u32) -> InfoParam {
        InfoParam { code, value }
    }

    /// Strictly length-checked decode: anything that is not exactly the
    /// 6-byte record shape is `None`.
    pub fn decode(bytes: &[u8]) -> Option<InfoParam> {
        if bytes.len() != INFO_PARAM_LEN {
            return None;
        }
        InfoParam::read(&mut binrw::io::Cursor::new(bytes)).ok()
    }

    pub fn encode(&self) -> [u8; INFO_PARAM_LEN] {
        let mut cursor = binrw::io::Cursor::new([0u8; INFO_PARAM_LEN]);
        self.write(&mut cursor).expect("fixed-size record");
        cursor.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use obex_tests::decode_hex;

    #[test]
    fn test_decode_page_size() {
        let param = InfoParam::decode(&decode_hex("01 04 00001000")).unwrap();
        assert_eq!(param, InfoParam::new(0x01, 4096));
    }

    #[test]
    fn test_decode_rejects_wrong_sizes() {
        assert_eq!(InfoParam::decode(&decode_hex("01 04 000010")), None);
        assert_eq!(InfoParam::decode(&decode_hex("01 04 00001000 00")), None);
        assert_eq!(InfoParam::decode(&[]), None);
    }

    #[test]
    fn test_decode_rejects_wrong_value_length() {
        assert_eq!(InfoParam::decode(&decode_hex("01 03 00001000")), None);
    }

    #[test]
    fn test_encode_round_trip() {
        let param = InfoParam::new(INFO_MEMORY_FREE, 12345);
        assert_eq!(param.encode().to_vec(), decode_hex("02 04 00003039"));
        assert_eq!(InfoParam::decode(&param.encode()), Some(param));
    }
}
