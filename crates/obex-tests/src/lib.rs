//! Hex round-trip helpers for wire-model tests.
//!
//! OBEX is big-endian on the wire, so every macro here reads and writes with
//! [`binrw::Endian::Big`]. Only meant to be used from `#[cfg(test)]` modules.

pub use hex;
pub use pastey;

/// Decodes a hex string, ignoring spaces so expected byte strings can be
/// grouped for readability.
pub fn decode_hex(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).expect("invalid hex literal in test")
}

/// Asserts that writing `$value` produces exactly the bytes of `$hex`.
#[macro_export]
macro_rules! test_codec_write {
    ($ty:ty => $name:ident: $value:expr => $hex:expr) => {
        $crate::pastey::paste! {
            #[test]
            fn [<test_ $name:snake _write>]() {
                use ::binrw::BinWrite;
                let value: $ty = $value;
                let mut cursor = ::binrw::io::Cursor::new(Vec::new());
                value
                    .write_options(&mut cursor, ::binrw::Endian::Big, ())
                    .unwrap();
                assert_eq!(
                    $crate::hex::encode(cursor.into_inner()),
                    $crate::hex::encode($crate::decode_hex($hex)),
                );
            }
        }
    };
}

/// Asserts that reading the bytes of `$hex` yields exactly `$value`.
#[macro_export]
macro_rules! test_codec_read {
    ($ty:ty => $name:ident: $value:expr => $hex:expr) => {
        $crate::pastey::paste! {
            #[test]
            fn [<test_ $name:snake _read>]() {
                use ::binrw::BinRead;
                let bytes = $crate::decode_hex($hex);
                let mut cursor = ::binrw::io::Cursor::new(&bytes);
                let parsed = <$ty>::read_options(&mut cursor, ::binrw::Endian::Big, ())
                    .unwrap();
                assert_eq!(parsed, $value);
                assert_eq!(
                    cursor.position() as usize,
                    bytes.len(),
                    "reader did not consume the whole input"
                );
            }
        }
    };
}

/// Write and read round-trip against a single hex string.
#[macro_export]
macro_rules! test_codec {
    ($ty:ty => $name:ident: $value:expr => $hex:expr) => {
        $crate::test_codec_write! { $ty => $name: $value => $hex }
        $crate::test_codec_read! { $ty => $name: $value => $hex }
    };
}
