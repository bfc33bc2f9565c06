//! Value types for the two string-shaped OBEX header payloads.

/// OBEX unicode text: UTF-16BE with a trailing NUL character.
///
/// An empty string encodes as zero payload bytes, terminator included; this
/// is how empty NAME headers appear on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnicodeName(String);

impl UnicodeName {
    pub fn new(s: impl Into<String>) -> Self {
        UnicodeName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Payload bytes: UTF-16BE code units followed by a NUL terminator,
    /// or nothing at all for the empty string.
    pub fn to_wire(&self) -> Vec<u8> {
        if self.0.is_empty() {
            return Vec::new();
        }
        let mut out = Vec::with_capacity((self.0.len() + 1) * 2);
        for unit in self.0.encode_utf16() {
            out.extend_from_slice(&unit.to_be_bytes());
        }
        out.extend_from_slice(&[0, 0]);
        out
    }

    /// Decodes payload bytes written by [`UnicodeName::to_wire`].
    pub fn from_wire(bytes: &[u8]) -> Result<Self, String> {
        if bytes.is_empty() {
            return Ok(UnicodeName::default());
        }
        if bytes.len() % 2 != 0 {
            return Err(format!("odd unicode payload length {}", bytes.len()));
        }
        let mut units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if units.last() == Some(&0) {
            units.pop();
        }
        String::from_utf16(&units)
            .map(UnicodeName)
            .map_err(|e| e.to_string())
    }
}

impl From<&str> for UnicodeName {
    fn from(s: &str) -> Self {
        UnicodeName(s.to_owned())
    }
}

impl std::fmt::Display for UnicodeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// NUL-terminated single-byte text, used by the TYPE header
/// (e.g. `x-obex/folder-listing`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsciiZ(String);

impl AsciiZ {
    pub fn new(s: impl Into<String>) -> Self {
        AsciiZ(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut out = self.0.as_bytes().to_vec();
        out.push(0);
        out
    }

    pub fn from_wire(bytes: &[u8]) -> Result<Self, String> {
        let trimmed = match bytes.last() {
            Some(0) => &bytes[..bytes.len() - 1],
            _ => bytes,
        };
        std::str::from_utf8(trimmed)
            .map(|s| AsciiZ(s.to_owned()))
            .map_err(|e| e.to_string())
    }
}

impl From<&str> for AsciiZ {
    fn from(s: &str) -> Self {
        AsciiZ(s.to_owned())
    }
}

impl std::fmt::Display for AsciiZ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unicode_name_wire_shape() {
        let name = UnicodeName::from("pb.vcf");
        let wire = name.to_wire();
        assert_eq!(
            wire,
            obex_tests::decode_hex("00700062002e007600630066 0000")
        );
        assert_eq!(UnicodeName::from_wire(&wire).unwrap(), name);
    }

    #[test]
    fn test_unicode_name_empty() {
        assert!(UnicodeName::from("").to_wire().is_empty());
        assert_eq!(UnicodeName::from_wire(&[]).unwrap(), UnicodeName::default());
    }

    #[test]
    fn test_unicode_name_rejects_odd_length() {
        assert!(UnicodeName::from_wire(&[0x00, 0x61, 0x00]).is_err());
    }

    #[test]
    fn test_asciiz_terminator() {
        let ty = AsciiZ::from("x-obex/folder-listing");
        let wire = ty.to_wire();
        assert_eq!(wire.last(), Some(&0));
        assert_eq!(AsciiZ::from_wire(&wire).unwrap(), ty);
        // A peer that forgets the terminator is still accepted.
        assert_eq!(AsciiZ::from_wire(b"text/plain").unwrap().as_str(), "text/plain");
    }
}
