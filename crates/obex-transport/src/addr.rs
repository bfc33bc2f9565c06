//! Bluetooth device address.

use std::fmt;
use std::str::FromStr;

use crate::TransportError;

/// A Bluetooth device address.
///
/// Stored in wire order (least-significant byte first, as `bdaddr_t` keeps
/// it); the textual `XX:XX:XX:XX:XX:XX` form reads most-significant first,
/// so parsing and display swap the byte order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    pub const ANY: BdAddr = BdAddr([0; 6]);

    /// Wire-order bytes, as sockets expect them.
    pub fn to_bytes(self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[5], self.0[4], self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TransportError::InvalidAddress(s.to_owned());
        if s.len() != 17 {
            return Err(invalid());
        }
        let mut addr = [0u8; 6];
        for (i, part) in s.split(':').enumerate() {
            if i >= 6 || part.len() != 2 {
                return Err(invalid());
            }
            addr[5 - i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(BdAddr(addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_display_round_trip() {
        let addr: BdAddr = "00:11:22:33:44:55".parse().unwrap();
        assert_eq!(addr.0, [0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("00:11:22:33:44".parse::<BdAddr>().is_err());
        assert!("00-11-22-33-44-55".parse::<BdAddr>().is_err());
        assert!("0g:11:22:33:44:55".parse::<BdAddr>().is_err());
    }
}
