//! Bluetooth discovery: device inquiry and SDP service browsing.
//!
//! Discovery is best-effort and independent of the session engine; it hands
//! back an address and an RFCOMM channel for the transport layer to dial.

pub mod hci;
pub mod sdp;
mod sock;

use uuid::Uuid;

use obex_transport::BdAddr;

use crate::Result;

pub use hci::{RouteResolver, default_route, inquiry, inquiry_with};
pub use sdp::{DataElement, SdpSession};

/// Short-form conversions against the Bluetooth base UUID.
pub trait UuidExt {
    /// 32-bit short form of Bluetooth UUID.
    fn as_u32(&self) -> Option<u32>;
    /// 16-bit short form of Bluetooth UUID.
    fn as_u16(&self) -> Option<u16>;
    /// Long form of 32-bit short form Bluetooth UUID.
    fn from_u32(v: u32) -> Uuid;
    /// Long form of 16-bit short form Bluetooth UUID.
    fn from_u16(v: u16) -> Uuid;
}

const BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;
const BASE_MASK_32: u128 = 0x00000000_ffff_ffff_ffff_ffffffffffff;
const BASE_MASK_16: u128 = 0xffff0000_ffff_ffff_ffff_ffffffffffff;

impl UuidExt for Uuid {
    fn as_u32(&self) -> Option<u32> {
        let value = self.as_u128();
        if value & BASE_MASK_32 == BASE_UUID {
            Some((value >> 96) as u32)
        } else {
            None
        }
    }

    fn as_u16(&self) -> Option<u16> {
        let value = self.as_u128();
        if value & BASE_MASK_16 == BASE_UUID {
            Some((value >> 96) as u16)
        } else {
            None
        }
    }

    fn from_u32(v: u32) -> Uuid {
        Uuid::from_u128(BASE_UUID | ((v as u128) << 96))
    }

    fn from_u16(v: u16) -> Uuid {
        Uuid::from_u128(BASE_UUID | ((v as u128) << 96))
    }
}

/// Nokia PC Suite file-transfer service, preferred over plain FTP on
/// Series 60 devices.
pub const PCSUITE_UUID: Uuid = Uuid::from_u128(0x00005005_0000_1000_8000_0002ee000001);

/// The OBEX service classes this client dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    IrmcSync,
    ObjectPush,
    FileTransfer,
}

impl ServiceClass {
    pub const IRMC_SYNC: u16 = 0x1104;
    pub const OBJECT_PUSH: u16 = 0x1105;
    pub const FILE_TRANSFER: u16 = 0x1106;

    /// Maps a raw service-class value; anything outside the profile set is
    /// coerced to File Transfer.
    pub fn from_u16(value: u16) -> ServiceClass {
        match value {
            Self::IRMC_SYNC => ServiceClass::IrmcSync,
            Self::OBJECT_PUSH => ServiceClass::ObjectPush,
            _ => ServiceClass::FileTransfer,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            ServiceClass::IrmcSync => Self::IRMC_SYNC,
            ServiceClass::ObjectPush => Self::OBJECT_PUSH,
            ServiceClass::FileTransfer => Self::FILE_TRANSFER,
        }
    }

    pub fn uuid(self) -> Uuid {
        Uuid::from_u16(self.code())
    }
}

/// Optional local-adapter selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterHint {
    /// The adapter with this address.
    Address(BdAddr),
    /// A device index (`hci0`, `hci1`, ...).
    Index(u16),
    /// Whatever route is up.
    #[default]
    Any,
}

impl AdapterHint {
    /// Interprets a caller-supplied hint string: a 17-character address,
    /// else a numeric index, else any route.
    pub fn parse(src: Option<&str>) -> AdapterHint {
        let Some(src) = src else {
            return AdapterHint::Any;
        };
        if src.len() == 17 {
            if let Ok(addr) = src.parse::<BdAddr>() {
                return AdapterHint::Address(addr);
            }
        }
        match src.parse::<u16>() {
            Ok(index) => AdapterHint::Index(index),
            Err(_) => AdapterHint::Any,
        }
    }
}

/// A device found by inquiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: BdAddr,
    pub name: String,
}

/// The SDP lookup a browse runs against; a trait so the preference rule can
/// be exercised without a radio.
pub trait SdpBrowse {
    /// RFCOMM channel advertised for `uuid`, when any record carries one.
    fn channel_for_uuid(&mut self, uuid: &Uuid) -> Result<Option<u8>>;
}

/// Applies the service-preference rule on top of any [`SdpBrowse`]: a
/// File Transfer request first looks for the PC Suite service and only then
/// falls back to the well-known UUID.
pub fn resolve_channel<B: SdpBrowse>(browse: &mut B, class: ServiceClass) -> Result<Option<u8>> {
    if class == ServiceClass::FileTransfer {
        if let Some(channel) = browse.channel_for_uuid(&PCSUITE_UUID)? {
            return Ok(Some(channel));
        }
    }
    browse.channel_for_uuid(&class.uuid())
}

/// Browses `addr` for the requested service class and returns the RFCOMM
/// channel to dial, or `None` when the device does not offer it.
pub fn browse_channel(addr: BdAddr, class: ServiceClass) -> Result<Option<u8>> {
    let mut session = SdpSession::connect(addr)?;
    resolve_channel(&mut session, class)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockBrowse {
        pcsuite: Option<u8>,
        ftp: Option<u8>,
        queried: Vec<Uuid>,
    }

    impl SdpBrowse for MockBrowse {
        fn channel_for_uuid(&mut self, uuid: &Uuid) -> Result<Option<u8>> {
            self.queried.push(*uuid);
            if *uuid == PCSUITE_UUID {
                Ok(self.pcsuite)
            } else {
                Ok(self.ftp)
            }
        }
    }

    #[test]
    fn test_pcsuite_preferred_over_ftp() {
        let mut browse = MockBrowse {
            pcsuite: Some(10),
            ftp: Some(9),
            queried: Vec::new(),
        };
        let channel = resolve_channel(&mut browse, ServiceClass::FileTransfer).unwrap();
        assert_eq!(channel, Some(10));
        // The well-known UUID search never went out.
        assert_eq!(browse.queried, vec![PCSUITE_UUID]);
    }

    #[test]
    fn test_ftp_fallback_when_pcsuite_missing() {
        let mut browse = MockBrowse {
            pcsuite: None,
            ftp: Some(9),
            queried: Vec::new(),
        };
        let channel = resolve_channel(&mut browse, ServiceClass::FileTransfer).unwrap();
        assert_eq!(channel, Some(9));
        assert_eq!(
            browse.queried,
            vec![PCSUITE_UUID, ServiceClass::FileTransfer.uuid()]
        );
    }

    #[test]
    fn test_non_ftp_classes_skip_pcsuite() {
        let mut browse = MockBrowse {
            pcsuite: Some(10),
            ftp: Some(3),
            queried: Vec::new(),
        };
        let channel = resolve_channel(&mut browse, ServiceClass::ObjectPush).unwrap();
        assert_eq!(channel, Some(3));
        assert_eq!(browse.queried, vec![ServiceClass::ObjectPush.uuid()]);
    }

    #[test]
    fn test_unknown_class_coerces_to_file_transfer() {
        assert_eq!(ServiceClass::from_u16(0x1234), ServiceClass::FileTransfer);
        assert_eq!(ServiceClass::from_u16(0x1104), ServiceClass::IrmcSync);
        assert_eq!(ServiceClass::from_u16(0x1105), ServiceClass::ObjectPush);
        assert_eq!(ServiceClass::from_u16(0x1106), ServiceClass::FileTransfer);
    }

    #[test]
    fn test_short_uuid_round_trip() {
        let ftp = Uuid::from_u16(ServiceClass::FILE_TRANSFER);
        assert_eq!(ftp.as_u16(), Some(0x1106));
        assert_eq!(ftp.as_u32(), Some(0x1106));
        assert_eq!(PCSUITE_UUID.as_u16(), None);
    }

    #[test]
    fn test_adapter_hint_parsing() {
        assert_eq!(AdapterHint::parse(None), AdapterHint::Any);
        assert_eq!(AdapterHint::parse(Some("1")), AdapterHint::Index(1));
        assert_eq!(
            AdapterHint::parse(Some("00:11:22:33:44:55")),
            AdapterHint::Address("00:11:22:33:44:55".parse().unwrap())
        );
        assert_eq!(AdapterHint::parse(Some("bogus")), AdapterHint::Any);
    }
}
