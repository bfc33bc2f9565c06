//! HCI device inquiry and remote-name lookup.
//!
//! Inquiry runs through the `HCIINQUIRY` ioctl on a raw HCI socket; remote
//! names are fetched with a Remote-Name-Request command and a short wait for
//! its completion event.

use std::io;
use std::time::Duration;

use obex_transport::BdAddr;

use super::sock::{RawSocket, syscall};
use super::{AdapterHint, DiscoveredDevice};
use crate::{Error, Result};

const BTPROTO_HCI: libc::c_int = 1;
const SOL_HCI: libc::c_int = 0;
const HCI_FILTER: libc::c_int = 2;

const HCI_COMMAND_PKT: u8 = 0x01;
const HCI_EVENT_PKT: u8 = 0x04;
const EVT_CMD_STATUS: u8 = 0x0F;
const EVT_REMOTE_NAME_REQ_COMPLETE: u8 = 0x07;

const OGF_LINK_CTL: u16 = 0x01;
const OCF_REMOTE_NAME_REQ: u16 = 0x0019;

// _IOR('H', nr, int)
const HCIGETDEVLIST: libc::c_ulong = 0x800448d2;
const HCIGETDEVINFO: libc::c_ulong = 0x800448d3;
const HCIINQUIRY: libc::c_ulong = 0x800448f0;

/// `HCI_UP` bit in the device flags.
const HCI_UP: u32 = 1 << 0;

/// General inquiry access code.
const GIAC_LAP: [u8; 3] = [0x33, 0x8b, 0x9e];
/// Only report devices currently in range.
const IREQ_CACHE_FLUSH: u16 = 0x0001;
/// Inquiry length in 1.28 s units, roughly a 10 s upper bound.
const INQUIRY_LENGTH: u8 = 8;
const INQUIRY_MAX_RSP: u8 = 10;

const NAME_TIMEOUT: Duration = Duration::from_millis(100);
const HCI_MAX_EVENT_SIZE: usize = 260;
const HCI_MAX_DEV: usize = 16;
const REMOTE_NAME_LEN: usize = 248;

#[repr(C)]
struct SockAddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct HciDevReq {
    dev_id: u16,
    dev_opt: u32,
}

#[repr(C)]
struct HciDevListReq {
    dev_num: u16,
    dev_req: [HciDevReq; HCI_MAX_DEV],
}

// Field layout mirrors struct hci_dev_info; only a few fields are read.
#[repr(C)]
#[allow(dead_code)]
struct HciDevInfo {
    dev_id: u16,
    name: [u8; 8],
    bdaddr: [u8; 6],
    flags: u32,
    dev_type: u8,
    features: [u8; 8],
    pkt_type: u32,
    link_policy: u32,
    link_mode: u32,
    acl_mtu: u16,
    acl_pkts: u16,
    sco_mtu: u16,
    sco_pkts: u16,
    stat: [u32; 10],
}

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct InquiryInfo {
    bdaddr: [u8; 6],
    pscan_rep_mode: u8,
    pscan_period_mode: u8,
    pscan_mode: u8,
    dev_class: [u8; 3],
    clock_offset: u16,
}

#[repr(C)]
struct HciInquiryReq {
    dev_id: u16,
    flags: u16,
    lap: [u8; 3],
    length: u8,
    num_rsp: u8,
}

#[repr(C)]
struct HciInquiryBuf {
    req: HciInquiryReq,
    info: [InquiryInfo; INQUIRY_MAX_RSP as usize],
}

#[repr(C)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

/// Resolves an adapter hint to an HCI device id.
///
/// Injected into the inquiry entry point so the logic above it can run
/// without Bluetooth hardware.
pub type RouteResolver = fn(&AdapterHint) -> Result<u16>;

/// The stock resolver: index hints pass through, address hints are matched
/// against the local adapters, and `Any` picks the first adapter that is up.
pub fn default_route(hint: &AdapterHint) -> Result<u16> {
    match hint {
        AdapterHint::Index(idx) => Ok(*idx),
        AdapterHint::Address(addr) => {
            scan_devices(|info| (BdAddr(info.bdaddr) == *addr).then_some(info.dev_id))?
                .ok_or_else(|| Error::Discovery(format!("no adapter with address {addr}")))
        }
        AdapterHint::Any => scan_devices(|info| (info.flags & HCI_UP != 0).then_some(info.dev_id))?
            .ok_or_else(|| Error::Discovery("no Bluetooth adapter is up".into())),
    }
}

fn scan_devices<F: FnMut(&HciDevInfo) -> Option<u16>>(mut pick: F) -> Result<Option<u16>> {
    let control = HciSocket::control()?;
    let mut list: HciDevListReq = unsafe { std::mem::zeroed() };
    list.dev_num = HCI_MAX_DEV as u16;
    syscall!(ioctl(control.sock.fd(), HCIGETDEVLIST, &mut list as *mut _))?;

    for req in &list.dev_req[..(list.dev_num as usize).min(HCI_MAX_DEV)] {
        let mut info: HciDevInfo = unsafe { std::mem::zeroed() };
        info.dev_id = req.dev_id;
        if syscall!(ioctl(control.sock.fd(), HCIGETDEVINFO, &mut info as *mut _)).is_err() {
            continue;
        }
        if let Some(id) = pick(&info) {
            return Ok(Some(id));
        }
    }
    Ok(None)
}

/// Cache-flushing inquiry for nearby devices, reading each remote name with
/// a short timeout. Inquiry failure yields an error, never partial data.
pub fn inquiry(hint: &AdapterHint) -> Result<Vec<DiscoveredDevice>> {
    inquiry_with(hint, default_route)
}

pub fn inquiry_with(hint: &AdapterHint, route: RouteResolver) -> Result<Vec<DiscoveredDevice>> {
    let dev_id = route(hint)?;
    log::debug!("scanning on hci{dev_id}");

    let control = HciSocket::control()?;
    let mut buf = HciInquiryBuf {
        req: HciInquiryReq {
            dev_id,
            flags: IREQ_CACHE_FLUSH,
            lap: GIAC_LAP,
            length: INQUIRY_LENGTH,
            num_rsp: INQUIRY_MAX_RSP,
        },
        info: [InquiryInfo {
            bdaddr: [0; 6],
            pscan_rep_mode: 0,
            pscan_period_mode: 0,
            pscan_mode: 0,
            dev_class: [0; 3],
            clock_offset: 0,
        }; INQUIRY_MAX_RSP as usize],
    };
    syscall!(ioctl(control.sock.fd(), HCIINQUIRY, &mut buf as *mut _))?;

    let count = (buf.req.num_rsp as usize).min(INQUIRY_MAX_RSP as usize);
    let dev = HciSocket::open(dev_id)?;

    let mut found = Vec::with_capacity(count);
    for info in &buf.info[..count] {
        let address = BdAddr(info.bdaddr);
        let name = dev
            .remote_name(info)
            .unwrap_or_else(|| "No Name".to_owned());
        log::debug!("found {address} ({name})");
        found.push(DiscoveredDevice { address, name });
    }
    Ok(found)
}

struct HciSocket {
    sock: RawSocket,
}

impl HciSocket {
    /// Unbound socket, good enough for the control ioctls.
    fn control() -> Result<HciSocket> {
        let sock = RawSocket::new(libc::AF_BLUETOOTH, libc::SOCK_RAW, BTPROTO_HCI)
            .map_err(Error::Io)?;
        Ok(HciSocket { sock })
    }

    /// Socket bound to one adapter, for command/event exchange.
    fn open(dev_id: u16) -> Result<HciSocket> {
        let this = HciSocket::control()?;
        let addr = SockAddrHci {
            hci_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: 0,
        };
        this.sock.bind(&addr).map_err(Error::Io)?;
        Ok(this)
    }

    fn set_filter(&self, events: &[u8], opcode: u16) -> io::Result<()> {
        let mut filter = HciFilter {
            type_mask: 1 << HCI_EVENT_PKT,
            event_mask: [0; 2],
            opcode,
        };
        for &event in events {
            filter.event_mask[(event >> 5) as usize] |= 1 << (event & 31);
        }
        syscall!(setsockopt(
            self.sock.fd(),
            SOL_HCI,
            HCI_FILTER,
            &filter as *const _ as *const libc::c_void,
            std::mem::size_of::<HciFilter>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    fn send_cmd(&self, ogf: u16, ocf: u16, param: &[u8]) -> io::Result<()> {
        let opcode = (ocf & 0x03ff) | (ogf << 10);
        let mut packet = Vec::with_capacity(4 + param.len());
        packet.push(HCI_COMMAND_PKT);
        packet.extend_from_slice(&opcode.to_le_bytes());
        packet.push(param.len() as u8);
        packet.extend_from_slice(param);
        self.sock.send(&packet).map(|_| ())
    }

    /// Remote-Name-Request round trip; `None` on timeout or refusal, which
    /// the caller renders as "No Name".
    fn remote_name(&self, info: &InquiryInfo) -> Option<String> {
        let opcode = (OCF_REMOTE_NAME_REQ & 0x03ff) | (OGF_LINK_CTL << 10);
        self.set_filter(&[EVT_REMOTE_NAME_REQ_COMPLETE, EVT_CMD_STATUS], opcode)
            .ok()?;

        let mut cmd = [0u8; 10];
        cmd[..6].copy_from_slice(&info.bdaddr);
        cmd[6] = 0x02; // page scan repetition mode R2
        self.send_cmd(OGF_LINK_CTL, OCF_REMOTE_NAME_REQ, &cmd).ok()?;

        let mut event = [0u8; HCI_MAX_EVENT_SIZE];
        loop {
            if !self.sock.wait_readable(NAME_TIMEOUT).ok()? {
                return None;
            }
            let n = self.sock.recv(&mut event).ok()?;
            if n < 3 || event[0] != HCI_EVENT_PKT {
                continue;
            }
            match event[1] {
                EVT_REMOTE_NAME_REQ_COMPLETE => {
                    // status | bdaddr | name[248]
                    let params = &event[3..n];
                    if params.len() < 7 || params[0] != 0 || params[1..7] != info.bdaddr {
                        return None;
                    }
                    let name = &params[7..params.len().min(7 + REMOTE_NAME_LEN)];
                    let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
                    return Some(String::from_utf8_lossy(&name[..end]).into_owned());
                }
                EVT_CMD_STATUS => {
                    // status | ncmd | opcode
                    let params = &event[3..n];
                    if params.len() >= 4
                        && params[0] != 0
                        && u16::from_le_bytes([params[2], params[3]]) == opcode
                    {
                        return None;
                    }
                }
                _ => {}
            }
        }
    }
}
