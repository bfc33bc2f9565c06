//! IrDA (IrLAP/IrLMP) stream transport.
//!
//! Peer discovery runs through the `IRLMP_ENUMDEVICES` socket option; the
//! first discovered device is dialed. The IAS service name defaults to
//! `"OBEX"`; when that LSAP cannot be reached, one retry goes out with the
//! default LSAP (empty service name).

use std::os::fd::RawFd;
use std::time::Duration;

use crate::sys::{FdGuard, set_cloexec, set_io_timeouts, syscall, wait_readable};
use crate::{ObexTransport, TransportError};

const AF_IRDA: libc::c_int = 23;
const SOL_IRLMP: libc::c_int = 266;
const IRLMP_ENUMDEVICES: libc::c_int = 1;
const LSAP_ANY: u8 = 0xFF;

const DISCOVER_MAX_DEVICES: usize = 10;
const SERVICE_NAME_LEN: usize = 25;

#[repr(C)]
#[derive(Clone, Copy)]
struct IrdaDeviceInfo {
    saddr: u32,
    daddr: u32,
    info: [u8; 22],
    charset: u8,
    hints: [u8; 2],
}

#[repr(C)]
struct IrdaDeviceList {
    len: u32,
    dev: [IrdaDeviceInfo; DISCOVER_MAX_DEVICES],
}

#[repr(C)]
struct SockAddrIrda {
    sir_family: libc::sa_family_t,
    sir_lsap_sel: u8,
    sir_addr: u32,
    sir_name: [u8; SERVICE_NAME_LEN],
}

/// IrDA client socket to the first discovered peer.
pub struct IrdaTransport {
    service: String,
    io_timeout: Duration,
    fd: Option<RawFd>,
}

impl IrdaTransport {
    pub fn new(service: impl Into<String>, io_timeout: Duration) -> IrdaTransport {
        IrdaTransport {
            service: service.into(),
            io_timeout,
            fd: None,
        }
    }

    fn fd(&self) -> Result<RawFd, TransportError> {
        self.fd.ok_or(TransportError::NotConnected)
    }

    fn close_fd(&mut self) {
        if let Some(fd) = self.fd.take() {
            unsafe {
                libc::close(fd);
            }
        }
    }

    /// Runs IrLMP discovery on the socket and returns the first peer's
    /// device address.
    fn discover_peer(fd: RawFd) -> Result<u32, TransportError> {
        let mut list: IrdaDeviceList = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<IrdaDeviceList>() as libc::socklen_t;
        syscall!(getsockopt(
            fd,
            SOL_IRLMP,
            IRLMP_ENUMDEVICES,
            &mut list as *mut _ as *mut libc::c_void,
            &mut len,
        ))?;
        if list.len == 0 {
            return Err(TransportError::NoPeer);
        }
        let peer = &list.dev[0];
        let name_end = peer.info.iter().position(|&b| b == 0).unwrap_or(peer.info.len());
        log::debug!(
            "IrDA peer {:#010x} ({})",
            peer.daddr,
            String::from_utf8_lossy(&peer.info[..name_end])
        );
        Ok(peer.daddr)
    }

    fn try_connect(fd: RawFd, daddr: u32, service: &str) -> Result<(), TransportError> {
        let mut addr = SockAddrIrda {
            sir_family: AF_IRDA as libc::sa_family_t,
            sir_lsap_sel: LSAP_ANY,
            sir_addr: daddr,
            sir_name: [0; SERVICE_NAME_LEN],
        };
        let name = service.as_bytes();
        // Leave room for the NUL terminator.
        let copy = name.len().min(SERVICE_NAME_LEN - 1);
        addr.sir_name[..copy].copy_from_slice(&name[..copy]);

        syscall!(connect(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<SockAddrIrda>() as libc::socklen_t,
        ))?;
        Ok(())
    }
}

impl ObexTransport for IrdaTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let fd = syscall!(socket(AF_IRDA, libc::SOCK_STREAM, 0))?;
        let guard = FdGuard(fd);
        set_cloexec(fd)?;

        let daddr = Self::discover_peer(fd)?;

        if let Err(err) = Self::try_connect(fd, daddr, &self.service) {
            log::debug!(
                "IrDA connect to service {:?} failed ({err}), retrying default LSAP",
                self.service
            );
            Self::try_connect(fd, daddr, "")?;
        }
        set_io_timeouts(fd, self.io_timeout)?;

        self.fd = Some(guard.release());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(fd) = self.fd {
            unsafe {
                libc::shutdown(fd, libc::SHUT_RDWR);
            }
        }
        self.close_fd();
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let fd = self.fd()?;
        let mut sent = 0;
        while sent < buf.len() {
            let rest = &buf[sent..];
            let n = syscall!(send(
                fd,
                rest.as_ptr() as *const libc::c_void,
                rest.len(),
                libc::MSG_NOSIGNAL,
            ))?;
            sent += n as usize;
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let fd = self.fd()?;
        wait_readable(fd, timeout)?;
        let n = syscall!(recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0))?;
        Ok(n as usize)
    }
}

impl Drop for IrdaTransport {
    fn drop(&mut self) {
        self.close_fd();
    }
}
