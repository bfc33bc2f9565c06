//! Bluetooth RFCOMM stream transport.

use std::os::fd::RawFd;
use std::time::Duration;

use crate::sys::{FdGuard, set_cloexec, set_io_timeouts, syscall, wait_readable};
use crate::{BdAddr, ObexTransport, TransportError};

const BTPROTO_RFCOMM: libc::c_int = 3;

pub const RFCOMM_CHANNEL_MIN: u8 = 1;
pub const RFCOMM_CHANNEL_MAX: u8 = 30;

#[repr(C)]
struct SockAddrRc {
    rc_family: libc::sa_family_t,
    rc_bdaddr: [u8; 6],
    rc_channel: u8,
}

/// RFCOMM client socket to `address:channel`.
pub struct RfcommTransport {
    address: BdAddr,
    channel: u8,
    io_timeout: Duration,
    fd: Option<RawFd>,
}

impl RfcommTransport {
    pub fn new(
        address: BdAddr,
        channel: u8,
        io_timeout: Duration,
    ) -> Result<RfcommTransport, TransportError> {
        if !(RFCOMM_CHANNEL_MIN..=RFCOMM_CHANNEL_MAX).contains(&channel) {
            return Err(TransportError::InvalidChannel(channel));
        }
        Ok(RfcommTransport {
            address,
            channel,
            io_timeout,
            fd: None,
        })
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
}

impl ObexTransport for RfcommTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        log::debug!(
            "opening RFCOMM socket to {} channel {}",
            self.address,
            self.channel
        );

        let fd = syscall!(socket(libc::AF_BLUETOOTH, libc::SOCK_STREAM, BTPROTO_RFCOMM))?;
        let guard = FdGuard(fd);
        set_cloexec(fd)?;

        let addr = SockAddrRc {
            rc_family: libc::AF_BLUETOOTH as libc::sa_family_t,
            rc_bdaddr: self.address.to_bytes(),
            rc_channel: self.channel,
        };
        syscall!(connect(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            std::mem::size_of::<SockAddrRc>() as libc::socklen_t,
        ))?;
        set_io_timeouts(fd, self.io_timeout)?;

        self.fd = Some(guard.release());
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(fd) = self.fd {
            // Shutdown failures are uninteresting on teardown.
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

impl Drop for RfcommTransport {
    fn drop(&mut self) {
        self.close_fd();
    }
}
