//! Minimal raw-socket wrapper shared by the HCI and SDP sockets.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

/// Executes a libc call, mapping `-1` to the current OS error.
macro_rules! syscall {
    ($fn:ident ( $($arg:expr),* $(,)? ) ) => {{
        let res = unsafe { libc::$fn($($arg, )*) };
        if res == -1 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(res)
        }
    }};
}

pub(crate) use syscall;

/// An owned raw socket descriptor, closed on drop.
pub(crate) struct RawSocket {
    fd: RawFd,
}

impl RawSocket {
    pub fn new(domain: libc::c_int, ty: libc::c_int, proto: libc::c_int) -> io::Result<RawSocket> {
        let fd = syscall!(socket(domain, ty, proto))?;
        let sock = RawSocket { fd };
        syscall!(fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC))?;
        Ok(sock)
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// Binds to a `repr(C)` socket address struct.
    pub fn bind<A>(&self, addr: &A) -> io::Result<()> {
        syscall!(bind(
            self.fd,
            addr as *const A as *const libc::sockaddr,
            std::mem::size_of::<A>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    /// Connects to a `repr(C)` socket address struct.
    pub fn connect<A>(&self, addr: &A) -> io::Result<()> {
        syscall!(connect(
            self.fd,
            addr as *const A as *const libc::sockaddr,
            std::mem::size_of::<A>() as libc::socklen_t,
        ))
        .map(|_| ())
    }

    pub fn send(&self, buf: &[u8]) -> io::Result<usize> {
        syscall!(send(
            self.fd,
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
            libc::MSG_NOSIGNAL,
        ))
        .map(|n| n as usize)
    }

    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        syscall!(recv(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0))
            .map(|n| n as usize)
    }

    /// Waits for readability; `Ok(false)` on timeout. EINTR retries.
    pub fn wait_readable(&self, timeout: Duration) -> io::Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let timeout_ms = timeout.as_millis().min(i32::MAX as u128) as libc::c_int;
        loop {
            let n = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }
            return Ok(n > 0);
        }
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
