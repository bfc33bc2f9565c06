//! Shared raw-socket plumbing for the libc-based transports.

use std::io;
use std::os::fd::RawFd;
use std::time::Duration;

use crate::TransportError;

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

pub(crate) fn set_cloexec(fd: RawFd) -> io::Result<()> {
    syscall!(fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC)).map(|_| ())
}

/// Applies the given duration as both send and receive socket timeout.
pub(crate) fn set_io_timeouts(fd: RawFd, timeout: Duration) -> io::Result<()> {
    let tv = libc::timeval {
        tv_sec: timeout.as_secs() as libc::time_t,
        tv_usec: timeout.subsec_micros() as libc::suseconds_t,
    };
    for opt in [libc::SO_RCVTIMEO, libc::SO_SNDTIMEO] {
        syscall!(setsockopt(
            fd,
            libc::SOL_SOCKET,
            opt,
            &tv as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::timeval>() as libc::socklen_t,
        ))?;
    }
    Ok(())
}

/// Closes the descriptor unless released, so connect errors do not leak it.
pub(crate) struct FdGuard(pub(crate) RawFd);

impl FdGuard {
    pub(crate) fn release(self) -> RawFd {
        let fd = self.0;
        std::mem::forget(self);
        fd
    }
}

impl Drop for FdGuard {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

/// Waits for the descriptor to become readable.
///
/// `Err(TimedOut)` when nothing arrived in time; EINTR retries.
pub(crate) fn wait_readable(fd: RawFd, timeout: Duration) -> Result<(), TransportError> {
    let mut pfd = libc::pollfd {
        fd,
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
            return Err(err.into());
        }
        if n == 0 {
            return Err(TransportError::TimedOut);
        }
        return Ok(());
    }
}
