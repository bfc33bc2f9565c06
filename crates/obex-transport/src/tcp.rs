//! TCP transport for loopback debugging.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::{ObexTransport, TransportError};

/// IANA-registered OBEX-over-TCP port.
pub const OBEX_TCP_PORT: u16 = 650;

/// Plain TCP client link, used to debug against a software OBEX server.
pub struct TcpTransport {
    addr: SocketAddr,
    connect_timeout: Duration,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    pub fn new(addr: SocketAddr, connect_timeout: Duration) -> TcpTransport {
        TcpTransport {
            addr,
            connect_timeout,
            stream: None,
        }
    }

    fn stream(&mut self) -> Result<&mut TcpStream, TransportError> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }
}

impl ObexTransport for TcpTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        log::debug!("connecting TCP transport to {}", self.addr);
        let stream = TcpStream::connect_timeout(&self.addr, self.connect_timeout)?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        self.stream()?.write_all(buf)?;
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let stream = self.stream()?;
        stream.set_read_timeout(Some(timeout))?;
        match stream.read(buf) {
            Ok(n) => Ok(n),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(TransportError::TimedOut)
            }
            Err(e) => Err(e.into()),
        }
    }
}
