//! Link transports for the OBEX client.
//!
//! The session engine talks to a [`Box<dyn ObexTransport>`]; this crate
//! provides the built-in links (IrDA, Bluetooth RFCOMM, loopback TCP) and
//! the [`make_transport`] selector. Serial-cable setups implement
//! [`ObexTransport`] themselves and hand the box to the session directly.

use std::time::Duration;

pub mod addr;
pub mod config;
pub mod error;
pub mod irda;
pub mod rfcomm;
mod sys;
pub mod tcp;
pub mod traits;

pub use addr::BdAddr;
pub use config::*;
pub use error::TransportError;
pub use irda::IrdaTransport;
pub use rfcomm::{RFCOMM_CHANNEL_MAX, RFCOMM_CHANNEL_MIN, RfcommTransport};
pub use tcp::{OBEX_TCP_PORT, TcpTransport};
pub use traits::*;

/// Creates an [`ObexTransport`] out of a [`TransportConfig`].
///
/// ## Arguments
/// * `transport` - The transport configuration to make the transport by.
/// * `io_timeout` - Send/connect timeout applied to the link.
pub fn make_transport(
    transport: &TransportConfig,
    io_timeout: Duration,
) -> Result<Box<dyn ObexTransport>, TransportError> {
    match transport {
        TransportConfig::Irda { service } => {
            Ok(Box::new(IrdaTransport::new(service.clone(), io_timeout)))
        }
        TransportConfig::Rfcomm { address, channel } => Ok(Box::new(RfcommTransport::new(
            *address, *channel, io_timeout,
        )?)),
        TransportConfig::Tcp { addr } => Ok(Box::new(TcpTransport::new(*addr, io_timeout))),
    }
}
