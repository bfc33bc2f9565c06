//! Transport selection.

use std::net::SocketAddr;

use crate::BdAddr;

/// IrDA IAS service name the client dials first.
pub const IRDA_SERVICE_OBEX: &str = "OBEX";

/// Which link to open for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// IrDA with the given IAS service name.
    Irda { service: String },
    /// Bluetooth RFCOMM to a device and channel (1..=30).
    Rfcomm { address: BdAddr, channel: u8 },
    /// TCP, for loopback debugging against a software OBEX server.
    Tcp { addr: SocketAddr },
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig::Irda {
            service: IRDA_SERVICE_OBEX.to_owned(),
        }
    }
}
