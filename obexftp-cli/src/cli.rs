use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use obexftp::discovery::{self, ServiceClass};
use obexftp::transport::{BdAddr, TransportConfig};

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Connects over Bluetooth RFCOMM to this device address.
    #[arg(short, long, value_name = "ADDR")]
    pub bluetooth: Option<BdAddr>,

    /// RFCOMM channel; looked up over SDP when omitted.
    #[arg(short, long)]
    pub channel: Option<u8>,

    /// Connects over IrDA. This is the default transport.
    #[arg(long)]
    pub irda: bool,

    /// Debug transport: TCP to the given address (e.g. 127.0.0.1:650).
    #[arg(long, value_name = "ADDR")]
    pub tcp: Option<SocketAddr>,

    /// Local Bluetooth adapter, as an address or an index.
    #[arg(long, value_name = "HINT")]
    pub src: Option<String>,

    /// Link timeout in seconds.
    #[arg(short, long, default_value_t = 10)]
    pub timeout: u16,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lists a remote folder.
    List {
        /// Folder to list; the root when omitted.
        folder: Option<String>,
    },
    /// Fetches a file.
    Get {
        /// Remote name, slash-separated.
        remote: String,
        /// Local destination; the remote base name when omitted.
        local: Option<PathBuf>,
    },
    /// Sends files or whole directories.
    Put {
        /// Local files or directories.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Deletes a remote file.
    Delete { name: String },
    /// Renames a remote file.
    Move { src: String, dst: String },
    /// Retrieves device memory info.
    Info,
    /// Scans for nearby Bluetooth devices.
    Scan,
    /// Looks up the OBEX file-transfer channel on a device.
    Browse { addr: BdAddr },
}

impl Cli {
    /// Picks the transport from the flags, running an SDP lookup when a
    /// Bluetooth target has no explicit channel.
    pub fn make_transport_config(&self) -> Result<TransportConfig, Box<dyn std::error::Error>> {
        if let Some(address) = self.bluetooth {
            let channel = match self.channel {
                Some(channel) => channel,
                None => discovery::browse_channel(address, ServiceClass::FileTransfer)?
                    .ok_or("no OBEX file-transfer service on the device")?,
            };
            return Ok(TransportConfig::Rfcomm { address, channel });
        }
        if let Some(addr) = self.tcp {
            return Ok(TransportConfig::Tcp { addr });
        }
        Ok(TransportConfig::default())
    }
}
