//! Session state and the request event loop.
//!
//! One session drives one OBEX conversation over one transport. Requests are
//! strictly serialized: every public operation submits a request object and
//! pumps the link until the request completes or the link dies.

use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use obex_msg::{
    DEFAULT_MAX_PACKET, Header, MINIMUM_MAX_PACKET, OpCode, PACKET_PREFIX_LEN, Request,
    ResponseCode, ResponsePacket,
};
use obex_transport::{ObexTransport, TransportError};

use crate::apparam::InfoParam;
use crate::event::{Event, EventSink};
use crate::{Error, Result};

/// How long one pump waits for link bytes before giving control back. A
/// cancellation check would slot between pumps.
pub const PUMP_TIMEOUT: Duration = Duration::from_millis(20);

/// Bytes read from the outbound stream source per body chunk.
pub const STREAM_CHUNK: usize = 4096;

/// Packet prefix plus BODY header prefix, subtracted when sizing a chunk to
/// the peer's packet limit.
const BODY_OVERHEAD: usize = PACKET_PREFIX_LEN + 3;

/// Pump rounds spent waiting for the reply to an ABORT (about one second).
const ABORT_REPLY_ROUNDS: usize = 50;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub pump_timeout: Duration,
    pub chunk_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            pump_timeout: PUMP_TIMEOUT,
            chunk_size: STREAM_CHUNK,
        }
    }
}

/// Outcome of the request currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Pending,
    Done(ResponseCode),
    LinkError,
}

/// Inbound state accumulated while one request runs.
struct InFlight {
    connect_reply: bool,
    /// GET answers span packets; the client polls for each.
    polls: bool,
    /// Streamed PUT feeds a body chunk per continue.
    streaming: bool,
    body: Vec<u8>,
    headers: Vec<Header>,
}

/// One live OBEX client conversation.
pub struct Session {
    transport: Box<dyn ObexTransport>,
    sink: Box<dyn EventSink>,
    config: SessionConfig,

    /// Outbound stream source of the PUT in flight.
    source: Option<std::fs::File>,
    /// Where the next inbound body lands; in-memory when `None`.
    target_path: Option<PathBuf>,
    /// The next accumulated body gets a trailing NUL (folder listings).
    textual_body: bool,
    /// Body of the last in-memory receive.
    accumulator: Option<Vec<u8>>,

    completion: Completion,
    last_response: Option<ResponseCode>,
    connection_id: Option<u32>,
    peer_max_packet: u16,
}

impl Session {
    /// Creates a session over a transport. The link is untouched until
    /// [`connect`][Self::connect].
    pub fn open(transport: Box<dyn ObexTransport>, sink: Box<dyn EventSink>) -> Session {
        Session::open_with(SessionConfig::default(), transport, sink)
    }

    pub fn open_with(
        config: SessionConfig,
        transport: Box<dyn ObexTransport>,
        sink: Box<dyn EventSink>,
    ) -> Session {
        Session {
            transport,
            sink,
            config,
            source: None,
            target_path: None,
            textual_body: false,
            accumulator: None,
            completion: Completion::Done(ResponseCode::Success),
            last_response: None,
            connection_id: None,
            peer_max_packet: DEFAULT_MAX_PACKET,
        }
    }

    /// Closes the session, tearing the link down. Dropping does the same.
    pub fn close(mut self) -> Result<()> {
        self.transport.disconnect()?;
        Ok(())
    }

    /// Body buffer of the most recent in-memory receive.
    pub fn body(&self) -> Option<&[u8]> {
        self.accumulator.as_deref()
    }

    /// Response code of the last completed request.
    pub fn last_response(&self) -> Option<ResponseCode> {
        self.last_response
    }

    /// Connection id announced by the server on CONNECT, if any.
    pub fn connection_id(&self) -> Option<u32> {
        self.connection_id
    }

    pub(crate) fn emit(&mut self, event: Event<'_>) {
        self.sink.event(event);
    }

    pub(crate) fn transport_connect(&mut self) -> Result<()> {
        self.transport.connect().map_err(Error::from)
    }

    /// Emits the terminal OK/ERR event for an operation and hands its result
    /// through.
    pub(crate) fn finish_op(&mut self, result: Result<()>, tag: &str) -> Result<()> {
        match &result {
            Ok(()) => self.emit(Event::Ok(tag)),
            Err(_) => self.emit(Event::Err(tag)),
        }
        result
    }

    /// Points the next inbound body at a file, or at the in-memory
    /// accumulator when `local` is `None`.
    pub(crate) fn set_target(&mut self, local: Option<&Path>, textual: bool) {
        self.target_path = local.map(Path::to_path_buf);
        self.textual_body = textual;
    }

    pub(crate) fn set_source(&mut self, file: std::fs::File) {
        self.source = Some(file);
    }

    /// Submits one request object and runs the event loop to completion.
    pub(crate) fn run_request(&mut self, op: &'static str, request: Request) -> Result<()> {
        self.completion = Completion::Pending;
        let mut inflight = InFlight {
            connect_reply: request.is_connect(),
            polls: request.opcode == OpCode::GET.with_final(),
            streaming: request.opcode == OpCode::PUT && self.source.is_some(),
            body: Vec::new(),
            headers: Vec::new(),
        };

        let mut result = self.submit(&request);
        while result.is_ok() && self.completion == Completion::Pending {
            result = self.pump(&mut inflight);
        }

        // The outbound descriptor closes exactly once, completion or not.
        self.source = None;

        if let Err(err) = result {
            if self.completion == Completion::Pending {
                self.completion = Completion::LinkError;
            }
            self.target_path = None;
            return Err(err);
        }

        let code = match self.completion {
            Completion::Done(code) => code,
            Completion::Pending | Completion::LinkError => {
                unreachable!("event loop exits only on completion")
            }
        };
        self.last_response = Some(code);

        let drained = self.drain_response(inflight);
        self.target_path = None;
        drained?;

        if code.is_success() {
            Ok(())
        } else {
            log::debug!("{op} request answered with {code}");
            Err(Error::Request { op, code })
        }
    }

    fn submit(&mut self, request: &Request) -> Result<()> {
        let bytes = request.encode(self.peer_max_packet)?;
        log::trace!("submitting {} ({} bytes)", request.opcode, bytes.len());
        self.transport.send(&bytes).map_err(Error::from)
    }

    /// One step of the event loop: wait up to the pump timeout for a
    /// response packet and process it. Timeouts just hand control back.
    fn pump(&mut self, inflight: &mut InFlight) -> Result<()> {
        let packet = match self.read_packet(inflight.connect_reply) {
            Ok(packet) => packet,
            Err(Error::Transport(TransportError::TimedOut)) => return Ok(()),
            Err(err) => return Err(err),
        };
        self.process_packet(inflight, packet)
    }

    fn read_packet(&mut self, connect_reply: bool) -> Result<ResponsePacket> {
        let mut prefix = [0u8; PACKET_PREFIX_LEN];
        self.read_link(&mut prefix, true)?;
        let total = ResponsePacket::declared_len(&prefix);
        if total < PACKET_PREFIX_LEN {
            return Err(obex_msg::ObexMsgError::LengthMismatch {
                declared: total as u16,
                actual: PACKET_PREFIX_LEN,
            }
            .into());
        }

        let mut packet = prefix.to_vec();
        packet.resize(total, 0);
        self.read_link(&mut packet[PACKET_PREFIX_LEN..], false)?;
        Ok(ResponsePacket::parse(&packet, connect_reply)?)
    }

    /// Fills the whole buffer from the link. With `idle` set, a timeout
    /// before the first byte is reported; mid-packet timeouts keep waiting.
    fn read_link(&mut self, buf: &mut [u8], idle: bool) -> Result<()> {
        let mut got = 0;
        while got < buf.len() {
            match self.transport.recv(&mut buf[got..], self.config.pump_timeout) {
                Ok(0) => {
                    return Err(Error::Transport(TransportError::Io(
                        std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "link closed"),
                    )));
                }
                Ok(n) => got += n,
                Err(TransportError::TimedOut) if idle && got == 0 => {
                    return Err(Error::Transport(TransportError::TimedOut));
                }
                Err(TransportError::TimedOut) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn process_packet(&mut self, inflight: &mut InFlight, packet: ResponsePacket) -> Result<()> {
        let code = packet.code;

        if let Some(fields) = packet.connect {
            self.peer_max_packet = fields
                .max_packet_size
                .clamp(MINIMUM_MAX_PACKET, DEFAULT_MAX_PACKET);
            log::debug!(
                "peer speaks OBEX {:#04x}, max packet {}",
                fields.version,
                fields.max_packet_size
            );
        }

        for header in packet.headers {
            match header {
                Header::Body(chunk) | Header::EndOfBody(chunk) => {
                    inflight.body.extend_from_slice(&chunk)
                }
                other => inflight.headers.push(other),
            }
        }

        if code.is_continue() {
            self.emit(Event::Progress);
            if inflight.streaming {
                self.feed_stream()?;
            } else if inflight.polls {
                self.submit(&Request::get_poll())?;
            }
            return Ok(());
        }

        self.completion = Completion::Done(code);
        Ok(())
    }

    /// Stream-empty step of a streamed PUT: read one chunk from the source
    /// and push it out. End of file sends the final empty END-OF-BODY; a
    /// read error aborts the request explicitly and waits for the server's
    /// acknowledgement before surfacing the error.
    fn feed_stream(&mut self) -> Result<()> {
        let Some(source) = self.source.as_mut() else {
            return Ok(());
        };
        let limit = STREAM_CHUNK
            .min(self.config.chunk_size)
            .min(self.peer_max_packet as usize - BODY_OVERHEAD);
        let mut chunk = vec![0u8; limit];
        match source.read(&mut chunk) {
            Ok(0) => {
                self.source = None;
                self.submit(&Request::put_chunk(Vec::new(), true))
            }
            Ok(n) => {
                chunk.truncate(n);
                self.submit(&Request::put_chunk(chunk, false))
            }
            Err(err) => {
                self.source = None;
                log::warn!("stream source failed mid-transfer: {err}");
                self.submit(&Request::abort())?;
                self.await_abort_reply();
                Err(Error::Io(err))
            }
        }
    }

    /// Drains packets until the server answers the ABORT, leaving the link
    /// clean for the next request.
    fn await_abort_reply(&mut self) {
        for _ in 0..ABORT_REPLY_ROUNDS {
            match self.read_packet(false) {
                Ok(packet) if !packet.code.is_continue() => {
                    log::debug!("abort acknowledged with {}", packet.code);
                    return;
                }
                Ok(_) => {}
                Err(Error::Transport(TransportError::TimedOut)) => {}
                Err(_) => return,
            }
        }
        log::warn!("no reply to abort");
    }

    /// Routes the response headers, once, after the request completed.
    fn drain_response(&mut self, inflight: InFlight) -> Result<()> {
        for header in &inflight.headers {
            match header {
                Header::ConnectionId(id) => {
                    log::debug!("connection id {id}");
                    self.connection_id = Some(*id);
                }
                Header::Who(_) => log::debug!("sender identified"),
                Header::AppParams(bytes) => match InfoParam::decode(bytes) {
                    Some(param) => self.emit(Event::Info(param.value)),
                    None => log::debug!(
                        "application parameters of {} bytes don't fit the record",
                        bytes.len()
                    ),
                },
                other => log::trace!("skipped header {:#04x}", other.id()),
            }
        }

        if inflight.body.is_empty() {
            return Ok(());
        }
        self.emit(Event::Body(&inflight.body));

        if let Some(path) = self.target_path.take() {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o644)
                .open(&path)?;
            file.write_all(&inflight.body)?;
        } else {
            let mut content = inflight.body;
            if self.textual_body {
                content.push(0);
            }
            self.accumulator = Some(content);
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.transport.disconnect();
    }
}
