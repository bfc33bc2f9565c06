//! Session engine tests against a scripted transport.

use std::collections::VecDeque;
use std::os::unix::fs::PermissionsExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use obex_transport::{ObexTransport, TransportError};
use obexftp::msg::{TARGET_FBS, TARGET_S45};
use obexftp::{Error, Event, EventSink, Session};

/// Transport that answers each sent request packet with the next scripted
/// response. When the script runs dry the link reads as closed.
#[derive(Default)]
struct ScriptInner {
    responses: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    pending: Vec<u8>,
}

#[derive(Clone, Default)]
struct Scripted(Arc<Mutex<ScriptInner>>);

impl Scripted {
    fn with_responses(responses: &[Vec<u8>]) -> Scripted {
        let scripted = Scripted::default();
        scripted.0.lock().unwrap().responses = responses.iter().cloned().collect();
        scripted
    }

    fn push_responses(&self, responses: &[Vec<u8>]) {
        self.0
            .lock()
            .unwrap()
            .responses
            .extend(responses.iter().cloned());
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().sent.clone()
    }
}

impl ObexTransport for Scripted {
    fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn send(&mut self, buf: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.0.lock().unwrap();
        inner.sent.push(buf.to_vec());
        if let Some(response) = inner.responses.pop_front() {
            inner.pending.extend(response);
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, TransportError> {
        let mut inner = self.0.lock().unwrap();
        if inner.pending.is_empty() {
            // Script exhausted: read as an orderly close instead of looping.
            return Ok(0);
        }
        let n = buf.len().min(inner.pending.len());
        buf[..n].copy_from_slice(&inner.pending[..n]);
        inner.pending.drain(..n);
        Ok(n)
    }
}

/// Sink that renders each event to a comparable string.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for Recorder {
    fn event(&mut self, event: Event<'_>) {
        let rendered = match event {
            Event::Connecting => "CONNECTING".to_owned(),
            Event::Disconnecting => "DISCONNECTING".to_owned(),
            Event::Ok(tag) => format!("OK({tag})"),
            Event::Err(tag) => format!("ERR({tag})"),
            Event::Sending(tag) => format!("SENDING({tag})"),
            Event::Receiving(tag) => format!("RECEIVING({tag})"),
            Event::Progress => "PROGRESS".to_owned(),
            Event::Body(bytes) => format!("BODY({})", bytes.len()),
            Event::Info(value) => format!("INFO({value})"),
        };
        self.0.lock().unwrap().push(rendered);
    }
}

fn packet(code: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![code];
    out.extend_from_slice(&((payload.len() + 3) as u16).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

fn header(id: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![id];
    out.extend_from_slice(&((value.len() + 3) as u16).to_be_bytes());
    out.extend_from_slice(value);
    out
}

fn connect_ok() -> Vec<u8> {
    packet(0xA0, &[0x10, 0x00, 0x20, 0x00])
}

fn success_with_end_of_body(body: &[u8]) -> Vec<u8> {
    packet(0xA0, &header(0x49, body))
}

fn continue_with_body(body: &[u8]) -> Vec<u8> {
    packet(0x90, &header(0x48, body))
}

fn session(scripted: &Scripted, recorder: &Recorder) -> Session {
    Session::open(Box::new(scripted.clone()), Box::new(recorder.clone()))
}

#[test]
fn test_happy_path_get_writes_target_file() {
    let scripted = Scripted::with_responses(&[
        connect_ok(),
        continue_with_body(b"BEGIN:"),
        success_with_end_of_body(b"VCARD"),
        packet(0xA0, &[]),
    ]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    let local = std::env::temp_dir().join(format!("obexftp-engine-{}.vcf", std::process::id()));

    session.connect().unwrap();
    session.get(Some(&local), "telecom/pb.vcf").unwrap();
    session.disconnect().unwrap();

    assert_eq!(
        recorder.events(),
        [
            "CONNECTING",
            "OK()",
            "RECEIVING(telecom/pb.vcf)",
            "PROGRESS",
            "BODY(11)",
            "OK(telecom/pb.vcf)",
            "DISCONNECTING",
            "OK()",
        ]
    );

    let written = std::fs::read(&local).unwrap();
    assert_eq!(written, b"BEGIN:VCARD");
    let mode = std::fs::metadata(&local).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o644);
    std::fs::remove_file(&local).unwrap();
}

#[test]
fn test_connect_falls_back_to_second_target() {
    let scripted = Scripted::with_responses(&[packet(0xC3, &[]), connect_ok()]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    session.connect().unwrap();

    assert_eq!(recorder.events(), ["CONNECTING", "ERR(UUID)", "OK()"]);
    let sent = scripted.sent();
    assert_eq!(sent.len(), 2);
    assert!(
        sent[0]
            .windows(TARGET_S45.len())
            .any(|w| w == TARGET_S45)
    );
    assert!(
        sent[1]
            .windows(TARGET_FBS.len())
            .any(|w| w == TARGET_FBS)
    );
}

#[test]
fn test_connect_failing_both_targets_errors() {
    let scripted = Scripted::with_responses(&[packet(0xC3, &[]), packet(0xC3, &[])]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    assert!(matches!(
        session.connect(),
        Err(Error::Request { op: "connect", .. })
    ));
    assert_eq!(
        recorder.events(),
        ["CONNECTING", "ERR(UUID)", "ERR(target)"]
    );
}

#[test]
fn test_info_decodes_apparam_value() {
    let scripted = Scripted::with_responses(&[packet(
        0xA0,
        &header(0x4C, &[0x01, 0x04, 0x00, 0x00, 0x30, 0x39]),
    )]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    session.info(0x01).unwrap();
    assert_eq!(
        recorder.events(),
        ["RECEIVING(info)", "INFO(12345)", "OK(info)"]
    );
}

#[test]
fn test_info_skips_wrong_sized_apparam() {
    let scripted = Scripted::with_responses(&[packet(
        0xA0,
        &header(0x4C, &[0x01, 0x04, 0x00, 0x00, 0x30]),
    )]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    session.info(0x01).unwrap();
    // No INFO event for a record that is not exactly six bytes.
    assert_eq!(recorder.events(), ["RECEIVING(info)", "OK(info)"]);
}

#[test]
fn test_delete_twice_reports_cleanly() {
    let scripted = Scripted::with_responses(&[packet(0xA0, &[]), packet(0xC4, &[])]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    session.del("tmp.log").unwrap();
    let second = session.del("tmp.log");
    assert!(matches!(second, Err(Error::Request { op: "delete", .. })));
    assert_eq!(
        recorder.events(),
        [
            "SENDING(tmp.log)",
            "OK(tmp.log)",
            "SENDING(tmp.log)",
            "ERR(tmp.log)",
        ]
    );
}

#[test]
fn test_setpath_issues_one_request_per_component() {
    let scripted =
        Scripted::with_responses(&[packet(0xA0, &[]), packet(0xA0, &[]), packet(0xA0, &[])]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    session.setpath(Some("/a//b/c")).unwrap();
    let sent = scripted.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|p| p[0] == 0x85));

    scripted.push_responses(&[packet(0xA0, &[])]);
    session.setpath(None).unwrap();
    let sent = scripted.sent();
    assert_eq!(sent.len(), 4);
    // SETPATH-up carries the backup flag and no NAME header.
    assert_eq!(sent[3], vec![0x85, 0x00, 0x05, 0x03, 0x00]);
}

#[test]
fn test_setpath_halts_on_first_failure() {
    let scripted = Scripted::with_responses(&[packet(0xA0, &[]), packet(0xC3, &[])]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    assert!(session.setpath(Some("a/b/c")).is_err());
    assert_eq!(scripted.sent().len(), 2);
}

#[test]
fn test_fast_list_returns_nul_terminated_xml() {
    let listing = b"<?xml version=\"1.0\"?><folder-listing></folder-listing>";
    let scripted = Scripted::with_responses(&[success_with_end_of_body(listing)]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    let buf = session.fast_list("").unwrap().to_vec();
    assert!(buf.starts_with(b"<?xml"));
    assert_eq!(buf.last(), Some(&0));
    assert_eq!(&buf[..buf.len() - 1], listing);
}

#[test]
fn test_put_streams_chunks_until_eof() {
    let local = std::env::temp_dir().join(format!("obexftp-engine-put-{}", std::process::id()));
    std::fs::write(&local, b"hello world").unwrap();

    let scripted = Scripted::with_responses(&[
        packet(0x90, &[]),
        packet(0x90, &[]),
        packet(0xA0, &[]),
    ]);
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    session.put_file(&local, "hello.txt").unwrap();

    let sent = scripted.sent();
    assert_eq!(sent.len(), 3);
    // First packet: PUT with NAME and LENGTH, no body yet.
    assert_eq!(sent[0][0], 0x02);
    assert!(sent[0].windows(2).any(|w| w == [0xC3, 0x00]));
    // Middle packet carries the body chunk.
    assert_eq!(sent[1][0], 0x02);
    assert!(
        sent[1]
            .windows(b"hello world".len())
            .any(|w| w == b"hello world")
    );
    // Final packet is a final PUT with an empty END-OF-BODY.
    assert_eq!(sent[2], vec![0x82, 0x00, 0x06, 0x49, 0x00, 0x03]);

    std::fs::remove_file(&local).unwrap();
}

#[test]
fn test_empty_remote_name_is_a_contract_violation() {
    let scripted = Scripted::default();
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    assert!(matches!(
        session.get(None, ""),
        Err(Error::InvalidArgument(_))
    ));
    // Contract violations emit no events and touch the wire not at all.
    assert!(recorder.events().is_empty());
    assert!(scripted.sent().is_empty());
}

#[test]
fn test_link_error_fails_request() {
    // No scripted responses at all: the link closes after the request.
    let scripted = Scripted::default();
    let recorder = Recorder::default();
    let mut session = session(&scripted, &recorder);

    assert!(matches!(
        session.del("x"),
        Err(Error::Transport(TransportError::Io(_)))
    ));
    assert_eq!(recorder.events(), ["SENDING(x)", "ERR(x)"]);
}
