//! SDP client: service search over L2CAP and the data-element codec.
//!
//! The only query this profile needs is a ServiceSearchAttribute for the
//! ProtocolDescriptorList of one service UUID, from which the RFCOMM channel
//! is pulled.

use std::time::Duration;

use uuid::Uuid;

use obex_transport::BdAddr;

use super::sock::RawSocket;
use super::{SdpBrowse, UuidExt};
use crate::{Error, Result};

const BTPROTO_L2CAP: libc::c_int = 0;
/// SDP runs on the reserved L2CAP PSM 1.
const SDP_PSM: u16 = 0x0001;

const SDP_ERROR_RSP: u8 = 0x01;
const SDP_SVC_SEARCH_ATTR_REQ: u8 = 0x06;
const SDP_SVC_SEARCH_ATTR_RSP: u8 = 0x07;

/// ProtocolDescriptorList attribute id.
const ATTR_PROTO_DESC_LIST: u16 = 0x0004;
/// RFCOMM protocol UUID, whose first parameter is the server channel.
const RFCOMM_PROTO_UUID: u16 = 0x0003;

const MAX_ATTR_BYTES: u16 = 0xFFFF;
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_RETRIES: u32 = 3;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(300);

#[repr(C)]
struct SockAddrL2 {
    l2_family: libc::sa_family_t,
    l2_psm: u16,
    l2_bdaddr: [u8; 6],
    l2_cid: u16,
    l2_bdaddr_type: u8,
}

/// One connection to a remote SDP server.
pub struct SdpSession {
    sock: RawSocket,
    transaction: u16,
}

impl SdpSession {
    /// Connects to the peer's SDP server, retrying while it reports busy.
    pub fn connect(addr: BdAddr) -> Result<SdpSession> {
        let mut attempt = 0;
        loop {
            let sock = RawSocket::new(libc::AF_BLUETOOTH, libc::SOCK_SEQPACKET, BTPROTO_L2CAP)
                .map_err(Error::Io)?;
            let sockaddr = SockAddrL2 {
                l2_family: libc::AF_BLUETOOTH as libc::sa_family_t,
                l2_psm: SDP_PSM.to_le(),
                l2_bdaddr: addr.to_bytes(),
                l2_cid: 0,
                l2_bdaddr_type: 0,
            };
            match sock.connect(&sockaddr) {
                Ok(()) => {
                    log::debug!("SDP session to {addr}");
                    return Ok(SdpSession {
                        sock,
                        transaction: 0,
                    });
                }
                Err(err)
                    if attempt + 1 < CONNECT_RETRIES
                        && err.raw_os_error() == Some(libc::EBUSY) =>
                {
                    log::debug!("SDP server busy, retrying");
                    attempt += 1;
                    std::thread::sleep(CONNECT_RETRY_DELAY);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// One ServiceSearchAttribute transaction, following continuation state
    /// until the attribute lists are complete.
    fn search_attributes(&mut self, uuid: &Uuid) -> Result<Vec<u8>> {
        let mut lists = Vec::new();
        let mut continuation = vec![0u8];
        loop {
            self.transaction = self.transaction.wrapping_add(1);
            let request = build_search_attr_request(self.transaction, uuid, &continuation);
            self.sock.send(&request).map_err(Error::Io)?;

            if !self.sock.wait_readable(RESPONSE_TIMEOUT).map_err(Error::Io)? {
                return Err(Error::Discovery("SDP response timed out".into()));
            }
            let mut buf = vec![0u8; u16::MAX as usize];
            let n = self.sock.recv(&mut buf).map_err(Error::Io)?;

            let (chunk, cont) = parse_search_attr_response(&buf[..n], self.transaction)?;
            lists.extend_from_slice(chunk);
            if cont.is_empty() {
                break;
            }
            continuation = cont;
        }
        Ok(lists)
    }
}

impl SdpBrowse for SdpSession {
    fn channel_for_uuid(&mut self, uuid: &Uuid) -> Result<Option<u8>> {
        let lists = self.search_attributes(uuid)?;
        if lists.is_empty() {
            return Ok(None);
        }
        let (root, _) = DataElement::parse(&lists)?;
        Ok(rfcomm_channel(&root))
    }
}

fn build_search_attr_request(tid: u16, uuid: &Uuid, continuation: &[u8]) -> Vec<u8> {
    let pattern = des(&encode_uuid(uuid));
    // A single individual attribute: the protocol descriptor list.
    let mut attr_elem = vec![0x09];
    attr_elem.extend_from_slice(&ATTR_PROTO_DESC_LIST.to_be_bytes());
    let attrs = des(&attr_elem);

    let param_len = pattern.len() + 2 + attrs.len() + continuation.len();
    let mut pdu = Vec::with_capacity(5 + param_len);
    pdu.push(SDP_SVC_SEARCH_ATTR_REQ);
    pdu.extend_from_slice(&tid.to_be_bytes());
    pdu.extend_from_slice(&(param_len as u16).to_be_bytes());
    pdu.extend_from_slice(&pattern);
    pdu.extend_from_slice(&MAX_ATTR_BYTES.to_be_bytes());
    pdu.extend_from_slice(&attrs);
    pdu.extend_from_slice(continuation);
    pdu
}

/// Splits a ServiceSearchAttribute response into its attribute-list bytes
/// and the continuation state to echo back (empty when done).
fn parse_search_attr_response(buf: &[u8], expect_tid: u16) -> Result<(&[u8], Vec<u8>)> {
    if buf.len() < 5 {
        return Err(Error::Discovery("short SDP response".into()));
    }
    let pdu_id = buf[0];
    let tid = u16::from_be_bytes([buf[1], buf[2]]);
    let param_len = u16::from_be_bytes([buf[3], buf[4]]) as usize;
    let params = buf
        .get(5..5 + param_len)
        .ok_or_else(|| Error::Discovery("truncated SDP response".into()))?;

    if pdu_id == SDP_ERROR_RSP {
        let code = params
            .get(..2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .unwrap_or(0);
        return Err(Error::Discovery(format!("SDP error response {code:#06x}")));
    }
    if pdu_id != SDP_SVC_SEARCH_ATTR_RSP || tid != expect_tid {
        return Err(Error::Discovery("unexpected SDP response".into()));
    }
    if params.len() < 2 {
        return Err(Error::Discovery("short SDP response".into()));
    }

    let count = u16::from_be_bytes([params[0], params[1]]) as usize;
    let lists = params
        .get(2..2 + count)
        .ok_or_else(|| Error::Discovery("truncated attribute lists".into()))?;

    let cont = &params[2 + count..];
    let cont_len = *cont
        .first()
        .ok_or_else(|| Error::Discovery("missing continuation state".into()))?
        as usize;
    let state = cont
        .get(1..1 + cont_len)
        .ok_or_else(|| Error::Discovery("truncated continuation state".into()))?;

    Ok((
        lists,
        if state.is_empty() {
            Vec::new()
        } else {
            let mut echo = vec![state.len() as u8];
            echo.extend_from_slice(state);
            echo
        },
    ))
}

/// UUID data element: short form when the UUID fits 16 bits, full 128-bit
/// form otherwise.
fn encode_uuid(uuid: &Uuid) -> Vec<u8> {
    match uuid.as_u16() {
        Some(short) => {
            let mut elem = vec![0x19];
            elem.extend_from_slice(&short.to_be_bytes());
            elem
        }
        None => {
            let mut elem = vec![0x1c];
            elem.extend_from_slice(uuid.as_bytes());
            elem
        }
    }
}

/// Wraps bytes in a data-element sequence with a one-byte size.
fn des(inner: &[u8]) -> Vec<u8> {
    debug_assert!(inner.len() < 256);
    let mut out = Vec::with_capacity(inner.len() + 2);
    out.push(0x35);
    out.push(inner.len() as u8);
    out.extend_from_slice(inner);
    out
}

/// One parsed SDP data element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataElement {
    Nil,
    Uint(u64),
    Int(i64),
    Uuid(Uuid),
    Text(Vec<u8>),
    Bool(bool),
    Sequence(Vec<DataElement>),
    Alternative(Vec<DataElement>),
    Url(Vec<u8>),
}

impl DataElement {
    /// Parses one element, returning it and the unconsumed rest.
    pub fn parse(input: &[u8]) -> Result<(DataElement, &[u8])> {
        let malformed = || Error::Discovery("malformed data element".into());
        let (&desc, rest) = input.split_first().ok_or_else(malformed)?;
        let kind = desc >> 3;
        let size_index = desc & 0x07;

        let (len, rest) = match size_index {
            0 => (if kind == 0 { 0 } else { 1 }, rest),
            1 => (2, rest),
            2 => (4, rest),
            3 => (8, rest),
            4 => (16, rest),
            5 => {
                let (&l, rest) = rest.split_first().ok_or_else(malformed)?;
                (l as usize, rest)
            }
            6 => {
                let l = rest.get(..2).ok_or_else(malformed)?;
                (u16::from_be_bytes([l[0], l[1]]) as usize, &rest[2..])
            }
            _ => {
                let l = rest.get(..4).ok_or_else(malformed)?;
                (u32::from_be_bytes([l[0], l[1], l[2], l[3]]) as usize, &rest[4..])
            }
        };
        let payload = rest.get(..len).ok_or_else(malformed)?;
        let rest = &rest[len..];

        let element = match kind {
            0 => DataElement::Nil,
            1 => DataElement::Uint(be_uint(payload).ok_or_else(malformed)?),
            2 => DataElement::Int(be_uint(payload).ok_or_else(malformed)? as i64),
            3 => DataElement::Uuid(match payload.len() {
                2 => Uuid::from_u16(u16::from_be_bytes([payload[0], payload[1]])),
                4 => Uuid::from_u32(u32::from_be_bytes([
                    payload[0], payload[1], payload[2], payload[3],
                ])),
                16 => Uuid::from_slice(payload).map_err(|_| malformed())?,
                _ => return Err(malformed()),
            }),
            4 => DataElement::Text(payload.to_vec()),
            5 => DataElement::Bool(payload.first().copied().unwrap_or(0) != 0),
            6 | 7 => {
                let mut children = Vec::new();
                let mut inner = payload;
                while !inner.is_empty() {
                    let (child, next) = DataElement::parse(inner)?;
                    children.push(child);
                    inner = next;
                }
                if kind == 6 {
                    DataElement::Sequence(children)
                } else {
                    DataElement::Alternative(children)
                }
            }
            8 => DataElement::Url(payload.to_vec()),
            _ => return Err(malformed()),
        };
        Ok((element, rest))
    }
}

fn be_uint(payload: &[u8]) -> Option<u64> {
    if payload.len() > 8 {
        return None;
    }
    Some(payload.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Pulls the RFCOMM channel out of parsed attribute lists; when several
/// records match, the last one wins.
pub fn rfcomm_channel(attribute_lists: &DataElement) -> Option<u8> {
    let DataElement::Sequence(records) = attribute_lists else {
        return None;
    };
    let rfcomm = Uuid::from_u16(RFCOMM_PROTO_UUID);

    let mut channel = None;
    for record in records {
        let DataElement::Sequence(pairs) = record else {
            continue;
        };
        // Attribute lists alternate id, value.
        for pair in pairs.chunks(2) {
            let [DataElement::Uint(id), DataElement::Sequence(protos)] = pair else {
                continue;
            };
            if *id != ATTR_PROTO_DESC_LIST as u64 {
                continue;
            }
            for proto in protos {
                let DataElement::Sequence(desc) = proto else {
                    continue;
                };
                if desc.first() != Some(&DataElement::Uuid(rfcomm)) {
                    continue;
                }
                if let Some(DataElement::Uint(port)) = desc.get(1) {
                    channel = Some(*port as u8);
                }
            }
        }
    }
    channel
}

#[cfg(test)]
mod tests {
    use super::*;
    use obex_tests::decode_hex;

    #[test]
    fn test_uuid_elements() {
        assert_eq!(encode_uuid(&Uuid::from_u16(0x1106)), decode_hex("19 1106"));
        let pcsuite = Uuid::from_u128(0x00005005_0000_1000_8000_0002ee000001);
        let elem = encode_uuid(&pcsuite);
        assert_eq!(elem[0], 0x1c);
        assert_eq!(elem.len(), 17);
    }

    #[test]
    fn test_request_shape() {
        let pdu = build_search_attr_request(7, &Uuid::from_u16(0x1106), &[0]);
        assert_eq!(
            pdu,
            decode_hex("06 0007 000d 35 03 19 1106 ffff 35 03 09 0004 00"),
        );
    }

    /// One record advertising L2CAP then RFCOMM channel 5.
    fn sample_lists() -> Vec<u8> {
        decode_hex(
            "35 13 35 11 09 0004 35 0c 35 03 19 0100 35 05 19 0003 08 05",
        )
    }

    #[test]
    fn test_channel_extraction() {
        let sample = sample_lists();
        let (root, rest) = DataElement::parse(&sample).unwrap();
        assert!(rest.is_empty());
        assert_eq!(rfcomm_channel(&root), Some(5));
    }

    #[test]
    fn test_last_record_wins() {
        // Two records, channels 4 then 9.
        let one = &sample_lists()[2..];
        let mut two = one.to_vec();
        *two.last_mut().unwrap() = 9;
        let mut lists = vec![0x35, (one.len() + two.len()) as u8];
        let mut first = one.to_vec();
        *first.last_mut().unwrap() = 4;
        lists.extend_from_slice(&first);
        lists.extend_from_slice(&two);

        let (root, _) = DataElement::parse(&lists).unwrap();
        assert_eq!(rfcomm_channel(&root), Some(9));
    }

    #[test]
    fn test_no_rfcomm_descriptor() {
        let lists = decode_hex("35 0c 35 0a 09 0004 35 05 35 03 19 0100");
        let (root, _) = DataElement::parse(&lists).unwrap();
        assert_eq!(rfcomm_channel(&root), None);
    }

    #[test]
    fn test_response_continuation_round_trip() {
        // 4 list bytes, then a 2-byte continuation state.
        let rsp = decode_hex("07 0001 0009 0004 35020900 02 abcd");
        let (lists, cont) = parse_search_attr_response(&rsp, 1).unwrap();
        assert_eq!(lists, decode_hex("35020900"));
        assert_eq!(cont, decode_hex("02 abcd"));

        let done = decode_hex("07 0002 0007 0004 35020900 00");
        let (_, cont) = parse_search_attr_response(&done, 2).unwrap();
        assert!(cont.is_empty());
    }

    #[test]
    fn test_error_response() {
        let rsp = decode_hex("01 0003 0002 0002");
        assert!(matches!(
            parse_search_attr_response(&rsp, 3),
            Err(Error::Discovery(_))
        ));
    }

    #[test]
    fn test_malformed_elements_rejected() {
        assert!(DataElement::parse(&[]).is_err());
        assert!(DataElement::parse(&decode_hex("35 05 09 0004")).is_err());
        assert!(DataElement::parse(&decode_hex("19 11")).is_err());
    }
}
