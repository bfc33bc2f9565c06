//! Request objects: one builder per client operation.

use binrw::{Endian, prelude::*};

use crate::{
    ConnectFields, Header, ObexMsgError, OpCode, PACKET_PREFIX_LEN, SetPathFields, SetPathFlags,
};

/// MIME type requested for folder listings.
pub const FOLDER_LISTING_TYPE: &str = "x-obex/folder-listing";

/// Folder-browsing target UUIDs for the CONNECT header, in the order they
/// are tried: the Siemens S45 service first, then the generic
/// folder-browsing service.
pub const TARGET_S45: [u8; 16] = [
    0x6b, 0x01, 0xcb, 0x31, 0x41, 0x06, 0x11, 0xd4, 0x9a, 0x77, 0x00, 0x50, 0xda, 0x3f, 0x47, 0x1f,
];
pub const TARGET_FBS: [u8; 16] = [
    0xf9, 0xec, 0x7b, 0xc4, 0x95, 0x3c, 0x11, 0xd2, 0x98, 0x4e, 0x52, 0x54, 0x00, 0xdc, 0x9e, 0x09,
];

/// Fixed payload between the prefix and the headers, present on CONNECT and
/// SETPATH requests only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestFields {
    None,
    Connect(ConnectFields),
    SetPath(SetPathFields),
}

/// A request object: an opcode, optional fixed fields and a header list.
///
/// Streaming PUT bodies are not part of the object; the session feeds
/// continuation packets built with [`Request::put_chunk`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub opcode: OpCode,
    pub fields: RequestFields,
    pub headers: Vec<Header>,
}

impl Request {
    fn new(opcode: OpCode, headers: Vec<Header>) -> Request {
        Request {
            opcode,
            fields: RequestFields::None,
            headers,
        }
    }

    /// CONNECT with the given 16-byte service target. The whole request must
    /// fit a single packet; [`Request::encode`] enforces it.
    pub fn connect(target: &[u8; 16]) -> Request {
        Request {
            opcode: OpCode::CONNECT,
            fields: RequestFields::Connect(ConnectFields::default()),
            headers: vec![Header::Target(target.to_vec())],
        }
    }

    pub fn disconnect() -> Request {
        Request::new(OpCode::DISCONNECT, Vec::new())
    }

    /// GET of a file by remote name.
    pub fn get_file(remote: &str) -> Request {
        Request::new(OpCode::GET.with_final(), vec![Header::name(remote)])
    }

    /// GET of a folder listing; the NAME header is omitted for the root.
    pub fn get_listing(folder: &str) -> Request {
        let mut headers = Vec::new();
        if !folder.is_empty() {
            headers.push(Header::name(folder));
        }
        headers.push(Header::mime_type(FOLDER_LISTING_TYPE));
        Request::new(OpCode::GET.with_final(), headers)
    }

    /// GET carrying an application-parameter request with a zero-length
    /// value, used for the device-info exchange.
    pub fn get_info(opcode: u8) -> Request {
        Request::new(
            OpCode::GET.with_final(),
            vec![Header::AppParams(vec![opcode, 0])],
        )
    }

    /// Empty final GET that asks the server for the next response packet.
    pub fn get_poll() -> Request {
        Request::new(OpCode::GET.with_final(), Vec::new())
    }

    /// First packet of a streamed PUT; body chunks follow separately.
    pub fn put(remote: &str, size: u32) -> Request {
        Request::new(
            OpCode::PUT,
            vec![Header::name(remote), Header::Length(size)],
        )
    }

    /// A PUT continuation packet carrying one body chunk. The last chunk is
    /// a final packet with an END-OF-BODY header.
    pub fn put_chunk(chunk: Vec<u8>, last: bool) -> Request {
        if last {
            Request::new(OpCode::PUT.with_final(), vec![Header::EndOfBody(chunk)])
        } else {
            Request::new(OpCode::PUT, vec![Header::Body(chunk)])
        }
    }

    /// PUT without any body: deletes the named object.
    pub fn delete(remote: &str) -> Request {
        Request::new(OpCode::PUT.with_final(), vec![Header::name(remote)])
    }

    /// Rename as the Siemens profile builds it: source and destination NAME
    /// headers on one final PUT.
    pub fn rename(src: &str, dst: &str) -> Request {
        Request::new(
            OpCode::PUT.with_final(),
            vec![Header::name(src), Header::name(dst)],
        )
    }

    /// SETPATH one level down into `component`.
    pub fn setpath_down(component: &str) -> Request {
        Request {
            opcode: OpCode::SETPATH,
            fields: RequestFields::SetPath(SetPathFields {
                flags: SetPathFlags::new().with_dont_create(true),
            }),
            headers: vec![Header::name(component)],
        }
    }

    /// SETPATH one level up, no NAME header.
    pub fn setpath_up() -> Request {
        Request {
            opcode: OpCode::SETPATH,
            fields: RequestFields::SetPath(SetPathFields {
                flags: SetPathFlags::new().with_backup(true).with_dont_create(true),
            }),
            headers: Vec::new(),
        }
    }

    pub fn abort() -> Request {
        Request::new(OpCode::ABORT, Vec::new())
    }

    /// Whether responses to this request use the CONNECT reply layout.
    pub fn is_connect(&self) -> bool {
        self.opcode == OpCode::CONNECT
    }

    /// Serializes the request into one packet, rejecting anything beyond
    /// `max_packet` (the peer's advertised limit).
    pub fn encode(&self, max_packet: u16) -> crate::Result<Vec<u8>> {
        let mut payload = binrw::io::Cursor::new(Vec::new());
        match &self.fields {
            RequestFields::None => {}
            RequestFields::Connect(fields) => fields.write(&mut payload)?,
            RequestFields::SetPath(fields) => fields.write(&mut payload)?,
        }
        for header in &self.headers {
            header.write_options(&mut payload, Endian::Big, ())?;
        }
        let payload = payload.into_inner();

        let size = payload.len() + PACKET_PREFIX_LEN;
        if size > max_packet as usize {
            return Err(ObexMsgError::RequestTooLarge { size, max_packet });
        }

        let mut packet = Vec::with_capacity(size);
        packet.push(self.opcode.0);
        packet.extend_from_slice(&(size as u16).to_be_bytes());
        packet.extend_from_slice(&payload);
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_MAX_PACKET;
    use obex_tests::decode_hex;

    fn encoded(req: Request) -> Vec<u8> {
        req.encode(DEFAULT_MAX_PACKET).unwrap()
    }

    #[test]
    fn test_connect_layout() {
        assert_eq!(
            encoded(Request::connect(&TARGET_S45)),
            decode_hex("80 001a 10 00 2000 46 0013 6b01cb31410611d49a770050da3f471f"),
        );
    }

    #[test]
    fn test_disconnect_layout() {
        assert_eq!(encoded(Request::disconnect()), decode_hex("81 0003"));
    }

    #[test]
    fn test_setpath_down_layout() {
        assert_eq!(
            encoded(Request::setpath_down("music")),
            decode_hex("85 0014 02 00 01 000f 006d007500730069 0063 0000"),
        );
    }

    #[test]
    fn test_setpath_up_layout() {
        assert_eq!(encoded(Request::setpath_up()), decode_hex("85 0005 03 00"));
    }

    #[test]
    fn test_delete_has_no_body_headers() {
        let req = Request::delete("x");
        assert_eq!(req.opcode, OpCode::PUT.with_final());
        assert_eq!(encoded(req), decode_hex("82 000a 01 0007 0078 0000"));
    }

    #[test]
    fn test_listing_omits_empty_name() {
        let root = Request::get_listing("");
        assert_eq!(root.headers.len(), 1);
        let sub = Request::get_listing("telecom");
        assert_eq!(sub.headers.len(), 2);
        assert_eq!(sub.headers[0], Header::name("telecom"));
    }

    #[test]
    fn test_info_apparam_value() {
        let req = Request::get_info(0x01);
        assert_eq!(req.headers, vec![Header::AppParams(vec![0x01, 0x00])]);
    }

    #[test]
    fn test_put_chunk_final_marks_end_of_body() {
        let mid = Request::put_chunk(b"ab".to_vec(), false);
        assert_eq!(mid.opcode, OpCode::PUT);
        assert_eq!(mid.headers, vec![Header::Body(b"ab".to_vec())]);
        let last = Request::put_chunk(Vec::new(), true);
        assert!(last.opcode.is_final());
        assert_eq!(last.headers, vec![Header::EndOfBody(Vec::new())]);
    }

    #[test]
    fn test_connect_must_fit_one_packet() {
        let mut req = Request::connect(&TARGET_FBS);
        req.headers.push(Header::Body(vec![0u8; 512]));
        assert!(matches!(
            req.encode(255),
            Err(ObexMsgError::RequestTooLarge { .. })
        ));
    }
}
