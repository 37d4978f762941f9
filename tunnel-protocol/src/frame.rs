//! Length-prefixed binary frame format carried over a tunnel transport
//! (a WebRTC data channel or a relay WebSocket).
//!
//! Every frame starts with a single type byte followed by a type-specific
//! body. All integers are big-endian; all length-prefixed byte ranges are
//! exact, with no padding. See the wire format table in the protocol
//! specification for the byte layout of each frame type.

use std::collections::BTreeMap;

/// Header map carried by `HTTP_REQUEST`, `HTTP_RESPONSE` and `WS_CONNECT`
/// frames, encoded on the wire as a JSON object mapping each header name to
/// a single string value.
pub type Headers = BTreeMap<String, String>;

/// The leading type byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    HttpRequest = 0x01,
    HttpResponse = 0x02,
    WsConnect = 0x10,
    WsData = 0x11,
    WsClose = 0x12,
}

impl FrameType {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::HttpRequest),
            0x02 => Some(Self::HttpResponse),
            0x10 => Some(Self::WsConnect),
            0x11 => Some(Self::WsData),
            0x12 => Some(Self::WsClose),
            _ => None,
        }
    }
}

/// A decoded tunnel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    HttpRequest {
        request_id: u32,
        method: String,
        path: String,
        headers: Headers,
        body: Vec<u8>,
    },
    HttpResponse {
        request_id: u32,
        status_code: u16,
        headers: Headers,
        body: Vec<u8>,
    },
    WsConnect {
        connection_id: u32,
        url: String,
        headers: Headers,
    },
    WsData {
        connection_id: u32,
        opcode: u8,
        payload: Vec<u8>,
    },
    WsClose {
        connection_id: u32,
        close_code: u16,
        reason: String,
    },
}

/// Standard WebSocket opcodes used in the `opcode` field of `WS_DATA`.
pub mod opcode {
    pub const CONTINUATION: u8 = 0x0;
    pub const TEXT: u8 = 0x1;
    pub const BINARY: u8 = 0x2;
    pub const CLOSE: u8 = 0x8;
    pub const PING: u8 = 0x9;
    pub const PONG: u8 = 0xA;
}

/// Errors that can occur while decoding a frame from a byte buffer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The leading byte did not match any of the five known frame types.
    #[error("unknown frame type byte: 0x{0:02x}")]
    UnknownFrameType(u8),
    /// The buffer ended before a declared length-prefixed field was fully read.
    #[error("frame truncated while reading {0}")]
    Truncated(&'static str),
    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),
    /// The `headers_json` field did not parse as a JSON object of strings.
    #[error("invalid headers json: {0}")]
    InvalidHeaders(String),
    /// An empty buffer was passed to `decode`.
    #[error("empty frame buffer")]
    EmptyBuffer,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(CodecError::Truncated(field));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, CodecError> {
        let b = self.take(2, field)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        let b = self.take(4, field)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, len: usize, field: &'static str) -> Result<String, CodecError> {
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
    }

    fn bytes(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>, CodecError> {
        Ok(self.take(len, field)?.to_vec())
    }

    fn headers(&mut self, len: usize) -> Result<Headers, CodecError> {
        let raw = self.string(len, "headers_json")?;
        if raw.is_empty() {
            return Ok(Headers::new());
        }
        serde_json::from_str(&raw).map_err(|e| CodecError::InvalidHeaders(e.to_string()))
    }
}

fn encode_headers(headers: &Headers) -> Vec<u8> {
    if headers.is_empty() {
        // Zero-length headers are valid per the round-trip law; avoid
        // emitting the literal text "{}" so the empty case stays minimal.
        return Vec::new();
    }
    serde_json::to_vec(headers).expect("header map serializes to json")
}

fn push_u16_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u16).to_be_bytes());
}

fn push_u32_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_be_bytes());
}

/// Encodes a frame into its exact wire representation.
pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut buf = Vec::new();
    match frame {
        Frame::HttpRequest {
            request_id,
            method,
            path,
            headers,
            body,
        } => {
            buf.push(FrameType::HttpRequest as u8);
            buf.extend_from_slice(&request_id.to_be_bytes());
            push_u16_len(&mut buf, method.len());
            buf.extend_from_slice(method.as_bytes());
            push_u16_len(&mut buf, path.len());
            buf.extend_from_slice(path.as_bytes());
            let headers_json = encode_headers(headers);
            push_u32_len(&mut buf, headers_json.len());
            buf.extend_from_slice(&headers_json);
            push_u32_len(&mut buf, body.len());
            buf.extend_from_slice(body);
        }
        Frame::HttpResponse {
            request_id,
            status_code,
            headers,
            body,
        } => {
            buf.push(FrameType::HttpResponse as u8);
            buf.extend_from_slice(&request_id.to_be_bytes());
            buf.extend_from_slice(&status_code.to_be_bytes());
            let headers_json = encode_headers(headers);
            push_u32_len(&mut buf, headers_json.len());
            buf.extend_from_slice(&headers_json);
            push_u32_len(&mut buf, body.len());
            buf.extend_from_slice(body);
        }
        Frame::WsConnect {
            connection_id,
            url,
            headers,
        } => {
            buf.push(FrameType::WsConnect as u8);
            buf.extend_from_slice(&connection_id.to_be_bytes());
            push_u16_len(&mut buf, url.len());
            buf.extend_from_slice(url.as_bytes());
            let headers_json = encode_headers(headers);
            push_u32_len(&mut buf, headers_json.len());
            buf.extend_from_slice(&headers_json);
        }
        Frame::WsData {
            connection_id,
            opcode,
            payload,
        } => {
            buf.push(FrameType::WsData as u8);
            buf.extend_from_slice(&connection_id.to_be_bytes());
            buf.push(*opcode);
            push_u32_len(&mut buf, payload.len());
            buf.extend_from_slice(payload);
        }
        Frame::WsClose {
            connection_id,
            close_code,
            reason,
        } => {
            buf.push(FrameType::WsClose as u8);
            buf.extend_from_slice(&connection_id.to_be_bytes());
            buf.extend_from_slice(&close_code.to_be_bytes());
            push_u16_len(&mut buf, reason.len());
            buf.extend_from_slice(reason.as_bytes());
        }
    }
    buf
}

/// Decodes a frame from its exact wire representation.
///
/// Refuses any buffer whose first byte is not one of the five known frame
/// type bytes with [`CodecError::UnknownFrameType`].
pub fn decode(buf: &[u8]) -> Result<Frame, CodecError> {
    if buf.is_empty() {
        return Err(CodecError::EmptyBuffer);
    }
    let frame_type =
        FrameType::from_byte(buf[0]).ok_or(CodecError::UnknownFrameType(buf[0]))?;
    let mut r = Reader::new(&buf[1..]);

    let frame = match frame_type {
        FrameType::HttpRequest => {
            let request_id = r.u32("request_id")?;
            let method_len = r.u16("method_len")? as usize;
            let method = r.string(method_len, "method")?;
            let path_len = r.u16("path_len")? as usize;
            let path = r.string(path_len, "path")?;
            let headers_len = r.u32("headers_len")? as usize;
            let headers = r.headers(headers_len)?;
            let body_len = r.u32("body_len")? as usize;
            let body = r.bytes(body_len, "body")?;
            Frame::HttpRequest {
                request_id,
                method,
                path,
                headers,
                body,
            }
        }
        FrameType::HttpResponse => {
            let request_id = r.u32("request_id")?;
            let status_code = r.u16("status_code")?;
            let headers_len = r.u32("headers_len")? as usize;
            let headers = r.headers(headers_len)?;
            let body_len = r.u32("body_len")? as usize;
            let body = r.bytes(body_len, "body")?;
            Frame::HttpResponse {
                request_id,
                status_code,
                headers,
                body,
            }
        }
        FrameType::WsConnect => {
            let connection_id = r.u32("connection_id")?;
            let url_len = r.u16("url_len")? as usize;
            let url = r.string(url_len, "url")?;
            let headers_len = r.u32("headers_len")? as usize;
            let headers = r.headers(headers_len)?;
            Frame::WsConnect {
                connection_id,
                url,
                headers,
            }
        }
        FrameType::WsData => {
            let connection_id = r.u32("connection_id")?;
            let opcode = r.u8("opcode")?;
            let payload_len = r.u32("payload_len")? as usize;
            let payload = r.bytes(payload_len, "payload")?;
            Frame::WsData {
                connection_id,
                opcode,
                payload,
            }
        }
        FrameType::WsClose => {
            let connection_id = r.u32("connection_id")?;
            let close_code = r.u16("close_code")?;
            let reason_len = r.u16("reason_len")? as usize;
            let reason = r.string(reason_len, "reason")?;
            Frame::WsClose {
                connection_id,
                close_code,
                reason,
            }
        }
    };

    Ok(frame)
}

/// Returns the frame type byte for a decoded or to-be-encoded frame,
/// used by the multiplexer's demultiplex rule without re-encoding.
pub fn frame_type(frame: &Frame) -> FrameType {
    match frame {
        Frame::HttpRequest { .. } => FrameType::HttpRequest,
        Frame::HttpResponse { .. } => FrameType::HttpResponse,
        Frame::WsConnect { .. } => FrameType::WsConnect,
        Frame::WsData { .. } => FrameType::WsData,
        Frame::WsClose { .. } => FrameType::WsClose,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> Headers {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn round_trips_http_request() {
        let f = Frame::HttpRequest {
            request_id: 1,
            method: "GET".into(),
            path: "/v1/health".into(),
            headers: headers(&[("accept", "application/json")]),
            body: vec![],
        };
        assert_eq!(decode(&encode(&f)).unwrap(), f);
    }

    #[test]
    fn round_trips_http_request_at_max_request_id_with_multibyte_utf8() {
        let f = Frame::HttpRequest {
            request_id: u32::MAX,
            method: "PÖST".into(),
            path: "/caf\u{e9}/\u{1F600}".into(),
            headers: headers(&[("x-name", "caf\u{e9}")]),
            body: "bödy".as_bytes().to_vec(),
        };
        assert_eq!(decode(&encode(&f)).unwrap(), f);
    }

    #[test]
    fn round_trips_http_response_with_empty_headers_and_body() {
        let f = Frame::HttpResponse {
            request_id: 42,
            status_code: 204,
            headers: Headers::new(),
            body: Vec::new(),
        };
        let bytes = encode(&f);
        assert_eq!(bytes[0], 0x02);
        assert_eq!(decode(&bytes).unwrap(), f);
    }

    #[test]
    fn round_trips_ws_connect() {
        let f = Frame::WsConnect {
            connection_id: 7,
            url: "ws://localhost:3000/ws".into(),
            headers: headers(&[("authorization", "Bearer abc")]),
        };
        assert_eq!(decode(&encode(&f)).unwrap(), f);
    }

    #[test]
    fn round_trips_ws_data_binary_and_text() {
        for (opcode, payload) in [
            (opcode::TEXT, b"hello".to_vec()),
            (opcode::BINARY, vec![0u8, 1, 2, 255]),
        ] {
            let f = Frame::WsData {
                connection_id: 99,
                opcode,
                payload,
            };
            assert_eq!(decode(&encode(&f)).unwrap(), f);
        }
    }

    #[test]
    fn round_trips_ws_close_with_multibyte_reason_and_empty_reason() {
        let f = Frame::WsClose {
            connection_id: 3,
            close_code: 1000,
            reason: "bye \u{1F44B}".into(),
        };
        assert_eq!(decode(&encode(&f)).unwrap(), f);

        let empty = Frame::WsClose {
            connection_id: 3,
            close_code: 1006,
            reason: String::new(),
        };
        assert_eq!(decode(&encode(&empty)).unwrap(), empty);
    }

    #[test]
    fn rejects_unknown_frame_type() {
        let err = decode(&[0x99, 0, 0, 0]).unwrap_err();
        assert_eq!(err, CodecError::UnknownFrameType(0x99));
    }

    #[test]
    fn rejects_empty_buffer() {
        assert_eq!(decode(&[]).unwrap_err(), CodecError::EmptyBuffer);
    }

    #[test]
    fn rejects_truncated_frame() {
        // HTTP_RESPONSE with only the type byte and half the request id.
        let err = decode(&[0x02, 0, 0]).unwrap_err();
        assert!(matches!(err, CodecError::Truncated(_)));
    }
}
