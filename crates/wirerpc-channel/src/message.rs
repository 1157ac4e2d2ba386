//! The message carried in every frame payload.
//!
//! On the wire a message is a protobuf-compatible record:
//!
//! | field      | number | wire type        |
//! |------------|--------|------------------|
//! | `id`       | 1      | varint           |
//! | `method`   | 2      | length-delimited |
//! | `request`  | 3      | length-delimited |
//! | `response` | 4      | length-delimited |
//! | `error`    | 5      | length-delimited |
//!
//! Default-valued fields are omitted. A non-empty `method` is the only thing
//! that makes a message a request.

use bytes::{BufMut, Bytes, BytesMut};
use wirerpc_frame::{decode_varint, encode_varint, varint_len};

use crate::error::{ChannelError, Result};

const FIELD_ID: u64 = 1;
const FIELD_METHOD: u64 = 2;
const FIELD_REQUEST: u64 = 3;
const FIELD_RESPONSE: u64 = 4;
const FIELD_ERROR: u64 = 5;

const WIRE_VARINT: u64 = 0;
const WIRE_FIXED64: u64 = 1;
const WIRE_LEN: u64 = 2;
const WIRE_FIXED32: u64 = 5;

/// Flat form of a message, as it is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub method: String,
    pub request: Bytes,
    pub response: Bytes,
    pub error: String,
}

impl Message {
    /// A request for `method`.
    pub fn request(id: u64, method: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            method: method.into(),
            request: body.into(),
            ..Self::default()
        }
    }

    /// A successful response.
    pub fn success(id: u64, body: impl Into<Bytes>) -> Self {
        Self {
            id,
            response: body.into(),
            ..Self::default()
        }
    }

    /// An error response.
    pub fn failure(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            error: error.into(),
            ..Self::default()
        }
    }

    /// Whether this message is a request (it names a method).
    pub fn is_request(&self) -> bool {
        !self.method.is_empty()
    }

    /// Serialized length in bytes.
    pub fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.id != 0 {
            len += 1 + varint_len(self.id);
        }
        for field in [
            self.method.as_bytes(),
            self.request.as_ref(),
            self.response.as_ref(),
            self.error.as_bytes(),
        ] {
            if !field.is_empty() {
                len += 1 + varint_len(field.len() as u64) + field.len();
            }
        }
        len
    }

    /// Serialize into `dst`.
    pub fn encode_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.encoded_len());
        if self.id != 0 {
            encode_varint(key(FIELD_ID, WIRE_VARINT), dst);
            encode_varint(self.id, dst);
        }
        put_len_field(FIELD_METHOD, self.method.as_bytes(), dst);
        put_len_field(FIELD_REQUEST, &self.request, dst);
        put_len_field(FIELD_RESPONSE, &self.response, dst);
        put_len_field(FIELD_ERROR, self.error.as_bytes(), dst);
    }

    /// Serialize into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_to(&mut buf);
        buf.freeze()
    }

    /// Parse a serialized message.
    ///
    /// `request` and `response` share storage with `payload`. Unknown fields
    /// are skipped.
    pub fn decode(payload: &Bytes) -> Result<Self> {
        let buf = payload.as_ref();
        let mut message = Message::default();
        let mut pos = 0;

        while pos < buf.len() {
            let (tag, next) = read_varint(buf, pos)?;
            pos = next;
            let field = tag >> 3;
            let wire = tag & 0x7;

            if field == 0 {
                return Err(ChannelError::Decode("field number 0".to_string()));
            }

            match (field, wire) {
                (FIELD_ID, WIRE_VARINT) => {
                    let (id, next) = read_varint(buf, pos)?;
                    message.id = id;
                    pos = next;
                }
                (FIELD_METHOD, WIRE_LEN) => {
                    let (range, next) = read_len(buf, pos)?;
                    message.method = utf8(&buf[range], "method")?;
                    pos = next;
                }
                (FIELD_REQUEST, WIRE_LEN) => {
                    let (range, next) = read_len(buf, pos)?;
                    message.request = payload.slice(range);
                    pos = next;
                }
                (FIELD_RESPONSE, WIRE_LEN) => {
                    let (range, next) = read_len(buf, pos)?;
                    message.response = payload.slice(range);
                    pos = next;
                }
                (FIELD_ERROR, WIRE_LEN) => {
                    let (range, next) = read_len(buf, pos)?;
                    message.error = utf8(&buf[range], "error")?;
                    pos = next;
                }
                (FIELD_ID..=FIELD_ERROR, _) => {
                    return Err(ChannelError::Decode(format!(
                        "field {field} has unexpected wire type {wire}"
                    )));
                }
                (_, _) => pos = skip_field(buf, pos, wire)?,
            }
        }

        Ok(message)
    }
}

/// A decoded message, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    Request(Request),
    Response(Response),
}

/// An inbound call addressed to one of our handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u64,
    pub method: String,
    pub body: Bytes,
}

/// The answer to a call we sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: u64,
    pub outcome: Outcome,
}

/// What the peer's handler produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(Bytes),
    Error(String),
}

impl Response {
    /// The response body, or the peer's error as [`ChannelError::Remote`].
    pub fn into_result(self) -> Result<Bytes> {
        match self.outcome {
            Outcome::Success(body) => Ok(body),
            Outcome::Error(error) => Err(ChannelError::Remote(error)),
        }
    }

    /// Whether the peer answered with an error.
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }
}

impl From<Message> for Envelope {
    fn from(message: Message) -> Self {
        if message.is_request() {
            return Envelope::Request(Request {
                id: message.id,
                method: message.method,
                body: message.request,
            });
        }

        let outcome = if message.error.is_empty() {
            Outcome::Success(message.response)
        } else {
            Outcome::Error(message.error)
        };
        Envelope::Response(Response {
            id: message.id,
            outcome,
        })
    }
}

impl From<Envelope> for Message {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::Request(request) => Message::request(request.id, request.method, request.body),
            Envelope::Response(Response {
                id,
                outcome: Outcome::Success(body),
            }) => Message::success(id, body),
            Envelope::Response(Response {
                id,
                outcome: Outcome::Error(error),
            }) => Message::failure(id, error),
        }
    }
}

fn key(field: u64, wire: u64) -> u64 {
    (field << 3) | wire
}

fn put_len_field(field: u64, value: &[u8], dst: &mut BytesMut) {
    if value.is_empty() {
        return;
    }
    encode_varint(key(field, WIRE_LEN), dst);
    encode_varint(value.len() as u64, dst);
    dst.put_slice(value);
}

fn read_varint(buf: &[u8], pos: usize) -> Result<(u64, usize)> {
    decode_varint(buf, pos)
        .map_err(|err| ChannelError::Decode(err.to_string()))?
        .ok_or_else(|| truncated(pos))
}

fn read_len(buf: &[u8], pos: usize) -> Result<(std::ops::Range<usize>, usize)> {
    let (len, start) = read_varint(buf, pos)?;
    let end = usize::try_from(len)
        .ok()
        .and_then(|len| start.checked_add(len))
        .filter(|end| *end <= buf.len())
        .ok_or_else(|| truncated(start))?;
    Ok((start..end, end))
}

fn skip_field(buf: &[u8], pos: usize, wire: u64) -> Result<usize> {
    let next = match wire {
        WIRE_VARINT => read_varint(buf, pos)?.1,
        WIRE_FIXED64 => pos + 8,
        WIRE_LEN => read_len(buf, pos)?.1,
        WIRE_FIXED32 => pos + 4,
        other => {
            return Err(ChannelError::Decode(format!(
                "unsupported wire type {other}"
            )))
        }
    };
    if next > buf.len() {
        return Err(truncated(pos));
    }
    Ok(next)
}

fn utf8(bytes: &[u8], field: &str) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ChannelError::Decode(format!("{field} is not valid UTF-8")))
}

fn truncated(pos: usize) -> ChannelError {
    ChannelError::Decode(format!("truncated at byte {pos}"))
}
