//! Binary codec for message bodies.
//!
//! Integers are little-endian. Strings are written as a type tag followed by
//! an `i32` byte length and UTF-8 bytes; a lone null tag encodes an absent
//! string.

use crate::error::ProtocolError;
use crate::message::{ClientType, HandshakeRequest, HandshakeResponse, RequestType};
use crate::version::ProtocolVersion;
use bytes::{Buf, BufMut, BytesMut};

/// Type tag of a UTF-8 string value.
const TYPE_STRING: i8 = 9;

/// Type tag of a null value.
const TYPE_NULL: i8 = 101;

/// Encodes and decodes message bodies for one session.
///
/// The codec starts at the current protocol version and is latched to the
/// negotiated version once the handshake succeeds.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    protocol_version: ProtocolVersion,
}

impl MessageCodec {
    pub fn new() -> Self {
        Self {
            protocol_version: ProtocolVersion::current(),
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn set_protocol_version(&mut self, version: ProtocolVersion) {
        self.protocol_version = version;
    }

    /// Encodes a handshake request body.
    ///
    /// The `lazy` flag only exists from 2.1.5 on and is omitted for older
    /// versions.
    pub fn encode_handshake_request(&self, request: &HandshakeRequest) -> BytesMut {
        let mut buf = BytesMut::with_capacity(13);
        buf.put_i8(RequestType::Handshake as i8);
        put_version(&mut buf, request.protocol_version);
        buf.put_i8(ClientType::Odbc as i8);
        put_bool(&mut buf, request.distributed_joins);
        put_bool(&mut buf, request.enforce_join_order);
        put_bool(&mut buf, request.replicated_only);
        put_bool(&mut buf, request.collocated);
        if request.protocol_version >= ProtocolVersion::VERSION_2_1_5 {
            put_bool(&mut buf, request.lazy);
        }
        buf
    }

    /// Decodes a handshake request body.
    pub fn decode_handshake_request(
        &self,
        payload: &[u8],
    ) -> Result<HandshakeRequest, ProtocolError> {
        let mut reader = Reader::new(payload);

        let request_type = reader.read_i8()?;
        if RequestType::from_i8(request_type) != Some(RequestType::Handshake) {
            return Err(ProtocolError::UnexpectedRequestType(request_type));
        }

        let protocol_version = reader.read_version()?;

        let client_type = reader.read_i8()?;
        if ClientType::from_i8(client_type).is_none() {
            return Err(ProtocolError::UnexpectedClientType(client_type));
        }

        let mut request = HandshakeRequest::new(protocol_version)
            .with_distributed_joins(reader.read_bool()?)
            .with_enforce_join_order(reader.read_bool()?)
            .with_replicated_only(reader.read_bool()?)
            .with_collocated(reader.read_bool()?);

        if protocol_version >= ProtocolVersion::VERSION_2_1_5 {
            request = request.with_lazy(reader.read_bool()?);
        }

        Ok(request)
    }

    /// Encodes a handshake response body.
    pub fn encode_handshake_response(&self, response: &HandshakeResponse) -> BytesMut {
        let mut buf = BytesMut::with_capacity(16);
        put_bool(&mut buf, response.accepted);
        if !response.accepted {
            put_version(&mut buf, response.server_version.unwrap_or_default());
            put_string(&mut buf, response.error.as_deref());
        }
        buf
    }

    /// Decodes a handshake response body.
    pub fn decode_handshake_response(
        &self,
        payload: &[u8],
    ) -> Result<HandshakeResponse, ProtocolError> {
        let mut reader = Reader::new(payload);

        if reader.read_bool()? {
            return Ok(HandshakeResponse::accepted());
        }

        let server_version = reader.read_version()?;
        let error = reader.read_string()?;

        Ok(HandshakeResponse::rejected(server_version, error))
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_i8(value as i8);
}

fn put_version(buf: &mut BytesMut, version: ProtocolVersion) {
    buf.put_i16_le(version.major());
    buf.put_i16_le(version.minor());
    buf.put_i16_le(version.maintenance());
}

fn put_string(buf: &mut BytesMut, value: Option<&str>) {
    match value {
        Some(s) => {
            buf.put_i8(TYPE_STRING);
            buf.put_i32_le(s.len() as i32);
            buf.put_slice(s.as_bytes());
        }
        None => buf.put_i8(TYPE_NULL),
    }
}

/// Bounds-checked reader over a message body.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                available: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_i8())
    }

    fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_i8()? != 0)
    }

    fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.ensure(2)?;
        Ok(self.buf.get_i16_le())
    }

    fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32_le())
    }

    fn read_version(&mut self) -> Result<ProtocolVersion, ProtocolError> {
        let major = self.read_i16()?;
        let minor = self.read_i16()?;
        let maintenance = self.read_i16()?;
        Ok(ProtocolVersion::new(major, minor, maintenance))
    }

    fn read_string(&mut self) -> Result<Option<String>, ProtocolError> {
        match self.read_i8()? {
            TYPE_NULL => Ok(None),
            TYPE_STRING => {
                let len = self.read_i32()?;
                if len < 0 {
                    return Err(ProtocolError::InvalidStringLength(len));
                }
                let len = len as usize;
                self.ensure(len)?;
                let (bytes, rest) = self.buf.split_at(len);
                self.buf = rest;
                let s = std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidUtf8)?;
                Ok(Some(s.to_string()))
            }
            tag => Err(ProtocolError::InvalidStringTag(tag)),
        }
    }
}
