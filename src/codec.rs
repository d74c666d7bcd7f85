//! Binary wire codec
//!
//! Values are encoded positionally: enums as little-endian `u32`, strings
//! as a `u32` byte length followed by UTF-8 bytes. On the socket every
//! encoded value is wrapped in a frame, `[payload_len: u32 LE][payload]`,
//! so a reader can reassemble values that straddle reads.

use std::fmt;
use std::marker::PhantomData;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{CodecError, DecodeError};
use crate::message::{Request, Response};
use crate::types::{CommandKind, ResponseKind};

/// Default upper bound on a frame payload.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 64 * 1024;

const HEADER_LEN: usize = 4;

/// Positional binary encoding of a single value (no outer frame)
pub trait WireFormat: Sized {
    /// Append the encoding of `self` to `dst`
    fn encode(&self, dst: &mut BytesMut);

    /// Decode a value that occupies all of `src`
    fn decode(src: &[u8]) -> Result<Self, DecodeError>;

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

fn put_string(dst: &mut BytesMut, value: &str) {
    dst.put_u32_le(value.len() as u32);
    dst.put_slice(value.as_bytes());
}

/// Cursor over a payload that reports truncation instead of panicking
struct FieldReader<'a> {
    buf: &'a [u8],
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32_le())
    }

    fn string(&mut self) -> Result<String, DecodeError> {
        let len = self.u32()? as usize;
        self.ensure(len)?;
        let (bytes, rest) = self.buf.split_at(len);
        self.buf = rest;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
    }

    fn finish(self) -> Result<(), DecodeError> {
        match self.buf.len() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

impl WireFormat for Request {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.kind.into());
        dst.put_u32_le(CommandKind::to_wire(self.command));
        dst.put_u32_le(self.status.into());
        put_string(dst, &self.sender);
        put_string(dst, &self.receiver);
        put_string(dst, &self.content);
    }

    fn decode(src: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(src);
        let req = Request {
            kind: reader.u32()?.into(),
            command: CommandKind::from_wire(reader.u32()?),
            status: reader.u32()?.into(),
            sender: reader.string()?,
            receiver: reader.string()?,
            content: reader.string()?,
            origin: String::new(),
        };
        reader.finish()?;
        Ok(req)
    }
}

impl WireFormat for Response {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.kind.into());
        put_string(dst, &self.sender);
        put_string(dst, &self.receiver);
        put_string(dst, &self.content);
    }

    fn decode(src: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = FieldReader::new(src);
        let res = Response {
            kind: ResponseKind::try_from(reader.u32()?)?,
            sender: reader.string()?,
            receiver: reader.string()?,
            content: reader.string()?,
        };
        reader.finish()?;
        Ok(res)
    }
}

/// Length-prefixed frame codec
///
/// Decodes frames into `D` and encodes `E` into frames. The server side
/// reads requests and writes responses; the client the opposite.
///
/// `max_frame_length` bounds incoming frames only. Outgoing frames are
/// limited by what the `u32` header can express.
pub struct FrameCodec<D, E> {
    max_frame_length: usize,
    _marker: PhantomData<fn() -> (D, E)>,
}

/// Server side: requests in, responses out
pub type ServerCodec = FrameCodec<Request, Response>;

/// Client side: responses in, requests out
pub type ClientCodec = FrameCodec<Response, Request>;

impl<D, E> FrameCodec<D, E> {
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            max_frame_length,
            _marker: PhantomData,
        }
    }

    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }
}

impl<D, E> Default for FrameCodec<D, E> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}

impl<D, E> Clone for FrameCodec<D, E> {
    fn clone(&self) -> Self {
        Self::new(self.max_frame_length)
    }
}

impl<D, E> fmt::Debug for FrameCodec<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameCodec")
            .field("max_frame_length", &self.max_frame_length)
            .finish()
    }
}

impl<D: WireFormat, E> Decoder for FrameCodec<D, E> {
    type Item = D;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        let length = (&src[..HEADER_LEN]).get_u32_le() as usize;
        if length > self.max_frame_length {
            return Err(CodecError::FrameTooLarge {
                length,
                max: self.max_frame_length,
            });
        }

        let frame_len = HEADER_LEN + length;
        if src.len() < frame_len {
            // Wait for the rest of the frame.
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(length);
        Ok(Some(D::decode(&payload)?))
    }
}

impl<D, E: WireFormat> Encoder<E> for FrameCodec<D, E> {
    type Error = CodecError;

    fn encode(&mut self, item: E, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let start = dst.len();
        dst.put_u32_le(0);
        item.encode(dst);

        let length = dst.len() - start - HEADER_LEN;
        let Ok(header) = u32::try_from(length) else {
            dst.truncate(start);
            return Err(CodecError::FrameTooLarge {
                length,
                max: u32::MAX as usize,
            });
        };

        dst[start..start + HEADER_LEN].copy_from_slice(&header.to_le_bytes());
        Ok(())
    }
}
