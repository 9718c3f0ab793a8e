//! Primitive encoders and decoders over `bytes` buffers.

use bytes::{Buf, BufMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;

use crate::rules::{is_valid_key, Rule, MAX_KEY_LEN};

/// Errors produced while decoding a wire message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before a field was complete
    #[error("unexpected end of buffer")]
    UnexpectedEnd,

    /// A string exceeded its field limit
    #[error("string of {len} bytes exceeds limit of {max}")]
    StringTooLong { len: usize, max: usize },

    /// A string was not valid UTF-8
    #[error("string is not valid utf-8")]
    InvalidUtf8,

    /// A rule arrived with an empty key
    #[error("rule key is empty")]
    EmptyKey,

    /// Address family byte was neither 4 nor 6
    #[error("unknown address family {0}")]
    UnknownAddressFamily(u8),
}

pub(crate) type Result<T> = std::result::Result<T, DecodeError>;

/// Encoding and decoding of fixed wire primitives
pub(crate) trait Codec: Sized {
    /// Decode a `Self` from the buffer, if enough bytes remain
    fn decode<B: Buf>(buf: &mut B) -> Result<Self>;
    /// Append the encoding of `self` to the buffer
    fn encode<B: BufMut>(&self, buf: &mut B);
}

macro_rules! int_codec {
    ($ty:ty, $get:ident, $put:ident) => {
        impl Codec for $ty {
            fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
                if buf.remaining() < std::mem::size_of::<$ty>() {
                    return Err(DecodeError::UnexpectedEnd);
                }
                Ok(buf.$get())
            }
            fn encode<B: BufMut>(&self, buf: &mut B) {
                buf.$put(*self);
            }
        }
    };
}

int_codec!(u8, get_u8, put_u8);
int_codec!(u16, get_u16, put_u16);
int_codec!(u64, get_u64, put_u64);
int_codec!(i32, get_i32, put_i32);

const FAMILY_V4: u8 = 4;
const FAMILY_V6: u8 = 6;

impl Codec for SocketAddr {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let ip = match u8::decode(buf)? {
            FAMILY_V4 => {
                let mut octets = [0; 4];
                take(buf, &mut octets)?;
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            FAMILY_V6 => {
                let mut octets = [0; 16];
                take(buf, &mut octets)?;
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            other => return Err(DecodeError::UnknownAddressFamily(other)),
        };
        let port = u16::decode(buf)?;
        Ok(Self::new(ip, port))
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        match self.ip() {
            IpAddr::V4(ip) => {
                buf.put_u8(FAMILY_V4);
                buf.put_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                buf.put_u8(FAMILY_V6);
                buf.put_slice(&ip.octets());
            }
        }
        buf.put_u16(self.port());
    }
}

const FLAG_TEXT: u8 = 0b01;
const FLAG_INT: u8 = 0b10;

impl Codec for Rule {
    fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        let key = get_str(buf, MAX_KEY_LEN)?;
        if !is_valid_key(&key) {
            return Err(DecodeError::EmptyKey);
        }
        let flags = u8::decode(buf)?;
        let text = if flags & FLAG_TEXT == 0 {
            None
        } else {
            Some(get_str(buf, usize::from(u16::MAX))?)
        };
        let int = if flags & FLAG_INT == 0 {
            None
        } else {
            Some(i32::decode(buf)?)
        };
        Ok(Self { key, text, int })
    }

    fn encode<B: BufMut>(&self, buf: &mut B) {
        put_str(buf, &self.key);
        let mut flags = 0;
        if self.text.is_some() {
            flags |= FLAG_TEXT;
        }
        if self.int.is_some() {
            flags |= FLAG_INT;
        }
        buf.put_u8(flags);
        if let Some(text) = &self.text {
            put_str(buf, text);
        }
        if let Some(int) = self.int {
            buf.put_i32(int);
        }
    }
}

fn take<B: Buf>(buf: &mut B, out: &mut [u8]) -> Result<()> {
    if buf.remaining() < out.len() {
        return Err(DecodeError::UnexpectedEnd);
    }
    buf.copy_to_slice(out);
    Ok(())
}

/// Read a `u16`-length-prefixed UTF-8 string of at most `max` bytes
pub(crate) fn get_str<B: Buf>(buf: &mut B, max: usize) -> Result<String> {
    let len = usize::from(u16::decode(buf)?);
    if len > max {
        return Err(DecodeError::StringTooLong { len, max });
    }
    let mut bytes = vec![0; len];
    take(buf, &mut bytes)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

/// Write a `u16`-length-prefixed string, truncating on a char boundary if needed
pub(crate) fn put_str<B: BufMut>(buf: &mut B, value: &str) {
    let mut end = value.len().min(usize::from(u16::MAX));
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let bytes = &value.as_bytes()[..end];
    // end <= u16::MAX by construction
    buf.put_u16(u16::try_from(bytes.len()).unwrap_or(u16::MAX));
    buf.put_slice(bytes);
}
