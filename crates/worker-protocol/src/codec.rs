//! Wire primitives for worker payloads.
//!
//! Layout rules (all integers big-endian):
//! - `bool`: 1 byte, 0 or 1
//! - string: `u16` length followed by UTF-8 bytes
//! - optional: 1 presence byte (0 or 1) followed by the value when present
//! - vector: `u16` element count followed by the elements
//! - blob: `u32` length followed by raw bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Error type for codec operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Insufficient data to decode
    #[error("Insufficient data")]
    InsufficientData,

    /// String field is not valid UTF-8
    #[error("Invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// A tag value selecting a variant is not recognized
    #[error("Unknown discriminant for {field}: {value}")]
    UnknownDiscriminant {
        /// Field carrying the discriminant
        field: &'static str,
        /// Raw value found on the wire
        value: u8,
    },

    /// A field required by the selected variant is absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Value does not fit the wire representation
    #[error("Field too long: {0}")]
    FieldTooLong(&'static str),
}

/// Decode a value from the front of a buffer.
pub trait WireDecode: Sized {
    /// Consume the encoded value from `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is truncated or holds an invalid value.
    fn decode(buf: &mut Bytes) -> Result<Self, CodecError>;
}

/// Encode a value onto the end of a buffer.
pub trait WireEncode {
    /// Append the encoded value to `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if a length does not fit its wire prefix.
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;
}

fn ensure(buf: &Bytes, len: usize) -> Result<(), CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::InsufficientData);
    }
    Ok(())
}

pub(crate) fn get_u8(buf: &mut Bytes) -> Result<u8, CodecError> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u16(buf: &mut Bytes) -> Result<u16, CodecError> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub(crate) fn get_u32(buf: &mut Bytes) -> Result<u32, CodecError> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub(crate) fn get_u64(buf: &mut Bytes) -> Result<u64, CodecError> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

pub(crate) fn get_f32(buf: &mut Bytes) -> Result<f32, CodecError> {
    ensure(buf, 4)?;
    Ok(buf.get_f32())
}

pub(crate) fn get_bool(buf: &mut Bytes, field: &'static str) -> Result<bool, CodecError> {
    match get_u8(buf)? {
        0 => Ok(false),
        1 => Ok(true),
        value => Err(CodecError::UnknownDiscriminant { field, value }),
    }
}

pub(crate) fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String, CodecError> {
    let len = usize::from(get_u16(buf)?);
    ensure(buf, len)?;
    let raw = buf.copy_to_bytes(len);
    String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8(field))
}

pub(crate) fn get_blob(buf: &mut Bytes) -> Result<Bytes, CodecError> {
    let len = usize::try_from(get_u32(buf)?).map_err(|_| CodecError::InsufficientData)?;
    ensure(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

pub(crate) fn get_optional<T>(
    buf: &mut Bytes,
    field: &'static str,
    read: impl FnOnce(&mut Bytes) -> Result<T, CodecError>,
) -> Result<Option<T>, CodecError> {
    if get_bool(buf, field)? {
        read(buf).map(Some)
    } else {
        Ok(None)
    }
}

pub(crate) fn get_vec<T>(
    buf: &mut Bytes,
    mut read: impl FnMut(&mut Bytes) -> Result<T, CodecError>,
) -> Result<Vec<T>, CodecError> {
    let count = usize::from(get_u16(buf)?);
    // Each element takes at least one byte, so never trust count beyond what is buffered.
    let mut items = Vec::with_capacity(count.min(buf.remaining()));
    for _ in 0..count {
        items.push(read(buf)?);
    }
    Ok(items)
}

pub(crate) fn put_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(u8::from(value));
}

pub(crate) fn put_string(
    buf: &mut BytesMut,
    field: &'static str,
    value: &str,
) -> Result<(), CodecError> {
    let len = u16::try_from(value.len()).map_err(|_| CodecError::FieldTooLong(field))?;
    buf.put_u16(len);
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

pub(crate) fn put_blob(
    buf: &mut BytesMut,
    field: &'static str,
    value: &[u8],
) -> Result<(), CodecError> {
    let len = u32::try_from(value.len()).map_err(|_| CodecError::FieldTooLong(field))?;
    buf.put_u32(len);
    buf.extend_from_slice(value);
    Ok(())
}

pub(crate) fn put_optional<T>(
    buf: &mut BytesMut,
    value: Option<&T>,
    write: impl FnOnce(&mut BytesMut, &T) -> Result<(), CodecError>,
) -> Result<(), CodecError>
where
    T: ?Sized,
{
    match value {
        Some(inner) => {
            put_bool(buf, true);
            write(buf, inner)
        }
        None => {
            put_bool(buf, false);
            Ok(())
        }
    }
}

pub(crate) fn put_vec<T>(
    buf: &mut BytesMut,
    field: &'static str,
    items: &[T],
    mut write: impl FnMut(&mut BytesMut, &T) -> Result<(), CodecError>,
) -> Result<(), CodecError> {
    let count = u16::try_from(items.len()).map_err(|_| CodecError::FieldTooLong(field))?;
    buf.put_u16(count);
    for item in items {
        write(buf, item)?;
    }
    Ok(())
}
