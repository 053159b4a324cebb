//! SSH wire encoding primitives (RFC 4251 Section 5).
//!
//! Readers take the input slice plus a cursor that is advanced past every
//! field consumed. Any truncation yields [`SealError::MalformedInput`].
//!
//! Two big-endian integer encodings are exposed as separate functions:
//!
//! - [`to_signed_be_minimal`]: shortest two's-complement style form of a
//!   non-negative value (the `mpint` body). A `0x00` byte is prepended only
//!   when the top bit would otherwise be set.
//! - [`to_fixed_width_be`]: exactly `width` bytes, left padded with zeros and
//!   never trimmed.

use bytes::{BufMut, BytesMut};
use sealwire_platform::{SealError, SealResult};

/// Reads a single byte.
pub fn read_u8(data: &[u8], offset: &mut usize) -> SealResult<u8> {
    let byte = *data.get(*offset).ok_or_else(|| {
        SealError::MalformedInput(format!("Cannot read byte at offset {}", offset))
    })?;
    *offset += 1;
    Ok(byte)
}

/// Reads a big-endian `uint32`.
pub fn read_u32(data: &[u8], offset: &mut usize) -> SealResult<u32> {
    let end = offset.checked_add(4).filter(|end| *end <= data.len());
    let end = end.ok_or_else(|| {
        SealError::MalformedInput(format!("Cannot read uint32 at offset {}", offset))
    })?;

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&data[*offset..end]);
    *offset = end;
    Ok(u32::from_be_bytes(raw))
}

/// Reads a big-endian `uint64`.
pub fn read_u64(data: &[u8], offset: &mut usize) -> SealResult<u64> {
    let end = offset.checked_add(8).filter(|end| *end <= data.len());
    let end = end.ok_or_else(|| {
        SealError::MalformedInput(format!("Cannot read uint64 at offset {}", offset))
    })?;

    let mut raw = [0u8; 8];
    raw.copy_from_slice(&data[*offset..end]);
    *offset = end;
    Ok(u64::from_be_bytes(raw))
}

/// Reads a length-prefixed byte string and returns a borrowed slice.
pub fn read_slice<'a>(data: &'a [u8], offset: &mut usize) -> SealResult<&'a [u8]> {
    let length = read_u32(data, offset)? as usize;

    let end = offset.checked_add(length).filter(|end| *end <= data.len());
    let end = end.ok_or_else(|| {
        SealError::MalformedInput(format!(
            "Data truncated: expected {} bytes at offset {}",
            length, offset
        ))
    })?;

    let slice = &data[*offset..end];
    *offset = end;
    Ok(slice)
}

/// Reads a length-prefixed byte string.
pub fn read_bytes(data: &[u8], offset: &mut usize) -> SealResult<Vec<u8>> {
    read_slice(data, offset).map(<[u8]>::to_vec)
}

/// Reads a length-prefixed UTF-8 string.
pub fn read_string(data: &[u8], offset: &mut usize) -> SealResult<String> {
    let bytes = read_bytes(data, offset)?;
    String::from_utf8(bytes)
        .map_err(|_| SealError::MalformedInput("String contains invalid UTF-8".to_string()))
}

/// Reads an `mpint` and returns its unsigned big-endian magnitude.
///
/// Negative values are rejected; every integer carried by SSH keys and
/// signatures is non-negative. Zero is returned as an empty vector.
pub fn read_mpint(data: &[u8], offset: &mut usize) -> SealResult<Vec<u8>> {
    let raw = read_slice(data, offset)?;
    if raw.first().map_or(false, |b| b & 0x80 != 0) {
        return Err(SealError::MalformedInput(
            "Negative mpint where a non-negative value is required".to_string(),
        ));
    }
    Ok(strip_leading_zeros(raw).to_vec())
}

/// Writes a length-prefixed UTF-8 string.
pub fn write_string(buf: &mut BytesMut, s: &str) {
    write_bytes(buf, s.as_bytes());
}

/// Writes a length-prefixed byte string.
pub fn write_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Writes an unsigned big-endian magnitude as an `mpint`.
pub fn write_mpint(buf: &mut BytesMut, magnitude: &[u8]) {
    let trimmed = strip_leading_zeros(magnitude);
    if trimmed.is_empty() {
        buf.put_u32(0);
        return;
    }
    write_bytes(buf, &to_signed_be_minimal(trimmed));
}

/// Removes leading zero bytes from a big-endian magnitude.
pub fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Minimal signed-style big-endian encoding of a non-negative value.
///
/// Zero encodes as a single `0x00`.
pub fn to_signed_be_minimal(magnitude: &[u8]) -> Vec<u8> {
    let trimmed = strip_leading_zeros(magnitude);
    match trimmed.first() {
        None => vec![0],
        Some(top) if top & 0x80 != 0 => {
            let mut out = Vec::with_capacity(trimmed.len() + 1);
            out.push(0);
            out.extend_from_slice(trimmed);
            out
        }
        Some(_) => trimmed.to_vec(),
    }
}

/// Fixed-width unsigned big-endian encoding, left padded with zeros.
///
/// Fails when the value needs more than `width` bytes.
pub fn to_fixed_width_be(magnitude: &[u8], width: usize) -> SealResult<Vec<u8>> {
    let trimmed = strip_leading_zeros(magnitude);
    if trimmed.len() > width {
        return Err(SealError::MalformedInput(format!(
            "Integer of {} bytes does not fit in {} bytes",
            trimmed.len(),
            width
        )));
    }

    let mut out = vec![0u8; width];
    out[width - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}
