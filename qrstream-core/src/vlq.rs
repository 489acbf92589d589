//! Variable-length quantity (VLQ) codec
//!
//! Every field on the wire is a triple: one decimal digit giving the number of
//! digits of the length, the length in decimal, then the raw value. The string
//! `"in.txt"` encodes as `"16in.txt"` and the number `42` as `"1242"`.
//!
//! Lengths count bytes. All fields produced by qrstream are ASCII, so this is
//! the same as counting characters.

use crate::constants::{decimal_digits, MAX_LENGTH_DIGITS};
use crate::error::FrameError;
use bytes::{BufMut, Bytes, BytesMut};

/// A decoded VLQ field borrowing its value from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    /// Announced (and actual) length of the value
    pub length: usize,

    /// The value bytes
    pub value: &'a [u8],

    /// Offset of the first byte after the field
    pub next: usize,
}

/// Append the length prefix (digit count + length) for a value of `length` bytes
pub fn put_length_prefix(buf: &mut BytesMut, length: usize) -> Result<(), FrameError> {
    let length_digits = decimal_digits(length);
    if length_digits > MAX_LENGTH_DIGITS {
        return Err(FrameError::LengthTooLong(length));
    }

    buf.put_u8(b'0' + length_digits as u8);
    buf.put_slice(length.to_string().as_bytes());
    Ok(())
}

/// Append a byte string as a VLQ field
pub fn put_bytes(buf: &mut BytesMut, value: &[u8]) -> Result<(), FrameError> {
    put_length_prefix(buf, value.len())?;
    buf.put_slice(value);
    Ok(())
}

/// Append a non-negative integer as a VLQ field (value in decimal)
pub fn put_uint(buf: &mut BytesMut, value: u64) -> Result<(), FrameError> {
    put_bytes(buf, value.to_string().as_bytes())
}

/// Encode a byte string as a standalone VLQ field
pub fn encode_bytes(value: &[u8]) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::with_capacity(value.len() + 1 + MAX_LENGTH_DIGITS);
    put_bytes(&mut buf, value)?;
    Ok(buf.freeze())
}

/// Encode an integer as a standalone VLQ field
pub fn encode_uint(value: u64) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::new();
    put_uint(&mut buf, value)?;
    Ok(buf.freeze())
}

/// Decode only the length prefix of the field starting at `from`
///
/// Returns the announced length and the offset where the value starts. The
/// value itself does not need to be present, which lets a receiver learn the
/// size of a payload before all of its bytes have arrived.
pub fn decode_length(data: &[u8], from: usize) -> Result<(usize, usize), FrameError> {
    let digit_count = match data.get(from) {
        None => {
            return Err(FrameError::TruncatedValue {
                expected: 1,
                actual: 0,
            })
        }
        Some(b) if b.is_ascii_digit() => (b - b'0') as usize,
        Some(b) => {
            return Err(FrameError::MalformedLength(format!(
                "length of length {:?} at offset {} is not a digit",
                *b as char, from
            )))
        }
    };

    let start = from + 1;
    let end = start + digit_count;
    if end > data.len() {
        return Err(FrameError::TruncatedValue {
            expected: digit_count,
            actual: data.len() - start,
        });
    }

    let length = parse_decimal(&data[start..end]).ok_or_else(|| {
        FrameError::MalformedLength(format!(
            "length {:?} at offset {} is not a number",
            String::from_utf8_lossy(&data[start..end]),
            start
        ))
    })?;

    Ok((length as usize, end))
}

/// Decode the VLQ field starting at `from`
pub fn decode(data: &[u8], from: usize) -> Result<Field<'_>, FrameError> {
    let (length, start) = decode_length(data, from)?;

    let available = data.len() - start;
    if length > available {
        return Err(FrameError::TruncatedValue {
            expected: length,
            actual: available,
        });
    }

    let next = start + length;
    Ok(Field {
        length,
        value: &data[start..next],
        next,
    })
}

/// Decode a VLQ field holding a decimal integer
///
/// Returns the integer and the offset of the next field.
pub fn decode_uint(data: &[u8], from: usize) -> Result<(u64, usize), FrameError> {
    let field = decode(data, from)?;
    if field.value.is_empty() {
        return Err(FrameError::InvalidStructure(format!(
            "empty number at offset {}",
            from
        )));
    }

    let value = parse_decimal(field.value).ok_or_else(|| {
        FrameError::InvalidStructure(format!(
            "{:?} at offset {} is not a number",
            String::from_utf8_lossy(field.value),
            from
        ))
    })?;

    Ok((value, field.next))
}

/// Parse ASCII decimal digits; an empty slice is zero
fn parse_decimal(digits: &[u8]) -> Option<u64> {
    digits.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add(u64::from(b - b'0'))
    })
}
