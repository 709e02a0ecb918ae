//! # MQTT Serialization Utilities
//!
//! Helpers for reading and writing MQTT-specific data types from and to byte
//! buffers: variable-byte integers, length-prefixed strings and big-endian
//! packet identifiers.

use crate::error::{CodecError, ProtocolError};

/// Largest value a variable-byte integer can carry (four bytes).
pub const MAX_REMAINING_LENGTH: usize = 268_435_455;

/// Reads a variable-byte integer starting at `start`.
///
/// Returns the value and the number of bytes it occupied, or `None` when the
/// buffer ends before the integer does. This is how packet lengths are framed
/// while bytes are still arriving.
pub fn read_variable_byte_integer(
    buf: &[u8],
    start: usize,
) -> Result<Option<(usize, usize)>, ProtocolError> {
    let mut multiplier = 1;
    let mut value = 0;
    for i in 0..4 {
        let Some(encoded_byte) = buf.get(start + i) else {
            return Ok(None);
        };
        value += (encoded_byte & 127) as usize * multiplier;
        if (encoded_byte & 128) == 0 {
            return Ok(Some((value, i + 1)));
        }
        multiplier *= 128;
    }
    Err(ProtocolError::MalformedPacket)
}

/// Writes a variable-byte integer to the start of `buf`, returning the byte count.
pub fn write_variable_byte_integer(buf: &mut [u8], mut val: usize) -> Result<usize, CodecError> {
    if val > MAX_REMAINING_LENGTH {
        return Err(CodecError::Protocol(ProtocolError::PayloadTooLarge));
    }
    let mut i = 0;
    loop {
        let mut encoded_byte = (val % 128) as u8;
        val /= 128;
        if val > 0 {
            encoded_byte |= 128;
        }
        *buf.get_mut(i).ok_or(CodecError::BufferTooSmall)? = encoded_byte;
        i += 1;
        if val == 0 {
            break;
        }
    }
    Ok(i)
}

/// Writes a UTF-8 string prefixed with its 2-byte length, returning the byte count.
pub fn write_utf8_string(buf: &mut [u8], s: &str) -> Result<usize, CodecError> {
    write_binary(buf, s.as_bytes())
}

/// Writes binary data prefixed with its 2-byte length, returning the byte count.
pub fn write_binary(buf: &mut [u8], data: &[u8]) -> Result<usize, CodecError> {
    let len = u16::try_from(data.len())
        .map_err(|_| CodecError::Protocol(ProtocolError::PayloadTooLarge))?;

    let required_space = 2 + data.len();
    let slice = buf
        .get_mut(0..required_space)
        .ok_or(CodecError::BufferTooSmall)?;

    slice[0..2].copy_from_slice(&len.to_be_bytes());
    slice[2..].copy_from_slice(data);
    Ok(required_space)
}

/// Reads a big-endian `u16` at `*cursor`, advancing the cursor.
pub fn read_u16(cursor: &mut usize, buf: &[u8]) -> Result<u16, ProtocolError> {
    let bytes = buf
        .get(*cursor..*cursor + 2)
        .ok_or(ProtocolError::MalformedPacket)?;
    *cursor += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Length of the first complete packet in `buf`, or `None` if more bytes are needed.
pub fn frame_length(buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
    if buf.is_empty() {
        return Ok(None);
    }
    match read_variable_byte_integer(buf, 1)? {
        Some((remaining, len_bytes)) => {
            let total = 1 + len_bytes + remaining;
            Ok((buf.len() >= total).then_some(total))
        }
        None => Ok(None),
    }
}
