//! Signature and element (IE) framing.
//!
//! Layout of a container:
//!
//! ```text
//! signature || 0x00 || pad-to-4 || element*
//! element = type_id (i32 LE) || length (i32 LE) || value || pad-to-4
//! ```
//!
//! Padding bytes carry the family's magic value, never zero.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use super::constants::ContainerFormat;
use crate::error::{CodecError, Result};

/// Size of the `(type_id, length)` element header.
pub const ELEMENT_HEADER_LEN: usize = 8;

/// One framed element borrowed from a decoded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawElement<'a> {
    pub type_id: i32,
    /// Offset of the element header within the buffer.
    pub offset: usize,
    pub value: &'a [u8],
}

/// Number of bytes needed to bring `len` to a multiple of 4.
pub fn padding_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

fn write_padding(buf: &mut Vec<u8>, count: usize, magic: u8) {
    buf.extend(std::iter::repeat_n(magic, count));
}

/// Write `signature || NUL` plus padding. Returns the next offset.
pub fn write_signature(buf: &mut Vec<u8>, format: &ContainerFormat) -> usize {
    buf.extend_from_slice(format.signature);
    buf.push(0);
    let pad = padding_len(format.signature.len() + 1);
    write_padding(buf, pad, format.padding);
    buf.len()
}

/// Check the leading signature and return the offset of the first element.
pub fn read_signature(data: &[u8], format: &ContainerFormat) -> Result<usize> {
    let sig_len = format.signature.len() + 1;

    if data.len() < sig_len
        || &data[..format.signature.len()] != format.signature
        || data[format.signature.len()] != 0
    {
        return Err(CodecError::BadSignature {
            expected: format.signature_str(),
        });
    }

    let offset = sig_len + padding_len(sig_len);
    if offset > data.len() {
        return Err(CodecError::Truncated {
            offset: sig_len,
            needed: offset - sig_len,
            available: data.len() - sig_len,
        });
    }

    Ok(offset)
}

/// Append one element to `buf`. Returns the next offset.
///
/// `value` must be shorter than `i32::MAX`; container encoders guarantee this
/// by checking sizes with [`push_element`] or [`check_capacity`] first.
pub fn write_element(buf: &mut Vec<u8>, type_id: i32, value: &[u8], padding: u8) -> usize {
    let len = value.len() as i32;
    buf.extend_from_slice(&type_id.to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value);
    write_padding(buf, padding_len(value.len()), padding);
    buf.len()
}

/// Encoded size of an element carrying `value_len` bytes.
pub fn element_len(value_len: usize) -> usize {
    ELEMENT_HEADER_LEN + value_len + padding_len(value_len)
}

/// Fail with a capacity error if a container would grow to `size` bytes.
pub fn check_capacity(size: usize, format: &ContainerFormat) -> Result<()> {
    if size > format.max_len {
        return Err(CodecError::Capacity {
            size,
            max: format.max_len,
        });
    }
    Ok(())
}

/// Append one element, failing before anything is written if the container
/// would exceed its maximum size.
pub fn push_element(
    buf: &mut Vec<u8>,
    type_id: i32,
    value: &[u8],
    format: &ContainerFormat,
) -> Result<usize> {
    check_capacity(buf.len() + element_len(value.len()), format)?;
    Ok(write_element(buf, type_id, value, format.padding))
}

/// Read the elements in `data[offset..offset + total_len]`.
///
/// A header whose declared length runs past the scope is a format error.
/// Missing padding after the final element is tolerated.
pub fn read_elements(data: &[u8], offset: usize, total_len: usize) -> Result<Vec<RawElement<'_>>> {
    let available = data.len().saturating_sub(offset);
    if total_len > available {
        return Err(CodecError::Truncated {
            offset,
            needed: total_len,
            available,
        });
    }

    let mut elements = Vec::new();
    let mut pos = offset;
    let mut remaining = total_len;

    while remaining > 0 {
        if remaining < ELEMENT_HEADER_LEN {
            return Err(CodecError::Truncated {
                offset: pos,
                needed: ELEMENT_HEADER_LEN,
                available: remaining,
            });
        }

        let mut cursor = Cursor::new(&data[pos..pos + ELEMENT_HEADER_LEN]);
        let type_id = cursor.read_i32::<LittleEndian>()?;
        let length = cursor.read_i32::<LittleEndian>()?;

        let body_remaining = remaining - ELEMENT_HEADER_LEN;
        let value_len = usize::try_from(length).ok().filter(|&l| l <= body_remaining);
        let Some(value_len) = value_len else {
            return Err(CodecError::LengthOverrun {
                offset: pos,
                type_id,
                length,
                remaining: body_remaining,
            });
        };

        let start = pos + ELEMENT_HEADER_LEN;
        elements.push(RawElement {
            type_id,
            offset: pos,
            value: &data[start..start + value_len],
        });

        let consumed = element_len(value_len).min(remaining);
        pos += consumed;
        remaining -= consumed;
    }

    Ok(elements)
}

/// Read a 4-byte little-endian integer element value.
pub fn read_u32_value(value: &[u8], field: &'static str) -> Result<u32> {
    if value.len() != 4 {
        return Err(CodecError::InvalidValue {
            field,
            message: format!("expected 4 bytes, got {}", value.len()),
        });
    }
    Ok(Cursor::new(value).read_u32::<LittleEndian>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::constants::{ATH10K_BOARD, ATH10K_FIRMWARE, ATH11K_FIRMWARE};

    #[test]
    fn test_signature_roundtrip() {
        let mut buf = Vec::new();
        let next = write_signature(&mut buf, &ATH10K_BOARD);
        // 16 bytes + NUL, padded to 20
        assert_eq!(next, 20);
        assert_eq!(&buf[16..20], &[0x00, 0x6D, 0x6D, 0x6D]);
        assert_eq!(read_signature(&buf, &ATH10K_BOARD).unwrap(), 20);
    }

    #[test]
    fn test_signature_padding_magic() {
        let mut buf = Vec::new();
        write_signature(&mut buf, &ATH11K_FIRMWARE);
        assert_eq!(buf.len(), 16);
        assert_eq!(buf[14], 0);
        assert_eq!(buf[15], 0x77);

        let mut buf = Vec::new();
        write_signature(&mut buf, &ATH10K_FIRMWARE);
        assert_eq!(buf.len(), 12);
        assert_eq!(buf[11], 0x6D);
    }

    #[test]
    fn test_signature_rejects_corruption() {
        let mut buf = Vec::new();
        write_signature(&mut buf, &ATH10K_BOARD);

        for i in 0..17 {
            let mut bad = buf.clone();
            bad[i] ^= 0x01;
            let err = read_signature(&bad, &ATH10K_BOARD).unwrap_err();
            assert!(err.is_format(), "byte {i}: {err}");
        }
    }

    #[test]
    fn test_signature_rejects_truncation() {
        let mut buf = Vec::new();
        write_signature(&mut buf, &ATH10K_BOARD);
        for len in 0..buf.len() {
            assert!(read_signature(&buf[..len], &ATH10K_BOARD).is_err());
        }
    }

    #[test]
    fn test_element_padding_invariant() {
        for len in 0..13 {
            let value = vec![0xAB; len];
            let mut buf = Vec::new();
            let next = write_element(&mut buf, 3, &value, 0x6D);
            let pad = next - ELEMENT_HEADER_LEN - len;
            assert!(pad <= 3);
            assert_eq!(next % 4, 0);
            assert!(buf[ELEMENT_HEADER_LEN + len..].iter().all(|&b| b == 0x6D));
        }
    }

    #[test]
    fn test_element_layout() {
        let mut buf = Vec::new();
        write_element(&mut buf, 2, b"abcde", 0x6D);
        assert_eq!(
            buf,
            [2, 0, 0, 0, 5, 0, 0, 0, b'a', b'b', b'c', b'd', b'e', 0x6D, 0x6D, 0x6D]
        );
    }

    #[test]
    fn test_push_element_checks_capacity_first() {
        let mut buf = Vec::new();
        write_signature(&mut buf, &ATH10K_FIRMWARE);

        let fits = vec![0u8; ATH10K_FIRMWARE.max_len - buf.len() - ELEMENT_HEADER_LEN];
        let too_big = vec![0u8; fits.len() + 1];

        let err = push_element(&mut buf, 3, &too_big, &ATH10K_FIRMWARE).unwrap_err();
        assert!(matches!(err, CodecError::Capacity { max: 2_000_000, .. }));
        assert_eq!(buf.len(), 12);

        let next = push_element(&mut buf, 3, &fits, &ATH10K_FIRMWARE).unwrap();
        assert_eq!(next, ATH10K_FIRMWARE.max_len);
    }

    #[test]
    fn test_read_elements() {
        let mut buf = Vec::new();
        write_element(&mut buf, 0, b"name", 0x6D);
        write_element(&mut buf, 1, b"", 0x6D);
        write_element(&mut buf, 7, b"xyz", 0x6D);

        let elements = read_elements(&buf, 0, buf.len()).unwrap();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].value, b"name");
        assert_eq!(elements[1].value, b"");
        assert_eq!(elements[2].type_id, 7);
        assert_eq!(elements[2].offset, 20);
        assert_eq!(elements[2].value, b"xyz");
    }

    #[test]
    fn test_read_elements_rejects_overrun() {
        let mut buf = Vec::new();
        write_element(&mut buf, 0, b"12345678", 0x6D);
        buf[4] = 9;
        let err = read_elements(&buf, 0, buf.len()).unwrap_err();
        assert!(matches!(err, CodecError::LengthOverrun { length: 9, .. }));
    }

    #[test]
    fn test_read_elements_rejects_negative_length() {
        let mut buf = Vec::new();
        write_element(&mut buf, 0, b"1234", 0x6D);
        buf[4..8].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(read_elements(&buf, 0, buf.len()).is_err());
    }

    #[test]
    fn test_read_elements_rejects_short_header() {
        let mut buf = Vec::new();
        write_element(&mut buf, 0, b"1234", 0x6D);
        buf.extend_from_slice(&[0, 0, 0]);
        let err = read_elements(&buf, 0, buf.len()).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }

    #[test]
    fn test_read_elements_scope_past_buffer() {
        let buf = [0u8; 8];
        assert!(read_elements(&buf, 4, 8).is_err());
    }

    #[test]
    fn test_read_u32_value() {
        assert_eq!(read_u32_value(&0x1234_5678u32.to_le_bytes(), "ts").unwrap(), 0x1234_5678);
        assert!(read_u32_value(&[1, 2, 3], "ts").is_err());
    }
}
