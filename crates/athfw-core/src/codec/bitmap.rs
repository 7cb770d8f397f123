//! Feature bitmap encoding.
//!
//! Bit N lives in byte N / 8, LSB first. Trailing zero bytes are stripped
//! so the encoded value is as short as possible.

use std::collections::BTreeSet;

use crate::error::{CodecError, Result};

/// Encode a set of feature indices. Every index must be below `count`.
pub fn encode_bitmap(indices: &BTreeSet<usize>, count: usize) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; count / 8 + 1];

    for &index in indices {
        if index >= count {
            return Err(CodecError::InvalidValue {
                field: "features",
                message: format!("feature index {index} out of range (max {count})"),
            });
        }
        bytes[index / 8] |= 1 << (index % 8);
    }

    while bytes.last() == Some(&0) {
        bytes.pop();
    }

    Ok(bytes)
}

/// Decode a bitmap into the set of enabled indices.
pub fn decode_bitmap(bytes: &[u8]) -> BTreeSet<usize> {
    bytes
        .iter()
        .enumerate()
        .flat_map(|(i, &byte)| {
            (0..8)
                .filter(move |bit| byte & (1 << bit) != 0)
                .map(move |bit| i * 8 + bit)
        })
        .collect()
}
