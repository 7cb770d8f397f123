//! Container codec - signature and element framing shared by all families.

pub mod bitmap;
pub mod constants;
pub mod framing;

pub use bitmap::{decode_bitmap, encode_bitmap};
pub use constants::*;
pub use framing::{
    ELEMENT_HEADER_LEN, RawElement, check_capacity, element_len, padding_len, push_element,
    read_elements, read_signature, read_u32_value, write_element, write_signature,
};
