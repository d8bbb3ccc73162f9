//! Stream tags
//!
//! A tag is the first thing on the wire. It looks random to anyone without
//! the tag key, while the intended receiver recognises it by computing tags
//! for every stream number it expects.

use hedgerow_crypto::{SecretKey, primitives::prf};

use crate::constants::TAG_LENGTH;

/// Pseudorandom stream marker.
pub type Tag = [u8; TAG_LENGTH];

/// Compute the tag for `stream_number`.
///
/// `PRF(tag_key, protocol_version:u16 ‖ stream_number:u64)`, truncated to
/// [`TAG_LENGTH`] bytes.
pub fn encode_tag(tag_key: &SecretKey, protocol_version: u16, stream_number: u64) -> Tag {
    let mut input = [0u8; 10];
    input[..2].copy_from_slice(&protocol_version.to_be_bytes());
    input[2..].copy_from_slice(&stream_number.to_be_bytes());

    let mut tag = [0u8; TAG_LENGTH];
    tag.copy_from_slice(&prf(tag_key, &input)[..TAG_LENGTH]);
    tag
}
