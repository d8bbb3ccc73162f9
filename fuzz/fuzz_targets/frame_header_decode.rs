//! Fuzz target for FrameHeader::from_bytes
//!
//! Decrypted frame headers are attacker-influenced once a frame key leaks or
//! a peer misbehaves, so parsing must hold up on arbitrary bytes.
//!
//! # Invariants
//!
//! - Never panics
//! - Accepted headers never declare more than MAX_PAYLOAD_LENGTH bytes
//! - Accepted headers re-encode to the bytes they were parsed from

#![no_main]

use hedgerow_transport::{FrameHeader, constants::MAX_PAYLOAD_LENGTH};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(header) = FrameHeader::from_bytes(data) else {
        return;
    };

    assert!(header.body_length() <= MAX_PAYLOAD_LENGTH);
    assert_eq!(header.to_bytes(), data[..FrameHeader::SIZE]);

    let rebuilt =
        FrameHeader::new(header.payload_length(), header.padding_length(), header.is_final());
    assert_eq!(rebuilt.ok().as_ref(), Some(header));
});
