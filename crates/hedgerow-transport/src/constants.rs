//! Wire constants
//!
//! Every value here is part of the interop contract. Changing one breaks
//! compatibility with every peer that has not changed it too.

use std::time::Duration;

pub use hedgerow_crypto::{MAC_LENGTH, NONCE_LENGTH, SECRET_KEY_LENGTH};

/// Protocol version mixed into every stream tag.
pub const PROTOCOL_VERSION: u16 = 4;

/// Length of the pseudorandom tag that prefixes a stream.
pub const TAG_LENGTH: usize = 16;

/// Length of the random IV at the start of the stream header.
pub const STREAM_HEADER_IV_LENGTH: usize = 16;

/// Stream header: IV, then the encrypted frame key and its MAC.
pub const STREAM_HEADER_LENGTH: usize = STREAM_HEADER_IV_LENGTH + SECRET_KEY_LENGTH + MAC_LENGTH;

/// Plaintext frame header: payload length and padding length.
pub const FRAME_HEADER_PLAINTEXT_LENGTH: usize = 4;

/// Encrypted frame header on the wire.
pub const FRAME_HEADER_LENGTH: usize = FRAME_HEADER_PLAINTEXT_LENGTH + MAC_LENGTH;

/// Largest frame on the wire, header included.
pub const MAX_FRAME_LENGTH: usize = 1024;

/// Largest payload plus padding a single frame can carry.
pub const MAX_PAYLOAD_LENGTH: usize = MAX_FRAME_LENGTH - FRAME_HEADER_LENGTH - MAC_LENGTH;

/// Highest frame counter; the nonce's top bit selects header or payload.
pub const MAX_FRAME_COUNTER: u64 = (1 << 63) - 1;

/// Highest stream number the key store hands out for outgoing streams.
pub const MAX_STREAM_NUMBER: u64 = u32::MAX as u64;

/// Number of incoming stream numbers tracked per rotation period.
pub const REORDERING_WINDOW_SIZE: usize = 32;

/// Largest clock difference between peers that rotation tolerates.
pub const MAX_CLOCK_DIFFERENCE: Duration = Duration::from_secs(24 * 60 * 60);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_lengths() {
        assert_eq!(STREAM_HEADER_LENGTH, 64);
        assert_eq!(FRAME_HEADER_LENGTH, 20);
        assert_eq!(MAX_PAYLOAD_LENGTH, 988);
    }

    #[test]
    fn stream_header_nonce_is_exact() {
        // stream number (8) ‖ IV
        assert_eq!(8 + STREAM_HEADER_IV_LENGTH, NONCE_LENGTH);
    }

    #[test]
    fn payload_lengths_fit_the_header_field() {
        // Top bit of the payload length field carries the final flag
        assert!(MAX_PAYLOAD_LENGTH < 0x8000);
    }
}
