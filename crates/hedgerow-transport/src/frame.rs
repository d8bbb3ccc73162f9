//! Frame header codec and nonce layout.
//!
//! The plaintext frame header is 4 bytes, big endian:
//!
//! ```text
//! 0       1       2       3
//! ┌───────┬───────┬───────┬───────┐
//! │F│ payload len │  padding len  │
//! └───────┴───────┴───────┴───────┘
//! ```
//!
//! `F` is the final-frame flag. It sits in the top bit of the payload length
//! field, which never needs it because payloads are shorter than 32 KiB.
//!
//! On the wire the header is encrypted and followed by its own MAC, then by
//! the encrypted payload and padding and a second MAC. Both halves of a frame
//! share one frame counter; the top bit of the nonce tells them apart.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    constants::{
        FRAME_HEADER_PLAINTEXT_LENGTH, MAX_PAYLOAD_LENGTH, NONCE_LENGTH, STREAM_HEADER_IV_LENGTH,
    },
    error::StreamError,
};

const FINAL_FLAG: u8 = 0x80;
const HEADER_NONCE_FLAG: u8 = 0x80;

/// Plaintext frame header (big endian network byte order).
///
/// Any 4-byte pattern casts to a `FrameHeader`. Lengths are checked against
/// [`MAX_PAYLOAD_LENGTH`] by [`FrameHeader::from_bytes`], after the header
/// has been authenticated.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct FrameHeader {
    payload_length: [u8; 2], // u16, top bit = final flag
    padding_length: [u8; 2], // u16
}

impl FrameHeader {
    /// Size of the plaintext header (4 bytes)
    pub const SIZE: usize = FRAME_HEADER_PLAINTEXT_LENGTH;

    /// Build a header for a frame about to be written.
    ///
    /// # Errors
    ///
    /// - `FrameTooLong`: payload plus padding exceeds [`MAX_PAYLOAD_LENGTH`]
    pub fn new(
        payload_length: usize,
        padding_length: usize,
        is_final: bool,
    ) -> Result<Self, StreamError> {
        if payload_length.saturating_add(padding_length) > MAX_PAYLOAD_LENGTH {
            return Err(StreamError::FrameTooLong { payload_length, padding_length });
        }

        // Both fit in 10 bits after the check above
        let mut payload = (payload_length as u16).to_be_bytes();
        if is_final {
            payload[0] |= FINAL_FLAG;
        }

        Ok(Self { payload_length: payload, padding_length: (padding_length as u16).to_be_bytes() })
    }

    /// Parse a decrypted header.
    ///
    /// # Errors
    ///
    /// - `Truncated` if `bytes` is shorter than [`FrameHeader::SIZE`]
    /// - `InvalidFrameLength` if payload plus padding exceeds
    ///   [`MAX_PAYLOAD_LENGTH`]
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self, StreamError> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| StreamError::Truncated { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if header.body_length() > MAX_PAYLOAD_LENGTH {
            return Err(StreamError::InvalidFrameLength {
                payload_length: header.payload_length(),
                padding_length: header.padding_length(),
            });
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Payload bytes carried by the frame.
    #[must_use]
    pub fn payload_length(&self) -> usize {
        usize::from(u16::from_be_bytes([self.payload_length[0] & !FINAL_FLAG, self.payload_length[1]]))
    }

    /// Zero bytes following the payload.
    #[must_use]
    pub fn padding_length(&self) -> usize {
        usize::from(u16::from_be_bytes(self.padding_length))
    }

    /// Whether this is the last frame of the stream.
    #[must_use]
    pub fn is_final(&self) -> bool {
        self.payload_length[0] & FINAL_FLAG != 0
    }

    /// Payload plus padding: the plaintext length of the frame body.
    #[must_use]
    pub fn body_length(&self) -> usize {
        self.payload_length() + self.padding_length()
    }
}

impl std::fmt::Debug for FrameHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHeader")
            .field("payload_length", &self.payload_length())
            .field("padding_length", &self.padding_length())
            .field("is_final", &self.is_final())
            .finish()
    }
}

/// Nonce for one half of frame `counter`.
///
/// `counter:u64` big endian with the top bit set for the header half, then
/// zero-filled. Counters above [`MAX_FRAME_COUNTER`](crate::constants::MAX_FRAME_COUNTER)
/// would collide with header nonces and must never reach here.
pub fn frame_nonce(counter: u64, header: bool) -> [u8; NONCE_LENGTH] {
    debug_assert!(counter <= crate::constants::MAX_FRAME_COUNTER);

    let mut nonce = [0u8; NONCE_LENGTH];
    nonce[..8].copy_from_slice(&counter.to_be_bytes());
    if header {
        nonce[0] |= HEADER_NONCE_FLAG;
    }
    nonce
}

/// Nonce for the stream header: `stream_number:u64` big endian, then the IV.
pub fn stream_header_nonce(
    stream_number: u64,
    iv: &[u8; STREAM_HEADER_IV_LENGTH],
) -> [u8; NONCE_LENGTH] {
    let mut nonce = [0u8; NONCE_LENGTH];
    nonce[..8].copy_from_slice(&stream_number.to_be_bytes());
    nonce[8..].copy_from_slice(iv);
    nonce
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = FrameHeader::new(0x0123, 0x0045, false).unwrap();
        assert_eq!(header.to_bytes(), [0x01, 0x23, 0x00, 0x45]);

        let last = FrameHeader::new(0x0123, 0x0045, true).unwrap();
        assert_eq!(last.to_bytes(), [0x81, 0x23, 0x00, 0x45]);
    }

    #[test]
    fn header_parse() {
        let header = FrameHeader::from_bytes(&[0x81, 0x23, 0x00, 0x45]).unwrap();

        assert_eq!(header.payload_length(), 0x123);
        assert_eq!(header.padding_length(), 0x45);
        assert!(header.is_final());
        assert_eq!(header.body_length(), 0x168);
    }

    #[test]
    fn accepts_maximum_body() {
        let header = FrameHeader::new(MAX_PAYLOAD_LENGTH - 1, 1, true).unwrap();
        let bytes = header.to_bytes();
        let parsed = FrameHeader::from_bytes(&bytes).unwrap();

        assert_eq!(parsed.body_length(), MAX_PAYLOAD_LENGTH);
    }

    #[test]
    fn rejects_oversized_frames() {
        let result = FrameHeader::new(MAX_PAYLOAD_LENGTH, 1, false);
        assert!(matches!(
            result,
            Err(StreamError::FrameTooLong { payload_length: MAX_PAYLOAD_LENGTH, padding_length: 1 })
        ));

        // 600 + 600 > 988
        let result = FrameHeader::from_bytes(&[0x02, 0x58, 0x02, 0x58]);
        assert!(matches!(
            result,
            Err(StreamError::InvalidFrameLength { payload_length: 600, padding_length: 600 })
        ));
    }

    #[test]
    fn huge_lengths_do_not_overflow() {
        assert!(FrameHeader::new(usize::MAX, usize::MAX, false).is_err());
    }

    #[test]
    fn short_input_is_truncated() {
        let result = FrameHeader::from_bytes(&[0x00, 0x01]);
        assert!(matches!(result, Err(StreamError::Truncated { expected: 4, actual: 2 })));
    }

    #[test]
    fn header_and_payload_nonces_differ_only_in_top_bit() {
        let header = frame_nonce(5, true);
        let payload = frame_nonce(5, false);

        assert_eq!(header[0], 0x80);
        assert_eq!(payload[0], 0x00);
        assert_eq!(header[1..], payload[1..]);
        assert_eq!(payload[7], 5);
        assert!(payload[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn stream_header_nonce_layout() {
        let iv = [0xAA; STREAM_HEADER_IV_LENGTH];
        let nonce = stream_header_nonce(0x0102, &iv);

        assert_eq!(nonce[..8], [0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(nonce[8..], iv);
    }
}
