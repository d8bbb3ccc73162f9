//! Incoming half of a stream.

use std::io::{self, Read};

use hedgerow_crypto::{SecretKey, cipher::decrypt_in_place_detached};
use zeroize::Zeroize;

use crate::{
    constants::{
        FRAME_HEADER_LENGTH, FRAME_HEADER_PLAINTEXT_LENGTH, MAC_LENGTH, MAX_FRAME_COUNTER,
        MAX_PAYLOAD_LENGTH, SECRET_KEY_LENGTH, STREAM_HEADER_IV_LENGTH, STREAM_HEADER_LENGTH,
    },
    error::StreamError,
    frame::{FrameHeader, frame_nonce, stream_header_nonce},
};

enum DecrypterState {
    AwaitingHeader,
    Streaming { frame_key: SecretKey },
    Ended,
}

/// Reads authenticated frames from `source`.
///
/// Expects the stream header first; a tag, if the stream has one, must
/// already have been consumed. Owned by exactly one connection.
///
/// Any error other than `BufferTooSmall` leaves the decrypter in an
/// unspecified position within the stream. Drop it.
pub struct StreamDecrypter<R> {
    source: R,
    stream_number: u64,
    header_key: SecretKey,
    frame_counter: u64,
    state: DecrypterState,
}

impl<R: Read> StreamDecrypter<R> {
    /// Prepare to read stream `stream_number` protected by `header_key`.
    pub fn new(source: R, stream_number: u64, header_key: SecretKey) -> Self {
        Self { source, stream_number, header_key, frame_counter: 0, state: DecrypterState::AwaitingHeader }
    }

    /// Read and authenticate the next frame into `payload`.
    ///
    /// Returns `Some(len)` with the payload length (possibly zero), or `None`
    /// once a final frame has been read. `None` repeats on every later call,
    /// and bytes after the final frame are never read.
    ///
    /// # Errors
    ///
    /// - `BufferTooSmall`: `payload` is shorter than [`MAX_PAYLOAD_LENGTH`]
    /// - `StreamHeaderAuth`: wrong header key or stream number, or tampering
    /// - `FrameHeaderAuth` / `FrameAuth`: frame tampered, reordered or
    ///   replayed
    /// - `InvalidFrameLength`: authenticated header declares too much data
    /// - `NonZeroPadding`: authenticated padding is not all zero
    /// - `Truncated`: the source ended before a final frame
    /// - `CounterExhausted`: the peer sent more frames than nonces exist
    /// - `Io`: the source failed
    pub fn read_frame(&mut self, payload: &mut [u8]) -> Result<Option<usize>, StreamError> {
        if matches!(self.state, DecrypterState::Ended) {
            return Ok(None);
        }
        if payload.len() < MAX_PAYLOAD_LENGTH {
            return Err(StreamError::BufferTooSmall { len: payload.len() });
        }
        if matches!(self.state, DecrypterState::AwaitingHeader) {
            self.read_stream_header()?;
        }
        let DecrypterState::Streaming { frame_key } = &self.state else {
            unreachable!("stream header read above");
        };
        if self.frame_counter > MAX_FRAME_COUNTER {
            return Err(StreamError::CounterExhausted);
        }
        let frame = self.frame_counter;

        let mut header_buf = [0u8; FRAME_HEADER_LENGTH];
        read_exact(&mut self.source, &mut header_buf)?;
        let (header_plain, header_mac) = header_buf.split_at_mut(FRAME_HEADER_PLAINTEXT_LENGTH);
        decrypt_in_place_detached(frame_key, &frame_nonce(frame, true), header_plain, header_mac)
            .map_err(|_| StreamError::FrameHeaderAuth { frame })?;
        let header = *FrameHeader::from_bytes(header_plain)?;

        let body_length = header.body_length();
        let mut body_buf = [0u8; MAX_PAYLOAD_LENGTH + MAC_LENGTH];
        let body_with_mac = &mut body_buf[..body_length + MAC_LENGTH];
        read_exact(&mut self.source, body_with_mac)?;
        let (body, body_mac) = body_with_mac.split_at_mut(body_length);
        decrypt_in_place_detached(frame_key, &frame_nonce(frame, false), body, body_mac)
            .map_err(|_| StreamError::FrameAuth { frame })?;

        let payload_length = header.payload_length();
        if body[payload_length..].iter().any(|&b| b != 0) {
            body.zeroize();
            return Err(StreamError::NonZeroPadding { frame });
        }
        payload[..payload_length].copy_from_slice(&body[..payload_length]);
        body.zeroize();

        self.frame_counter += 1;
        if header.is_final() {
            self.state = DecrypterState::Ended;
        }
        Ok(Some(payload_length))
    }

    /// Whether the final frame has been read.
    pub fn is_ended(&self) -> bool {
        matches!(self.state, DecrypterState::Ended)
    }

    /// Number of frames read so far.
    pub fn frames_read(&self) -> u64 {
        self.frame_counter
    }

    /// Give back the source, positioned after the last byte read.
    pub fn into_inner(self) -> R {
        self.source
    }

    fn read_stream_header(&mut self) -> Result<(), StreamError> {
        let mut header = [0u8; STREAM_HEADER_LENGTH];
        read_exact(&mut self.source, &mut header)?;

        let (iv, sealed) = header.split_at_mut(STREAM_HEADER_IV_LENGTH);
        let mut nonce_iv = [0u8; STREAM_HEADER_IV_LENGTH];
        nonce_iv.copy_from_slice(iv);
        let nonce = stream_header_nonce(self.stream_number, &nonce_iv);

        let (key_bytes, mac) = sealed.split_at_mut(SECRET_KEY_LENGTH);
        decrypt_in_place_detached(&self.header_key, &nonce, key_bytes, mac)
            .map_err(|_| StreamError::StreamHeaderAuth)?;

        let mut frame_key = [0u8; SECRET_KEY_LENGTH];
        frame_key.copy_from_slice(key_bytes);
        key_bytes.zeroize();

        self.state = DecrypterState::Streaming { frame_key: SecretKey::from_bytes(frame_key) };
        frame_key.zeroize();
        Ok(())
    }
}

impl<R> std::fmt::Debug for StreamDecrypter<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            DecrypterState::AwaitingHeader => "AwaitingHeader",
            DecrypterState::Streaming { .. } => "Streaming",
            DecrypterState::Ended => "Ended",
        };
        f.debug_struct("StreamDecrypter")
            .field("stream_number", &self.stream_number)
            .field("frame_counter", &self.frame_counter)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

/// Fill `buf` completely, reporting a short read as truncation.
pub(super) fn read_exact<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<(), StreamError> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => return Err(StreamError::Truncated { expected: buf.len(), actual: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
