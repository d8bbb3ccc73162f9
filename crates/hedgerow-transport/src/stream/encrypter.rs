//! Outgoing half of a stream.

use std::io::Write;

use hedgerow_crypto::{
    SecretKey,
    cipher::{encrypt, encrypt_in_place_detached},
};

use crate::{
    constants::{
        FRAME_HEADER_LENGTH, FRAME_HEADER_PLAINTEXT_LENGTH, MAC_LENGTH, MAX_FRAME_COUNTER,
        MAX_FRAME_LENGTH, STREAM_HEADER_IV_LENGTH, STREAM_HEADER_LENGTH,
    },
    error::StreamError,
    frame::{FrameHeader, frame_nonce, stream_header_nonce},
    tag::Tag,
};

/// Where an encrypter is in its one-shot prefix and frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncrypterState {
    /// Nothing written yet
    NotStarted,
    /// Tag written, stream header still pending
    TagWritten,
    /// Tag (if any) and stream header written, no frames yet
    HeaderWritten,
    /// At least one non-final frame written
    Streaming,
    /// Final frame written; no more frames allowed
    Ended,
}

/// Turns payloads into authenticated frames on `sink`.
///
/// Owned by exactly one connection. Not for concurrent use; the frame
/// counter and the one-shot prefix are plain fields.
///
/// # Wire format
///
/// ```text
/// [tag (16)]  iv (16) ‖ E(frame key) (32) ‖ MAC (16)
/// frame 0:    E(header) (4) ‖ MAC (16) ‖ E(payload ‖ padding) ‖ MAC (16)
/// frame 1:    ...
/// ```
pub struct StreamEncrypter<W> {
    sink: W,
    tag: Option<Tag>,
    stream_header: [u8; STREAM_HEADER_LENGTH],
    frame_key: SecretKey,
    frame_counter: u64,
    state: EncrypterState,
}

impl<W: Write> StreamEncrypter<W> {
    /// Prepare a stream. Nothing is written until the first frame or flush.
    ///
    /// `tag` is `None` for streams whose receiver already knows which keys
    /// to use. The frame key is sealed under `header_key` immediately, so the
    /// header key is not retained.
    pub fn new(
        sink: W,
        stream_number: u64,
        tag: Option<Tag>,
        iv: [u8; STREAM_HEADER_IV_LENGTH],
        header_key: &SecretKey,
        frame_key: SecretKey,
    ) -> Self {
        let nonce = stream_header_nonce(stream_number, &iv);
        let sealed = encrypt(header_key, &nonce, frame_key.as_bytes());

        let mut stream_header = [0u8; STREAM_HEADER_LENGTH];
        stream_header[..STREAM_HEADER_IV_LENGTH].copy_from_slice(&iv);
        stream_header[STREAM_HEADER_IV_LENGTH..].copy_from_slice(&sealed);

        let state = if tag.is_some() { EncrypterState::NotStarted } else { EncrypterState::TagWritten };

        Self { sink, tag, stream_header, frame_key, frame_counter: 0, state }
    }

    /// Encrypt and write one frame.
    ///
    /// `payload` is followed by `padding_length` zero bytes inside the
    /// authenticated region. The tag and stream header are written first if
    /// they have not been yet.
    ///
    /// # Errors
    ///
    /// - `StreamEnded`: a final frame was already written
    /// - `FrameTooLong`: payload plus padding exceeds
    ///   [`MAX_PAYLOAD_LENGTH`](crate::constants::MAX_PAYLOAD_LENGTH)
    /// - `CounterExhausted`: no nonces left; the stream must be abandoned
    /// - `Io`: the sink failed
    ///
    /// Precondition errors leave the encrypter untouched.
    pub fn write_frame(
        &mut self,
        payload: &[u8],
        padding_length: usize,
        is_final: bool,
    ) -> Result<(), StreamError> {
        if self.state == EncrypterState::Ended {
            return Err(StreamError::StreamEnded);
        }
        let header = FrameHeader::new(payload.len(), padding_length, is_final)?;
        if self.frame_counter > MAX_FRAME_COUNTER {
            return Err(StreamError::CounterExhausted);
        }

        self.write_prefix()?;

        let body_length = header.body_length();
        let frame_length = FRAME_HEADER_LENGTH + body_length + MAC_LENGTH;
        let mut buffer = [0u8; MAX_FRAME_LENGTH];
        let frame = &mut buffer[..frame_length];

        let (header_part, body_part) = frame.split_at_mut(FRAME_HEADER_LENGTH);
        let (header_plain, header_mac) = header_part.split_at_mut(FRAME_HEADER_PLAINTEXT_LENGTH);
        header_plain.copy_from_slice(&header.to_bytes());
        let mac = encrypt_in_place_detached(
            &self.frame_key,
            &frame_nonce(self.frame_counter, true),
            header_plain,
        );
        header_mac.copy_from_slice(&mac);

        // Padding stays zero from the initialiser
        let (body, body_mac) = body_part.split_at_mut(body_length);
        body[..payload.len()].copy_from_slice(payload);
        let mac =
            encrypt_in_place_detached(&self.frame_key, &frame_nonce(self.frame_counter, false), body);
        body_mac.copy_from_slice(&mac);

        // Burn the nonce before touching the sink so a failed write can never
        // lead to it being reused
        self.frame_counter += 1;
        self.sink.write_all(&buffer[..frame_length])?;

        self.state = if is_final { EncrypterState::Ended } else { EncrypterState::Streaming };
        Ok(())
    }

    /// Write the tag and stream header if still pending, then flush the sink.
    ///
    /// Lets the receiver recognise the stream before any data is ready.
    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.write_prefix()?;
        self.sink.flush()?;
        Ok(())
    }

    /// Current position in the stream lifecycle.
    pub fn state(&self) -> EncrypterState {
        self.state
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frame_counter
    }

    /// Borrow the sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Give back the sink. Pending prefix bytes are not written.
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn write_prefix(&mut self) -> Result<(), StreamError> {
        if self.state == EncrypterState::NotStarted {
            if let Some(tag) = &self.tag {
                self.sink.write_all(tag)?;
            }
            self.state = EncrypterState::TagWritten;
        }
        if self.state == EncrypterState::TagWritten {
            self.sink.write_all(&self.stream_header)?;
            self.state = EncrypterState::HeaderWritten;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_frame_counter(&mut self, counter: u64) {
        self.frame_counter = counter;
    }
}

impl<W> std::fmt::Debug for StreamEncrypter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEncrypter")
            .field("frame_counter", &self.frame_counter)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
