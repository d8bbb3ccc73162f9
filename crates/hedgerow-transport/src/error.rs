//! Error types for stream framing and the key store.
//!
//! Stream errors come in two families. Precondition errors are local bugs:
//! the caller asked for something the API forbids, and the stream object is
//! left as it was. Protocol errors mean the peer (or something between us and
//! the peer) sent bytes that do not authenticate or do not parse; the
//! connection should be dropped.

use std::io;

use thiserror::Error;

use crate::constants::MAX_PAYLOAD_LENGTH;

/// Errors from [`StreamEncrypter`](crate::StreamEncrypter) and
/// [`StreamDecrypter`](crate::StreamDecrypter).
#[derive(Debug, Error)]
pub enum StreamError {
    /// Payload plus padding does not fit in one frame
    #[error(
        "frame too long: payload {payload_length} + padding {padding_length} exceeds {max}",
        max = MAX_PAYLOAD_LENGTH
    )]
    FrameTooLong {
        /// Requested payload length
        payload_length: usize,
        /// Requested padding length
        padding_length: usize,
    },

    /// A frame was written after the final frame
    #[error("stream already ended")]
    StreamEnded,

    /// Read buffer cannot hold a maximum-size payload
    #[error("buffer too small: {len} bytes, need {max}", max = MAX_PAYLOAD_LENGTH)]
    BufferTooSmall {
        /// Length of the supplied buffer
        len: usize,
    },

    /// Stream header did not authenticate under the header key
    #[error("stream header failed authentication")]
    StreamHeaderAuth,

    /// Frame header did not authenticate under the frame key
    #[error("frame {frame} header failed authentication")]
    FrameHeaderAuth {
        /// Frame counter of the rejected frame
        frame: u64,
    },

    /// Frame payload did not authenticate under the frame key
    #[error("frame {frame} payload failed authentication")]
    FrameAuth {
        /// Frame counter of the rejected frame
        frame: u64,
    },

    /// Authenticated frame header declares an impossible length
    #[error("invalid frame length: payload {payload_length} + padding {padding_length}")]
    InvalidFrameLength {
        /// Declared payload length
        payload_length: usize,
        /// Declared padding length
        padding_length: usize,
    },

    /// Authenticated padding contains a non-zero byte
    #[error("frame {frame} has non-zero padding")]
    NonZeroPadding {
        /// Frame counter of the rejected frame
        frame: u64,
    },

    /// Source ended before a final frame was seen
    #[error("stream truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes needed to complete the current structure
        expected: usize,
        /// Bytes available before end of input
        actual: usize,
    },

    /// No frame nonce is left for this frame key
    #[error("frame counter exhausted")]
    CounterExhausted,

    /// Underlying sink or source failed
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    /// Returns true if the caller misused the API.
    ///
    /// The stream is unaffected and may continue to be used.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::FrameTooLong { .. } | Self::StreamEnded | Self::BufferTooSmall { .. }
        )
    }

    /// Returns true if the peer sent data that failed authentication or
    /// parsing.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::StreamHeaderAuth
                | Self::FrameHeaderAuth { .. }
                | Self::FrameAuth { .. }
                | Self::InvalidFrameLength { .. }
                | Self::NonZeroPadding { .. }
                | Self::Truncated { .. }
        )
    }

    /// Returns true if the stream must be abandoned.
    ///
    /// Nothing here is retried in place: a fresh stream needs a fresh frame
    /// key.
    pub fn is_fatal(&self) -> bool {
        !self.is_precondition()
    }
}

/// Convert `StreamError` to `io::Error` for the `Read`/`Write` adapters.
impl From<StreamError> for io::Error {
    fn from(err: StreamError) -> Self {
        let kind = match &err {
            StreamError::Io(inner) => inner.kind(),
            StreamError::Truncated { .. } => io::ErrorKind::UnexpectedEof,
            StreamError::FrameTooLong { .. }
            | StreamError::StreamEnded
            | StreamError::BufferTooSmall { .. } => io::ErrorKind::InvalidInput,
            StreamError::StreamHeaderAuth
            | StreamError::FrameHeaderAuth { .. }
            | StreamError::FrameAuth { .. }
            | StreamError::InvalidFrameLength { .. }
            | StreamError::NonZeroPadding { .. } => io::ErrorKind::InvalidData,
            StreamError::CounterExhausted => io::ErrorKind::Other,
        };
        Self::new(kind, err)
    }
}

/// Errors from the [`TransportKeyStore`](crate::TransportKeyStore) and its
/// reordering windows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyStoreError {
    /// No key set with this id is held
    #[error("unknown key set: {0}")]
    UnknownKeySet(u32),

    /// Stream number is below or beyond the reordering window
    #[error("stream {stream_number} outside window starting at {base}")]
    StreamNumberOutsideWindow {
        /// Rejected stream number
        stream_number: u64,
        /// Lowest stream number in the window
        base: u64,
    },

    /// Stream number was already marked as seen
    #[error("stream {stream_number} already seen")]
    StreamNumberAlreadySeen {
        /// Rejected stream number
        stream_number: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_are_not_fatal() {
        assert!(!StreamError::StreamEnded.is_fatal());
        assert!(!StreamError::BufferTooSmall { len: 10 }.is_fatal());
        assert!(
            !StreamError::FrameTooLong { payload_length: 900, padding_length: 100 }.is_fatal()
        );
    }

    #[test]
    fn authentication_failures_are_protocol_violations() {
        assert!(StreamError::StreamHeaderAuth.is_protocol_violation());
        assert!(StreamError::FrameAuth { frame: 3 }.is_protocol_violation());
        assert!(StreamError::NonZeroPadding { frame: 0 }.is_protocol_violation());
        assert!(StreamError::FrameAuth { frame: 3 }.is_fatal());
    }

    #[test]
    fn counter_exhaustion_is_fatal_but_not_the_peers_fault() {
        assert!(StreamError::CounterExhausted.is_fatal());
        assert!(!StreamError::CounterExhausted.is_protocol_violation());
    }

    #[test]
    fn io_error_kinds() {
        let eof: io::Error = StreamError::Truncated { expected: 20, actual: 3 }.into();
        assert_eq!(eof.kind(), io::ErrorKind::UnexpectedEof);

        let bad: io::Error = StreamError::FrameHeaderAuth { frame: 1 }.into();
        assert_eq!(bad.kind(), io::ErrorKind::InvalidData);

        let misuse: io::Error = StreamError::StreamEnded.into();
        assert_eq!(misuse.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn error_display() {
        let err = StreamError::FrameTooLong { payload_length: 900, padding_length: 100 };
        assert_eq!(err.to_string(), "frame too long: payload 900 + padding 100 exceeds 988");
    }
}
