//! Authenticated stream framing.
//!
//! A stream is one direction of one connection. The sender picks a fresh
//! random frame key, seals it under the long-lived header key in the stream
//! header, then sends frames under the frame key:
//!
//! ```text
//! NotStarted ─▶ TagWritten ─▶ HeaderWritten ─▶ Streaming ─▶ Ended
//!   (tag, if any)   (iv ‖ sealed frame key)    (frames)    (final frame)
//! ```
//!
//! Every frame is authenticated on its own, so memory use is bounded by one
//! frame no matter how long the stream is. A clean end of stream is signalled
//! only by the final-frame flag; running out of bytes anywhere else is
//! truncation.

mod decrypter;
mod encrypter;
mod io;

use std::io::{Read, Write};

pub use decrypter::StreamDecrypter;
pub use encrypter::{EncrypterState, StreamEncrypter};
use hedgerow_core::Environment;
use hedgerow_crypto::SecretKey;
pub use io::{StreamReader, StreamWriter};

use crate::{
    constants::{PROTOCOL_VERSION, TAG_LENGTH},
    error::StreamError,
    keys::TransportId,
    tag::{Tag, encode_tag},
};

/// Everything needed to open one stream to or from a contact.
///
/// Produced by the [`TransportKeyStore`](crate::TransportKeyStore) for each
/// connection and discarded when the connection ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamContext {
    /// Transport the stream runs over
    pub transport_id: TransportId,
    /// Key the stream's tag is computed under
    pub tag_key: SecretKey,
    /// Key sealing the stream's frame key
    pub header_key: SecretKey,
    /// Stream number within the rotation period
    pub stream_number: u64,
    /// Whether the keys came from a handshake root
    pub handshake_mode: bool,
}

impl StreamContext {
    /// Tag that opens this stream on the wire.
    pub fn tag(&self) -> Tag {
        encode_tag(&self.tag_key, PROTOCOL_VERSION, self.stream_number)
    }
}

/// Open an outgoing stream that starts with its tag.
pub fn create_stream_encrypter<E: Environment, W: Write>(
    env: &E,
    sink: W,
    ctx: &StreamContext,
) -> StreamEncrypter<W> {
    StreamEncrypter::new(
        sink,
        ctx.stream_number,
        Some(ctx.tag()),
        env.random_array(),
        &ctx.header_key,
        SecretKey::generate(env),
    )
}

/// Open an outgoing stream with no tag.
///
/// For streams whose receiver already knows the keys, such as those sent
/// during a key agreement.
pub fn create_untagged_stream_encrypter<E: Environment, W: Write>(
    env: &E,
    sink: W,
    stream_number: u64,
    header_key: &SecretKey,
) -> StreamEncrypter<W> {
    StreamEncrypter::new(
        sink,
        stream_number,
        None,
        env.random_array(),
        header_key,
        SecretKey::generate(env),
    )
}

/// Open an incoming stream whose tag has already been read and recognised.
pub fn create_stream_decrypter<R: Read>(source: R, ctx: &StreamContext) -> StreamDecrypter<R> {
    StreamDecrypter::new(source, ctx.stream_number, ctx.header_key.clone())
}

/// Open an incoming stream that carries no tag.
pub fn create_untagged_stream_decrypter<R: Read>(
    source: R,
    stream_number: u64,
    header_key: &SecretKey,
) -> StreamDecrypter<R> {
    StreamDecrypter::new(source, stream_number, header_key.clone())
}

/// Read the tag at the start of an incoming stream.
///
/// # Errors
///
/// - `Truncated`: the source ended before a whole tag arrived
/// - `Io`: the source failed
pub fn read_tag<R: Read>(source: &mut R) -> Result<Tag, StreamError> {
    let mut tag = [0u8; TAG_LENGTH];
    decrypter::read_exact(source, &mut tag)?;
    Ok(tag)
}
