//! Fuzz target for StreamDecrypter
//!
//! Builds a valid stream from fuzzer-chosen frames, applies one mutation,
//! and reads it back.
//!
//! # Strategy
//!
//! - Untouched: the stream must round trip exactly
//! - Flip: XOR one byte anywhere on the wire
//! - Truncate: cut the wire short
//! - Append: add trailing bytes after the final frame
//! - Garbage: feed arbitrary bytes as a stream
//!
//! # Invariants
//!
//! - Never panics
//! - Untouched and appended streams yield exactly the written payloads
//! - Flipped streams always fail with a protocol violation
//! - Truncated streams always fail with `Truncated`

#![no_main]

use arbitrary::Arbitrary;
use hedgerow_core::SimEnv;
use hedgerow_crypto::SecretKey;
use hedgerow_transport::{
    StreamError, constants::MAX_PAYLOAD_LENGTH, create_untagged_stream_decrypter,
    create_untagged_stream_encrypter,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
struct Frame {
    payload: Vec<u8>,
    padding: u16,
}

#[derive(Debug, Clone, Arbitrary)]
enum Mutation {
    Untouched,
    Flip { position: usize, mask: u8 },
    Truncate { keep: usize },
    Append { trailer: Vec<u8> },
    Garbage { bytes: Vec<u8> },
}

#[derive(Debug, Clone, Arbitrary)]
struct Input {
    seed: u64,
    stream_number: u64,
    frames: Vec<Frame>,
    mutation: Mutation,
}

fn read_all(wire: &[u8], stream_number: u64, key: &SecretKey) -> Result<Vec<Vec<u8>>, StreamError> {
    let mut dec = create_untagged_stream_decrypter(wire, stream_number, key);
    let mut buf = [0u8; MAX_PAYLOAD_LENGTH];
    let mut frames = Vec::new();
    while let Some(len) = dec.read_frame(&mut buf)? {
        frames.push(buf[..len].to_vec());
    }
    Ok(frames)
}

fuzz_target!(|input: Input| {
    let env = SimEnv::with_seed(input.seed);
    let key = SecretKey::generate(&env);

    // Clamp frames into the legal range; at least one frame so the stream ends
    let mut frames: Vec<(Vec<u8>, usize)> = input
        .frames
        .into_iter()
        .take(8)
        .map(|frame| {
            let mut payload = frame.payload;
            payload.truncate(MAX_PAYLOAD_LENGTH);
            let padding = usize::from(frame.padding) % (MAX_PAYLOAD_LENGTH - payload.len() + 1);
            (payload, padding)
        })
        .collect();
    if frames.is_empty() {
        frames.push((Vec::new(), 0));
    }

    let mut enc = create_untagged_stream_encrypter(&env, Vec::new(), input.stream_number, &key);
    for (i, (payload, padding)) in frames.iter().enumerate() {
        enc.write_frame(payload, *padding, i + 1 == frames.len()).unwrap();
    }
    let mut wire = enc.into_inner();
    let expected: Vec<Vec<u8>> = frames.into_iter().map(|(payload, _)| payload).collect();

    match input.mutation {
        Mutation::Untouched => {
            assert_eq!(read_all(&wire, input.stream_number, &key).unwrap(), expected);
        },
        Mutation::Flip { position, mask } => {
            let i = position % wire.len();
            wire[i] ^= mask | 1;
            let err = read_all(&wire, input.stream_number, &key).unwrap_err();
            assert!(err.is_protocol_violation(), "{err}");
        },
        Mutation::Truncate { keep } => {
            let keep = keep % wire.len();
            let err = read_all(&wire[..keep], input.stream_number, &key).unwrap_err();
            assert!(matches!(err, StreamError::Truncated { .. }), "{err}");
        },
        Mutation::Append { trailer } => {
            wire.extend_from_slice(&trailer);
            assert_eq!(read_all(&wire, input.stream_number, &key).unwrap(), expected);
        },
        Mutation::Garbage { bytes } => {
            let _ = read_all(&bytes, input.stream_number, &key);
        },
    }
});
