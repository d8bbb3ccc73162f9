//! Hedgerow Transport Security
//!
//! Forward-secure transport keys for pairs of contacts, pseudorandom stream
//! tags, and an authenticated framing format for the byte streams between
//! them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  update_keys   ┌──────────────────┐
//! │ KeyUpdateDriver  │ ─────────────▶ │ TransportKeyStore│
//! │ (wall clock)     │                │ key sets + tags  │
//! └──────────────────┘                └────────┬─────────┘
//!                                              │ StreamContext
//!                                              ▼
//!                        tag ‖ stream header ‖ frame ‖ frame ‖ ...
//!                        StreamEncrypter ──────▶ StreamDecrypter
//! ```
//!
//! # Key rotation
//!
//! Time is divided into rotation periods. For period `P` a contact holds
//! incoming keys for `P - 1`, `P` and `P + 1`, so a peer whose clock is
//! off by up to [`MAX_CLOCK_DIFFERENCE`](constants::MAX_CLOCK_DIFFERENCE) is
//! still understood, and outgoing keys for `P`. Rotation keys are a one-way
//! chain: keys from an old period cannot be recovered from newer ones.
//!
//! # Stream framing
//!
//! Each stream carries a fresh random frame key sealed under the header key.
//! Frames are authenticated one at a time, padded with zeros, and numbered
//! implicitly by a counter that both sides track. Only a frame flagged final
//! ends a stream cleanly.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod constants;
pub mod driver;
pub mod error;
pub mod frame;
pub mod keys;
pub mod root;
pub mod rotation;
pub mod store;
pub mod stream;
pub mod tag;
pub mod window;

pub use driver::{KeyUpdateDriver, SharedKeyStore};
pub use error::{KeyStoreError, StreamError};
pub use frame::FrameHeader;
pub use keys::{IncomingKeys, KeyMode, OutgoingKeys, RotationPeriod, TransportId, TransportKeys};
pub use root::{
    derive_handshake_root_key, derive_rotation_root_key, derive_static_master_key, is_initiator,
};
pub use rotation::{derive_handshake_keys, derive_rotation_keys, rotate_key, update_keys};
pub use store::{ContactId, KeySetId, TransportConfig, TransportKeyStore};
pub use stream::{
    EncrypterState, StreamContext, StreamDecrypter, StreamEncrypter, StreamReader, StreamWriter,
    create_stream_decrypter, create_stream_encrypter, create_untagged_stream_decrypter,
    create_untagged_stream_encrypter, read_tag,
};
pub use tag::{Tag, encode_tag};
pub use window::{ReorderingWindow, WindowChange};
