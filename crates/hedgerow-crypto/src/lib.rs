//! Hedgerow Cryptographic Primitives
//!
//! Building blocks for the transport layer and for at-rest storage. Key
//! derivation and the AEAD are pure functions; anything that needs fresh
//! randomness or a clock takes an [`Environment`](hedgerow_core::Environment)
//! so tests can pin both.
//!
//! # Layers
//!
//! ```text
//! primitives   hash / mac / derive_key / prf   (HMAC-SHA-256, length-prefixed)
//!              sign / verify                   (Ed25519)
//!              agree                           (X25519)
//!      │
//!      ▼
//! cipher       XSalsa20-Poly1305               (NaCl secretbox wire layout)
//!      │
//!      ▼
//! pbkdf        scrypt + cost calibration
//! password     salt ‖ cost ‖ iv ‖ ciphertext ‖ tag
//! ```
//!
//! # Domain separation
//!
//! Every labelled primitive encodes its label and each input as a 32-bit
//! big-endian length followed by the bytes. Two different (label, inputs)
//! tuples can never produce the same byte string, so a key derived for one
//! purpose is never accidentally valid for another.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod error;
pub mod password;
pub mod pbkdf;
pub mod primitives;
pub mod secret;

pub use cipher::{MAC_LENGTH, NONCE_LENGTH};
pub use error::CryptoError;
pub use pbkdf::{KdfConfig, KeyDerivation, PasswordBasedKdf, Scrypt};
pub use secret::{SECRET_KEY_LENGTH, SecretKey};
