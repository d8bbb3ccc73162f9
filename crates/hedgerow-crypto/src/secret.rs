//! Symmetric key material

use std::fmt;

use hedgerow_core::Environment;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of every symmetric key in the protocol.
pub const SECRET_KEY_LENGTH: usize = 32;

/// A 32-byte symmetric key.
///
/// Immutable once created. The bytes are wiped when the value is dropped,
/// equality runs in constant time, and `Debug` never prints the key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_LENGTH]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; SECRET_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh key from the environment's secure random source.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut key = Self([0u8; SECRET_KEY_LENGTH]);
        env.random_bytes(&mut key.0);
        key
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LENGTH] {
        &self.0
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SecretKey {}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}
