//! Error types for cryptographic operations

use thiserror::Error;

/// Errors from primitives, the AEAD and the password KDF
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// AEAD tag did not match; the ciphertext, key or nonce is wrong
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Input cannot even hold an authentication tag
    #[error("ciphertext too short: {len} bytes")]
    CiphertextTooShort {
        /// Length of the rejected input
        len: usize,
    },

    /// Signature did not verify under the given key and label
    #[error("invalid signature")]
    InvalidSignature,

    /// Public key is malformed or produced a non-contributory shared secret
    #[error("invalid public key")]
    InvalidPublicKey,

    /// KDF cost is not a power of two or lies outside the configured range
    #[error("invalid KDF cost: {cost}")]
    InvalidCost {
        /// The rejected cost
        cost: u32,
    },

    /// Background calibration task did not complete
    #[error("cost calibration failed: {reason}")]
    Calibration {
        /// Why the task was lost
        reason: String,
    },
}

impl CryptoError {
    /// Returns true if this error means input failed authentication.
    ///
    /// These point at a wrong key or a tampered/hostile input. Everything
    /// else is a malformed argument or a local failure.
    pub fn is_authentication_failure(&self) -> bool {
        match self {
            Self::AuthenticationFailed | Self::InvalidSignature => true,

            Self::CiphertextTooShort { .. }
            | Self::InvalidPublicKey
            | Self::InvalidCost { .. }
            | Self::Calibration { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mismatch_is_authentication_failure() {
        assert!(CryptoError::AuthenticationFailed.is_authentication_failure());
        assert!(CryptoError::InvalidSignature.is_authentication_failure());
    }

    #[test]
    fn malformed_input_is_not_authentication_failure() {
        assert!(!CryptoError::CiphertextTooShort { len: 3 }.is_authentication_failure());
        assert!(!CryptoError::InvalidCost { cost: 3 }.is_authentication_failure());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::CiphertextTooShort { len: 15 };
        assert_eq!(err.to_string(), "ciphertext too short: 15 bytes");
    }
}
