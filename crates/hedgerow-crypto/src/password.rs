//! Password-encrypted envelopes for data at rest
//!
//! ```text
//! salt (32) ‖ cost (u32, big-endian) ‖ iv (24) ‖ ciphertext ‖ tag (16)
//! ```
//!
//! The key is the password stretched at `cost` with `salt`; the blob is
//! self-describing, so decryption needs nothing but the password.

use hedgerow_core::Environment;

use crate::{
    cipher::{self, MAC_LENGTH, NONCE_LENGTH},
    error::CryptoError,
    pbkdf::{KeyDerivation, PasswordBasedKdf},
};

/// Length of the random KDF salt.
pub const SALT_LENGTH: usize = 32;

/// Length of the encoded cost field.
pub const COST_LENGTH: usize = 4;

/// Length of the random AEAD nonce.
pub const IV_LENGTH: usize = NONCE_LENGTH;

/// Bytes before the ciphertext.
const HEADER_LENGTH: usize = SALT_LENGTH + COST_LENGTH + IV_LENGTH;

/// Shortest possible envelope (empty plaintext).
pub const MIN_ENVELOPE_LENGTH: usize = HEADER_LENGTH + MAC_LENGTH;

impl<E: Environment, K: KeyDerivation> PasswordBasedKdf<E, K> {
    /// Encrypt `data` under `password` at a freshly calibrated cost.
    ///
    /// Blocks for the calibration run; see
    /// [`choose_cost_parameter`](Self::choose_cost_parameter).
    pub fn encrypt_with_password(
        &self,
        data: &[u8],
        password: &str,
    ) -> Result<Vec<u8>, CryptoError> {
        let cost = self.choose_cost_parameter();
        self.encrypt_with_password_at_cost(data, password, cost)
    }

    /// Encrypt `data` under `password` at an explicit `cost`.
    ///
    /// # Errors
    ///
    /// - `InvalidCost`: `cost` is outside the configured range
    pub fn encrypt_with_password_at_cost(
        &self,
        data: &[u8],
        password: &str,
        cost: u32,
    ) -> Result<Vec<u8>, CryptoError> {
        let salt: [u8; SALT_LENGTH] = self.env().random_array();
        let iv: [u8; IV_LENGTH] = self.env().random_array();
        let key = self.derive_key(password, &salt, cost)?;

        let mut out = Vec::with_capacity(HEADER_LENGTH + data.len() + MAC_LENGTH);
        out.extend_from_slice(&salt);
        out.extend_from_slice(&cost.to_be_bytes());
        out.extend_from_slice(&iv);
        out.extend_from_slice(data);

        let tag = cipher::encrypt_in_place_detached(&key, &iv, &mut out[HEADER_LENGTH..]);
        out.extend_from_slice(&tag);
        Ok(out)
    }

    /// Recover data from an envelope.
    ///
    /// Returns `None` for a truncated blob, an unacceptable cost, a wrong
    /// password or a corrupted blob. These cases are deliberately not told
    /// apart: a wrong password and a damaged blob look identical.
    pub fn decrypt_with_password(&self, blob: &[u8], password: &str) -> Option<Vec<u8>> {
        if blob.len() < MIN_ENVELOPE_LENGTH {
            tracing::debug!(len = blob.len(), "password envelope too short");
            return None;
        }

        let (salt, rest) = blob.split_at(SALT_LENGTH);
        let (cost, rest) = rest.split_at(COST_LENGTH);
        let (iv, ciphertext) = rest.split_at(IV_LENGTH);

        let cost = u32::from_be_bytes(cost.try_into().ok()?);
        let iv: &[u8; IV_LENGTH] = iv.try_into().ok()?;

        let key = match self.derive_key(password, salt, cost) {
            Ok(key) => key,
            Err(e) => {
                tracing::debug!(cost, error = %e, "password envelope rejected");
                return None;
            },
        };

        match cipher::decrypt(&key, iv, ciphertext) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::debug!(error = %e, "password envelope did not authenticate");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use hedgerow_core::SimEnv;

    use super::*;
    use crate::pbkdf::KdfConfig;

    /// Cheap scrypt settings; the virtual clock never advances during a real
    /// derivation, so calibration always lands on `max_cost`.
    fn test_kdf() -> PasswordBasedKdf<SimEnv> {
        let config = KdfConfig { min_cost: 256, max_cost: 1024, ..KdfConfig::default() };
        PasswordBasedKdf::new(SimEnv::with_seed(11), config)
    }

    #[test]
    fn roundtrip() {
        let kdf = test_kdf();

        let blob = kdf.encrypt_with_password(b"the quick brown fox", "correct horse").unwrap();

        assert_eq!(
            kdf.decrypt_with_password(&blob, "correct horse").as_deref(),
            Some(&b"the quick brown fox"[..])
        );
    }

    #[test]
    fn layout_carries_calibrated_cost() {
        let kdf = test_kdf();

        let blob = kdf.encrypt_with_password(b"data", "pw").unwrap();

        assert_eq!(blob.len(), MIN_ENVELOPE_LENGTH + 4);
        let cost_field = &blob[SALT_LENGTH..SALT_LENGTH + COST_LENGTH];
        assert_eq!(cost_field, 1024u32.to_be_bytes());
    }

    #[test]
    fn wrong_password_yields_none() {
        let kdf = test_kdf();
        let blob = kdf.encrypt_with_password_at_cost(b"data", "right", 256).unwrap();

        assert_eq!(kdf.decrypt_with_password(&blob, "wrong"), None);
    }

    #[test]
    fn short_blob_yields_none() {
        let kdf = test_kdf();

        assert_eq!(kdf.decrypt_with_password(&[0u8; MIN_ENVELOPE_LENGTH - 1], "pw"), None);
        assert_eq!(kdf.decrypt_with_password(&[], "pw"), None);
    }

    #[test]
    fn out_of_range_cost_yields_none() {
        let kdf = test_kdf();
        let mut blob = kdf.encrypt_with_password_at_cost(b"data", "pw", 256).unwrap();

        blob[SALT_LENGTH..SALT_LENGTH + COST_LENGTH].copy_from_slice(&(1u32 << 30).to_be_bytes());
        assert_eq!(kdf.decrypt_with_password(&blob, "pw"), None);

        blob[SALT_LENGTH..SALT_LENGTH + COST_LENGTH].copy_from_slice(&300u32.to_be_bytes());
        assert_eq!(kdf.decrypt_with_password(&blob, "pw"), None);
    }

    #[test]
    fn encrypt_rejects_unacceptable_cost() {
        let kdf = test_kdf();

        assert_eq!(
            kdf.encrypt_with_password_at_cost(b"data", "pw", 4096),
            Err(CryptoError::InvalidCost { cost: 4096 })
        );
    }

    #[test]
    fn empty_data_roundtrips() {
        let kdf = test_kdf();
        let blob = kdf.encrypt_with_password_at_cost(b"", "pw", 256).unwrap();

        assert_eq!(blob.len(), MIN_ENVELOPE_LENGTH);
        assert_eq!(kdf.decrypt_with_password(&blob, "pw"), Some(Vec::new()));
    }
}
