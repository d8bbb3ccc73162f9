//! Memory-hard password KDF with self-calibrating cost
//!
//! The cost parameter is scrypt's `N`. It is chosen per device by timing
//! the KDF on throwaway input and doubling `N` until the next doubling would
//! exceed the time budget or the configured ceiling.
//!
//! Calibration blocks the calling thread for up to the target duration. Run
//! it with [`PasswordBasedKdf::choose_cost_parameter_in_background`] (or on
//! some other blocking-capable thread), never on an IO or UI thread.

use std::{sync::Arc, time::Duration};

use hedgerow_core::Environment;
use zeroize::Zeroizing;

use crate::{
    error::CryptoError,
    secret::{SECRET_KEY_LENGTH, SecretKey},
};

/// Lowest cost calibration will return.
pub const MIN_COST: u32 = 256;

/// Highest cost calibration will return, and the highest accepted on decrypt.
pub const MAX_COST: u32 = 1 << 20;

/// Default calibration time budget.
pub const TARGET_DURATION: Duration = Duration::from_secs(1);

/// scrypt block size parameter `r`.
const SCRYPT_BLOCK_SIZE: u32 = 8;

/// scrypt parallelism parameter `p`.
const SCRYPT_PARALLELISM: u32 = 1;

/// Salt used for timing runs; the derived key is discarded.
const CALIBRATION_SALT: [u8; 32] = [0u8; 32];

/// Bounds and budget for cost calibration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfConfig {
    /// Floor cost, returned even if it exceeds the budget
    pub min_cost: u32,
    /// Ceiling cost, never exceeded
    pub max_cost: u32,
    /// Time one derivation should take on this device
    pub target: Duration,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self { min_cost: MIN_COST, max_cost: MAX_COST, target: TARGET_DURATION }
    }
}

impl KdfConfig {
    /// Whether `cost` may be used with this configuration.
    pub fn accepts(&self, cost: u32) -> bool {
        cost.is_power_of_two() && (self.min_cost..=self.max_cost).contains(&cost)
    }
}

/// A password-stretching function parameterised by a single cost.
pub trait KeyDerivation: Send + Sync + 'static {
    /// Stretch `password` with `salt` at `cost` into a 32-byte key.
    fn derive(&self, password: &str, salt: &[u8], cost: u32) -> Result<SecretKey, CryptoError>;
}

/// scrypt with `r = 8`, `p = 1` and `N = cost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scrypt;

impl KeyDerivation for Scrypt {
    fn derive(&self, password: &str, salt: &[u8], cost: u32) -> Result<SecretKey, CryptoError> {
        if cost < 2 || !cost.is_power_of_two() {
            return Err(CryptoError::InvalidCost { cost });
        }

        let log_n = cost.trailing_zeros() as u8;
        let params =
            scrypt::Params::new(log_n, SCRYPT_BLOCK_SIZE, SCRYPT_PARALLELISM, SECRET_KEY_LENGTH)
                .map_err(|_| CryptoError::InvalidCost { cost })?;

        let mut output = Zeroizing::new([0u8; SECRET_KEY_LENGTH]);
        let Ok(()) = scrypt::scrypt(password.as_bytes(), salt, &params, &mut *output) else {
            unreachable!("output length matches scrypt params");
        };

        Ok(SecretKey::from_bytes(*output))
    }
}

/// Password KDF bound to an environment (for timing and randomness).
#[derive(Debug, Clone)]
pub struct PasswordBasedKdf<E, K = Scrypt> {
    env: E,
    kdf: K,
    config: KdfConfig,
}

impl<E: Environment> PasswordBasedKdf<E, Scrypt> {
    /// scrypt-backed KDF.
    pub fn new(env: E, config: KdfConfig) -> Self {
        Self::with_kdf(env, Scrypt, config)
    }
}

impl<E: Environment, K: KeyDerivation> PasswordBasedKdf<E, K> {
    /// KDF backed by a custom [`KeyDerivation`].
    pub fn with_kdf(env: E, kdf: K, config: KdfConfig) -> Self {
        Self { env, kdf, config }
    }

    /// Calibration bounds and budget.
    pub fn config(&self) -> &KdfConfig {
        &self.config
    }

    pub(crate) fn env(&self) -> &E {
        &self.env
    }

    /// Stretch `password` at an explicit `cost`.
    ///
    /// # Errors
    ///
    /// - `InvalidCost`: `cost` is not a power of two within the configured
    ///   range
    pub fn derive_key(
        &self,
        password: &str,
        salt: &[u8],
        cost: u32,
    ) -> Result<SecretKey, CryptoError> {
        if !self.config.accepts(cost) {
            return Err(CryptoError::InvalidCost { cost });
        }
        self.kdf.derive(password, salt, cost)
    }

    /// Find the highest cost whose derivation fits the time budget.
    ///
    /// Starts at `min_cost` and doubles while the doubled cost stays within
    /// `max_cost` and twice the measured time stays within `target`. Always
    /// terminates, and a larger `target` never yields a smaller cost.
    pub fn choose_cost_parameter(&self) -> u32 {
        let mut cost = self.config.min_cost;

        while cost.checked_mul(2).is_some_and(|doubled| doubled <= self.config.max_cost)
            && self.measure(cost).saturating_mul(2) <= self.config.target
        {
            cost *= 2;
        }

        tracing::info!(cost, "chose password KDF cost");
        cost
    }

    /// Wall time of one derivation at `cost`.
    fn measure(&self, cost: u32) -> Duration {
        let start = self.env.now();
        if let Err(e) = self.kdf.derive("password", &CALIBRATION_SALT, cost) {
            tracing::warn!(cost, error = %e, "password KDF failed during calibration");
            return Duration::MAX;
        }
        let elapsed = self.env.now() - start;

        tracing::debug!(cost, ?elapsed, "measured password KDF");
        elapsed
    }

    /// Run [`choose_cost_parameter`](Self::choose_cost_parameter) on the
    /// runtime's blocking pool.
    ///
    /// # Errors
    ///
    /// - `Calibration`: the blocking task panicked or was cancelled
    pub async fn choose_cost_parameter_in_background(self: Arc<Self>) -> Result<u32, CryptoError> {
        tokio::task::spawn_blocking(move || self.choose_cost_parameter())
            .await
            .map_err(|e| CryptoError::Calibration { reason: e.to_string() })
    }
}
