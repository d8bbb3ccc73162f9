//! Deterministic environment for tests and simulations.
//!
//! Time only moves when someone moves it: [`SimEnv::advance`], or an awaited
//! [`Environment::sleep`], which advances the clock and completes at once.
//! Randomness comes from a ChaCha20 RNG seeded by the caller, so two
//! environments built from the same seed produce identical key material.

use std::{
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::env::Environment;

/// Simulated environment with a virtual clock and a seeded RNG.
///
/// Clones share the same clock and RNG stream.
#[derive(Clone, Debug)]
pub struct SimEnv {
    /// Virtual nanoseconds since the environment was created
    elapsed_nanos: Arc<AtomicU64>,
    /// Wall clock reading at virtual time zero
    wall_clock_origin_millis: u64,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Create an environment whose wall clock starts at the Unix epoch.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_seed_at(seed, 0)
    }

    /// Create an environment whose wall clock starts at `wall_clock_millis`.
    pub fn with_seed_at(seed: u64, wall_clock_millis: u64) -> Self {
        Self {
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
            wall_clock_origin_millis: wall_clock_millis,
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// Move the virtual clock forward.
    pub fn advance(&self, duration: Duration) {
        self.elapsed_nanos.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Virtual time elapsed since creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }
}

impl Environment for SimEnv {
    type Instant = Duration;

    fn now(&self) -> Self::Instant {
        self.elapsed()
    }

    fn wall_clock_millis(&self) -> u64 {
        self.wall_clock_origin_millis + self.elapsed().as_millis() as u64
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        self.advance(duration);
        std::future::ready(())
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // A panic while holding the lock cannot leave the RNG half-updated
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }
}
