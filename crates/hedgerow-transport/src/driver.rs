//! Background key rotation.
//!
//! The store itself never looks at a clock. [`KeyUpdateDriver`] reads the
//! environment's wall clock, rotates every key set that has fallen behind,
//! and sleeps until the next period boundary.

use std::{sync::Arc, time::Duration};

use hedgerow_core::Environment;
use tokio::sync::Mutex;

use crate::store::TransportKeyStore;

/// Shared handle to a key store.
pub type SharedKeyStore = Arc<Mutex<TransportKeyStore>>;

/// Keeps a [`TransportKeyStore`] in step with wall-clock time.
pub struct KeyUpdateDriver<E: Environment> {
    env: E,
    store: SharedKeyStore,
}

impl<E: Environment> KeyUpdateDriver<E> {
    /// Drive `store` using `env`'s clock.
    pub fn new(env: E, store: SharedKeyStore) -> Self {
        Self { env, store }
    }

    /// Handle to the driven store.
    pub fn store(&self) -> SharedKeyStore {
        Arc::clone(&self.store)
    }

    /// Rotate keys for the current time.
    ///
    /// Returns the delay until the next period boundary.
    pub async fn tick(&self) -> Duration {
        let now_ms = self.env.wall_clock_millis();
        let mut store = self.store.lock().await;

        let updated = store.update_keys(now_ms);
        if !updated.is_empty() {
            tracing::debug!(
                transport = %store.transport_id(),
                count = updated.len(),
                period = store.period_at(now_ms),
                "key sets updated"
            );
        }

        store.time_until_next_update(now_ms)
    }

    /// Rotate keys at every period boundary. Never returns.
    pub async fn run(self) {
        let transport = self.store.lock().await.transport_id().clone();
        tracing::info!(%transport, "key update driver starting");

        loop {
            let delay = self.tick().await;
            self.env.sleep(delay).await;
        }
    }
}

impl<E: Environment> std::fmt::Debug for KeyUpdateDriver<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyUpdateDriver").finish_non_exhaustive()
    }
}
