//! Hedgerow Core
//!
//! The seam between protocol logic and system resources. Everything in the
//! higher crates that needs the time or fresh randomness asks an
//! [`Environment`] for it, which keeps key generation, stream setup and KDF
//! calibration deterministic under test.
//!
//! - [`SystemEnv`]: production environment (OS RNG, real clocks, tokio sleep)
//! - `SimEnv`: seeded RNG and a virtual clock, behind the `sim` feature

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod env;
#[cfg(any(test, feature = "sim"))]
pub mod sim_env;
pub mod system_env;

pub use env::Environment;
#[cfg(any(test, feature = "sim"))]
pub use sim_env::SimEnv;
pub use system_env::SystemEnv;
