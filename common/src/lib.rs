//! Provides types and functions common to both the engine and the runner.
#![deny(missing_docs)]
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod wait;

pub use wait::WaitConfig;
