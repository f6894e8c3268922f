//! Orchestration engine: story intake, suggestion lifecycle, quota-aware
//! reassignment, and the chunked generation state machine.
//!
//! The operations in [`stories`], [`suggestions`], and [`generation`] are
//! plain async functions over the store and a [`GeneratorClient`]; the
//! [`Runner`] wraps them in retried background tasks.
//!
//! [`GeneratorClient`]: spindle_backends::GeneratorClient

pub mod generation;
pub mod quota;
pub mod runner;
pub mod stories;
pub mod suggestions;

pub use runner::Runner;
