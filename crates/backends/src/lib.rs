//! Outbound HTTP contract with generator backends.

pub mod http;
pub mod traits;

pub use http::HttpGeneratorClient;
pub use traits::{FigmentOutcome, GeneratorClient};
