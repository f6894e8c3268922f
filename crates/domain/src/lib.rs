//! Shared domain types for spindle: the error taxonomy, engine
//! configuration, range model, entities, and content hashing.

pub mod config;
pub mod entities;
pub mod error;
pub mod hash;
pub mod range;

pub use error::{Error, Result};
