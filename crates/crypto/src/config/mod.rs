//! Configuration loading and schema definitions
//!
//! Cost parameters, webhook tolerance and the timestamp unit are tuned here
//! rather than inferred at call sites.

mod loader;
mod schema;

pub use loader::{CryptoConfig, ENV_PREFIX};
pub use schema::*;
