//! Configuration management
//!
//! Settings are carried in an explicit [`Config`] handed to the chain at
//! construction. Environment lookups happen only in [`Config::from_env`].

pub mod settings;

pub use settings::{Config, MiningPolicy};
