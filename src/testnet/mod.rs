//! Helpers for spinning up throwaway chains in tests: temporary stores, a low
//! difficulty, deterministic wallets and replica nodes.

pub mod test_utils;

pub use test_utils::*;
