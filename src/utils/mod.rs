//! Utility functions and helpers
//!
//! Hashing, Base58 encodings, compact secp256k1 signatures and the
//! canonical bincode encoding shared by every persisted structure.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base58_decode, base58_encode, base58check_decode, base58check_encode, current_timestamp,
    new_secret_key, recover_compact, ripemd160_digest, sha256_digest, sign_compact,
    COMPACT_SIGNATURE_LEN,
};

pub use serialization::{deserialize, serialize};
