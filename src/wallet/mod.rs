//! Wallet keys and addresses
//!
//! secp256k1 key pairs, WIF import/export and Base58Check address
//! derivation and validation.

#[allow(clippy::module_inception)]
pub mod wallet;

pub use wallet::{
    address_from_public_key, convert_address, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
