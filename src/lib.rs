//! # Ledger Chain - an account-based proof-of-work ledger
//!
//! A single-node ledger in which a chain of proof-of-work blocks carries
//! signed value transfers between Bitcoin-style addresses. Balances live in
//! an account table rather than being derived from unspent outputs.
//!
//! ## Layout
//! - `core/`: accounts, transactions, blocks, proof-of-work and the chain
//!   orchestrator that validates, mines and accepts blocks
//! - `storage/`: the sled store with its blocks, accounts and pending trees
//! - `wallet/`: secp256k1 keys, WIF and address derivation
//! - `config/`: explicit runtime settings, optionally read from the environment
//! - `utils/`: hashing, Base58Check, compact signatures, canonical encoding
//! - `cli/`: command-line argument parsing for the binary
//!
//! ## Lifecycle
//! A store is either empty ([`Blockchain::create_empty`]) or holds a chain
//! rooted at a genesis block ([`Blockchain::create_with_genesis`],
//! [`Blockchain::load`]). Transfers are queued with [`Blockchain::send`],
//! sealed with [`Blockchain::mine`] and settled on every node that takes the
//! block through [`Blockchain::accept_new_block`].

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::{Config, MiningPolicy};
pub use core::{max_nonce, Account, Block, Blockchain, BlockchainIterator, ProofOfWork, Transaction};
pub use error::{BlockchainError, Result};
pub use storage::{AccountLedger, MemoryPool, Storage};
pub use utils::{
    base58_decode, base58_encode, current_timestamp, ripemd160_digest, sha256_digest,
};
pub use wallet::{
    address_from_public_key, convert_address, hash_pub_key, validate_address, Wallet,
    ADDRESS_CHECK_SUM_LEN,
};
