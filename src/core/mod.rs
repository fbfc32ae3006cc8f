//! Core ledger functionality
//!
//! Accounts, transactions, blocks, proof-of-work sealing and the chain that
//! ties them to storage.

pub mod account;
pub mod block;
pub mod blockchain;
pub mod proof_of_work;
pub mod transaction;

pub use account::Account;
pub use block::Block;
pub use blockchain::{Blockchain, BlockchainIterator};
pub use proof_of_work::ProofOfWork;
pub use transaction::{max_nonce, Transaction};
