//! Error handling for the ledger
//!
//! Every fallible operation in the crate returns [`Result`], so callers can
//! branch on the exact condition instead of the process aborting.

use std::fmt;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, BlockchainError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    /// The persisted store could not be opened or initialised
    StorageUnavailable(String),
    /// Read/write failure inside an open store
    Database(String),
    /// Serialization/deserialization errors
    Serialization(String),
    /// Key handling and signature errors
    Crypto(String),
    /// File I/O errors
    Io(String),
    /// Invalid configuration values
    Config(String),
    /// Invalid address format
    InvalidAddress(String),
    /// Chain creation attempted where a chain already exists
    AlreadyInitialized(String),
    /// No chain exists at the configured location
    NotFound(String),
    /// A balance update would leave the account negative
    InsufficientFunds {
        address: String,
        balance: i64,
        delta: i64,
    },
    InvalidTransaction(String),
    InvalidBlock(String),
    InvalidProofOfWork(String),
    /// Previous-hash or height does not continue the current tip
    InvalidChainLink(String),
    /// Mining requested with an empty mempool
    NothingToMine,
}

impl fmt::Display for BlockchainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockchainError::StorageUnavailable(msg) => write!(f, "Storage unavailable: {msg}"),
            BlockchainError::Database(msg) => write!(f, "Database error: {msg}"),
            BlockchainError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            BlockchainError::Crypto(msg) => write!(f, "Cryptographic error: {msg}"),
            BlockchainError::Io(msg) => write!(f, "I/O error: {msg}"),
            BlockchainError::Config(msg) => write!(f, "Configuration error: {msg}"),
            BlockchainError::InvalidAddress(addr) => write!(f, "Invalid address: {addr}"),
            BlockchainError::AlreadyInitialized(path) => {
                write!(f, "Blockchain already exists at {path}")
            }
            BlockchainError::NotFound(msg) => write!(f, "No existing blockchain: {msg}"),
            BlockchainError::InsufficientFunds {
                address,
                balance,
                delta,
            } => {
                write!(
                    f,
                    "Insufficient funds: {address} has {balance}, cannot apply {delta}"
                )
            }
            BlockchainError::InvalidTransaction(msg) => write!(f, "Invalid transaction: {msg}"),
            BlockchainError::InvalidBlock(msg) => write!(f, "Invalid block: {msg}"),
            BlockchainError::InvalidProofOfWork(msg) => write!(f, "Invalid proof of work: {msg}"),
            BlockchainError::InvalidChainLink(msg) => write!(f, "Invalid chain link: {msg}"),
            BlockchainError::NothingToMine => write!(f, "No pending transactions to mine"),
        }
    }
}

impl std::error::Error for BlockchainError {}

impl From<std::io::Error> for BlockchainError {
    fn from(err: std::io::Error) -> Self {
        BlockchainError::Io(err.to_string())
    }
}

impl From<sled::Error> for BlockchainError {
    fn from(err: sled::Error) -> Self {
        BlockchainError::Database(err.to_string())
    }
}

// Aborts raised inside a sled transaction carry our own error back out unchanged.
impl From<sled::transaction::TransactionError<BlockchainError>> for BlockchainError {
    fn from(err: sled::transaction::TransactionError<BlockchainError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(e) => e,
            sled::transaction::TransactionError::Storage(e) => {
                BlockchainError::Database(e.to_string())
            }
        }
    }
}

impl From<bincode::error::EncodeError> for BlockchainError {
    fn from(err: bincode::error::EncodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<bincode::error::DecodeError> for BlockchainError {
    fn from(err: bincode::error::DecodeError) -> Self {
        BlockchainError::Serialization(err.to_string())
    }
}

impl From<secp256k1::Error> for BlockchainError {
    fn from(err: secp256k1::Error) -> Self {
        BlockchainError::Crypto(err.to_string())
    }
}
