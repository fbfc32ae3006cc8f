//! Data storage and persistence
//!
//! One sled database holds three independent trees: committed blocks (plus
//! the tip pointer), account state and pending transactions. Every write goes
//! through a sled transaction, so each operation is atomic on its own.

pub mod account_ledger;
pub mod memory_pool;

pub use account_ledger::AccountLedger;
pub use memory_pool::MemoryPool;

use crate::error::{BlockchainError, Result};
use log::debug;
use sled::{Db, Tree};
use std::path::{Path, PathBuf};

pub const BLOCKS_TREE: &str = "blocks";
pub const ACCOUNTS_TREE: &str = "accounts";
pub const PENDING_TREE: &str = "pending_transactions";

/// Key in the blocks tree holding the hash of the current tip.
pub const TIP_BLOCK_HASH_KEY: &[u8] = b"l";

#[derive(Clone)]
pub struct Storage {
    db: Db,
    blocks: Tree,
    accounts: Tree,
    pending: Tree,
    path: PathBuf,
}

impl Storage {
    /// Opens (creating if needed) the database at `path` with all three trees.
    pub fn open(path: &Path) -> Result<Storage> {
        // I keep everything in one sled database so a block commit can span all three trees
        let db = sled::open(path).map_err(|e| {
            BlockchainError::StorageUnavailable(format!("{}: {e}", path.display()))
        })?;
        let open_tree = |name: &str| {
            db.open_tree(name).map_err(|e| {
                BlockchainError::StorageUnavailable(format!("Failed to open {name} tree: {e}"))
            })
        };
        let blocks = open_tree(BLOCKS_TREE)?;
        let accounts = open_tree(ACCOUNTS_TREE)?;
        let pending = open_tree(PENDING_TREE)?;
        debug!("Opened ledger storage at {}", path.display());

        Ok(Storage {
            db,
            blocks,
            accounts,
            pending,
            path: path.to_path_buf(),
        })
    }

    /// Whether anything has ever been created at `path`.
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn blocks(&self) -> &Tree {
        &self.blocks
    }

    pub fn accounts(&self) -> &Tree {
        &self.accounts
    }

    pub fn pending(&self) -> &Tree {
        &self.pending
    }

    pub fn get_path(&self) -> &Path {
        self.path.as_path()
    }

    // The tip is stored next to the blocks under its own key, just like Bitcoin's "l"
    pub fn get_tip_hash(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.blocks.get(TIP_BLOCK_HASH_KEY)?.map(|hash| hash.to_vec()))
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_creates_store() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("ledger");
        assert!(!Storage::exists(&path));

        let storage = Storage::open(&path).unwrap();
        assert!(Storage::exists(&path));
        assert_eq!(storage.get_tip_hash().unwrap(), None);
        assert!(storage.blocks().is_empty());
        assert!(storage.accounts().is_empty());
        assert!(storage.pending().is_empty());
    }

    #[test]
    fn test_trees_are_independent() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::open(&temp_dir.path().join("ledger")).unwrap();

        storage
            .accounts()
            .insert(&b"key"[..], b"account".to_vec())
            .unwrap();
        assert!(storage.pending().get(&b"key"[..]).unwrap().is_none());
        assert!(storage.blocks().get(&b"key"[..]).unwrap().is_none());
    }
}
