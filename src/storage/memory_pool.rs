use crate::core::Transaction;
use crate::error::Result;
use crate::storage::Storage;
use data_encoding::HEXLOWER;
use log::debug;
use sled::Tree;
use std::collections::BTreeMap;

/// Pending transactions, persisted as ( K -> txid, V -> Transaction ).
/// Iteration follows key order, i.e. transaction id order.
#[derive(Clone)]
pub struct MemoryPool {
    pending: Tree,
}

impl MemoryPool {
    pub fn new(storage: &Storage) -> MemoryPool {
        MemoryPool {
            pending: storage.pending().clone(),
        }
    }

    /// Inserts or replaces the transaction stored under its id.
    pub fn add(&self, tx: &Transaction) -> Result<()> {
        // I key by id, so queuing the same transaction twice just overwrites it
        self.pending.insert(tx.get_id(), tx.serialize()?)?;
        debug!("Added transaction {} to the memory pool", tx.get_id_hex());
        Ok(())
    }

    pub fn remove(&self, txid: &[u8]) -> Result<()> {
        if self.pending.remove(txid)?.is_some() {
            debug!("Removed transaction {} from the memory pool", HEXLOWER.encode(txid));
        }
        Ok(())
    }

    pub fn find_by_id(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        match self.pending.get(txid)? {
            Some(bytes) => Ok(Some(Transaction::deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    pub fn find_by_sender(&self, address: &str) -> Result<Vec<Transaction>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|tx| tx.get_from() == address)
            .collect())
    }

    /// Partitions the whole pool by sender. Senders come out in address order.
    pub fn all_grouped_by_sender(&self) -> Result<BTreeMap<String, Vec<Transaction>>> {
        // I use a BTreeMap so "the first sender" is always the same one
        let mut groups: BTreeMap<String, Vec<Transaction>> = BTreeMap::new();
        for tx in self.get_all()? {
            groups.entry(tx.get_from().to_string()).or_default().push(tx);
        }
        Ok(groups)
    }

    pub fn get_all(&self) -> Result<Vec<Transaction>> {
        let mut transactions = vec![];
        for item in self.pending.iter() {
            let (_, value) = item?;
            transactions.push(Transaction::deserialize(value.as_ref())?);
        }
        Ok(transactions)
    }

    pub fn contains(&self, txid: &[u8]) -> Result<bool> {
        Ok(self.pending.contains_key(txid)?)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
