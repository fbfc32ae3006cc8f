use crate::core::Account;
use crate::error::{BlockchainError, Result};
use crate::storage::Storage;
use crate::utils::{deserialize, serialize};
use log::debug;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree,
};
use sled::Tree;

/// Persistent address -> account map. Balances never go below zero: an update
/// that would do so is aborted and leaves the stored account untouched.
#[derive(Clone)]
pub struct AccountLedger {
    accounts: Tree,
}

impl AccountLedger {
    pub fn new(storage: &Storage) -> AccountLedger {
        AccountLedger {
            accounts: storage.accounts().clone(),
        }
    }

    /// Atomically applies `delta` to the balance of `address`, creating the
    /// account on first use, and returns the stored result.
    pub fn change_balance(&self, address: &str, delta: i64) -> Result<Account> {
        let account = self
            .accounts
            .transaction(|accounts| Self::apply_in(accounts, address, delta))?;
        debug!(
            "Balance of {address} changed by {delta}: now {} (nonce {})",
            account.get_balance(),
            account.get_nonce()
        );
        Ok(account)
    }

    /// The balance update as a step of a larger sled transaction. Used both by
    /// `change_balance` and by the chain when it commits a whole block.
    pub(crate) fn apply_in(
        accounts: &TransactionalTree,
        address: &str,
        delta: i64,
    ) -> ConflictableTransactionResult<Account, BlockchainError> {
        // I start from the zero account when this address has never been touched
        let current = match accounts.get(address.as_bytes())? {
            Some(bytes) => {
                deserialize::<Account>(bytes.as_ref()).map_err(ConflictableTransactionError::Abort)?
            }
            None => Account::empty(address),
        };
        // An overdraft aborts here, before anything is written
        let updated = current
            .apply_delta(delta)
            .map_err(ConflictableTransactionError::Abort)?;
        let bytes = serialize(&updated).map_err(ConflictableTransactionError::Abort)?;
        accounts.insert(address.as_bytes(), bytes)?;
        Ok(updated)
    }

    /// Overwrites the stored account.
    pub fn put_account(&self, account: &Account) -> Result<()> {
        // Even a direct write must respect the non-negative balance rule
        if account.get_balance() < 0 {
            return Err(BlockchainError::InsufficientFunds {
                address: account.get_address().to_string(),
                balance: account.get_balance(),
                delta: 0,
            });
        }
        self.accounts
            .insert(account.get_address().as_bytes(), serialize(account)?)?;
        Ok(())
    }

    pub fn get_account(&self, address: &str) -> Result<Option<Account>> {
        match self.accounts.get(address.as_bytes())? {
            Some(bytes) => Ok(Some(deserialize(bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Balance of `address`, zero for an unknown address.
    pub fn get_balance(&self, address: &str) -> Result<i64> {
        Ok(self
            .get_account(address)?
            .map(|account| account.get_balance())
            .unwrap_or(0))
    }
}
