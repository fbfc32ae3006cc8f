use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};

/// Balance and sequence number of one address. Accounts come into existence
/// on their first balance change and are never removed.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Account {
    address: String,
    balance: i64,
    nonce: i64,
}

impl Account {
    pub fn new(address: &str, balance: i64, nonce: i64) -> Account {
        Account {
            address: address.to_string(),
            balance,
            nonce,
        }
    }

    /// The zero account every address starts from.
    pub fn empty(address: &str) -> Account {
        Self::new(address, 0, 0)
    }

    /// Returns the account after a balance change of `delta`. Every change,
    /// credit or debit, bumps the nonce. A result below zero is refused.
    pub fn apply_delta(&self, delta: i64) -> Result<Account> {
        // I treat an overflow the same as an overdraft: the change is refused
        let balance = self
            .balance
            .checked_add(delta)
            .filter(|balance| *balance >= 0)
            .ok_or_else(|| BlockchainError::InsufficientFunds {
                address: self.address.clone(),
                balance: self.balance,
                delta,
            })?;

        // The nonce counts every balance event on this account, not just sends
        Ok(Account {
            address: self.address.clone(),
            balance,
            nonce: self.nonce + 1,
        })
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_balance(&self) -> i64 {
        self.balance
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }
}
