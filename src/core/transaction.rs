// A transaction moves `amount` from one account to another. Its identity is
// fixed at construction: the id hashes the transfer fields with the signature
// slot empty, and the signature covers that same pre-signature encoding. That
// lets anyone rebuild the signed bytes from {nonce, from, to, amount} alone.

use crate::error::{BlockchainError, Result};
use crate::utils::{recover_compact, serialize, sha256_digest, sign_compact};
use crate::wallet::address_from_public_key;
use data_encoding::HEXLOWER;
use log::debug;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    id: Vec<u8>,        // SHA-256 of the pre-signature encoding
    nonce: i64,         // Sender's sequence number for this transfer
    from: String,       // Empty for coinbase
    to: String,         // Recipient address
    amount: i64,        // Value moved
    signature: Vec<u8>, // Compact recoverable signature
}

impl Transaction {
    pub fn new(nonce: i64, amount: i64, from: &str, to: &str) -> Result<Transaction> {
        let mut tx = Transaction {
            id: vec![],
            nonce,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            signature: vec![],
        };
        // I hash the transaction while both id and signature are still empty
        tx.id = sha256_digest(serialize(&tx)?.as_slice());
        Ok(tx)
    }

    /// A coinbase pays `subsidy` to `to` without debiting anyone.
    pub fn new_coinbase_tx(to: &str, subsidy: i64) -> Result<Transaction> {
        Self::new(0, subsidy, "", to)
    }

    pub fn is_coinbase(&self) -> bool {
        self.from.is_empty()
    }

    // The bytes that get signed: the transaction as it was at construction.
    fn signing_payload(&self) -> Result<Vec<u8>> {
        let unsigned = Transaction {
            signature: vec![],
            ..self.clone()
        };
        serialize(&unsigned)
    }

    pub fn sign(&mut self, secret_key: &SecretKey) -> Result<()> {
        let payload = self.signing_payload()?;
        // I always sign with the compressed key, since that is what addresses are derived from
        self.signature = sign_compact(secret_key, payload.as_slice(), true)?;
        debug!("Signed transaction {}", HEXLOWER.encode(&self.id));
        Ok(())
    }

    /// Rebuilds the transaction from its transfer fields, recovers the signer
    /// from the signature and checks it is the sender (the recipient for a
    /// coinbase). A stored id that does not match the rebuilt one, or any
    /// recovery failure including an uncompressed-key signature, is `false`.
    pub fn verify(&self) -> bool {
        // I rebuild from the transfer fields alone so nothing stored can vouch for itself
        let rebuilt = match Transaction::new(self.nonce, self.amount, &self.from, &self.to) {
            Ok(tx) => tx,
            Err(_) => return false,
        };
        if rebuilt.id != self.id {
            return false;
        }
        let payload = match serialize(&rebuilt) {
            Ok(payload) => payload,
            Err(_) => return false,
        };

        match recover_compact(self.signature.as_slice(), payload.as_slice()) {
            // The recovered key has to hash to the address that is spending
            Ok((public_key, true)) => address_from_public_key(&public_key) == self.signer(),
            _ => false,
        }
    }

    /// The address whose key must have produced the signature.
    pub fn signer(&self) -> &str {
        if self.is_coinbase() {
            self.to.as_str()
        } else {
            self.from.as_str()
        }
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_id_hex(&self) -> String {
        HEXLOWER.encode(self.id.as_slice())
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn get_from(&self) -> &str {
        self.from.as_str()
    }

    pub fn get_to(&self) -> &str {
        self.to.as_str()
    }

    pub fn get_amount(&self) -> i64 {
        self.amount
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        crate::utils::deserialize(bytes)
    }

    /// Structural checks applied before a transaction may enter a block.
    pub fn check_well_formed(&self) -> Result<()> {
        if self.amount <= 0 {
            return Err(BlockchainError::InvalidTransaction(format!(
                "{}: amount must be positive, got {}",
                self.get_id_hex(),
                self.amount
            )));
        }
        if self.to.is_empty() {
            return Err(BlockchainError::InvalidTransaction(format!(
                "{}: missing recipient",
                self.get_id_hex()
            )));
        }
        Ok(())
    }
}

/// Highest nonce among `transactions`, or -1 when there are none.
pub fn max_nonce(transactions: &[Transaction]) -> i64 {
    transactions
        .iter()
        .map(Transaction::get_nonce)
        .max()
        .unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;

    fn wallet(byte: u8) -> Wallet {
        Wallet::from_secret_key(SecretKey::from_slice(&[byte; 32]).unwrap())
    }

    fn signed_transfer(sender: &Wallet, to: &str, amount: i64) -> Transaction {
        let mut tx = Transaction::new(1, amount, &sender.get_address(), to).unwrap();
        tx.sign(sender.get_secret_key()).unwrap();
        tx
    }

    #[test]
    fn test_id_is_deterministic_and_survives_signing() {
        let sender = wallet(1);
        let a = Transaction::new(3, 30, &sender.get_address(), "to").unwrap();
        let b = Transaction::new(3, 30, &sender.get_address(), "to").unwrap();
        assert_eq!(a.get_id(), b.get_id());
        assert_eq!(a.get_id().len(), 32);

        let mut signed = a.clone();
        signed.sign(sender.get_secret_key()).unwrap();
        assert_eq!(signed.get_id(), a.get_id());
        assert!(a.get_signature().is_empty());
    }

    #[test]
    fn test_id_depends_on_every_field() {
        let base = Transaction::new(1, 10, "from", "to").unwrap();
        assert_ne!(base.get_id(), Transaction::new(2, 10, "from", "to").unwrap().get_id());
        assert_ne!(base.get_id(), Transaction::new(1, 11, "from", "to").unwrap().get_id());
        assert_ne!(base.get_id(), Transaction::new(1, 10, "frm", "to").unwrap().get_id());
        assert_ne!(base.get_id(), Transaction::new(1, 10, "from", "t").unwrap().get_id());
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let sender = wallet(1);
        let tx = signed_transfer(&sender, &wallet(2).get_address(), 30);
        assert!(tx.verify());
    }

    #[test]
    fn test_unsigned_transaction_fails() {
        let sender = wallet(1);
        let tx = Transaction::new(1, 5, &sender.get_address(), "to").unwrap();
        assert!(!tx.verify());
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let sender = wallet(1);
        let mut tx = Transaction::new(1, 5, &sender.get_address(), "to").unwrap();
        tx.sign(wallet(2).get_secret_key()).unwrap();
        assert!(!tx.verify());
    }

    #[test]
    fn test_tampered_fields_fail_verification() {
        let sender = wallet(1);
        let receiver = wallet(2).get_address();
        let tx = signed_transfer(&sender, &receiver, 30);

        let mut tampered = tx.clone();
        tampered.amount ^= 1;
        assert!(!tampered.verify());

        let mut tampered = tx.clone();
        tampered.to = wallet(3).get_address();
        assert!(!tampered.verify());

        let mut tampered = tx.clone();
        tampered.from = wallet(3).get_address();
        assert!(!tampered.verify());

        let mut tampered = tx.clone();
        tampered.nonce += 1;
        assert!(!tampered.verify());

        let mut tampered = tx;
        tampered.id[0] ^= 1;
        assert!(!tampered.verify());
    }

    #[test]
    fn test_any_signature_bit_flip_fails() {
        let sender = wallet(1);
        let tx = signed_transfer(&sender, &wallet(2).get_address(), 30);

        for byte in 0..tx.signature.len() {
            for bit in [0u8, 3, 7] {
                let mut tampered = tx.clone();
                tampered.signature[byte] ^= 1 << bit;
                assert!(!tampered.verify(), "flip of byte {byte} bit {bit} verified");
            }
        }
    }

    #[test]
    fn test_uncompressed_signature_is_rejected() {
        let sender = wallet(1);
        let mut tx = Transaction::new(1, 5, &sender.get_address(), "to").unwrap();
        let payload = tx.signing_payload().unwrap();
        tx.signature = sign_compact(sender.get_secret_key(), &payload, false).unwrap();
        assert!(!tx.verify());
    }

    #[test]
    fn test_coinbase_is_signed_by_recipient() {
        let miner = wallet(4);
        let mut coinbase = Transaction::new_coinbase_tx(&miner.get_address(), 100).unwrap();
        assert!(coinbase.is_coinbase());
        coinbase.sign(miner.get_secret_key()).unwrap();
        assert!(coinbase.verify());

        let mut forged = Transaction::new_coinbase_tx(&miner.get_address(), 100).unwrap();
        forged.sign(wallet(5).get_secret_key()).unwrap();
        assert!(!forged.verify());
    }

    #[test]
    fn test_well_formed_rules() {
        assert!(Transaction::new(1, 1, "a", "b").unwrap().check_well_formed().is_ok());
        assert!(Transaction::new(1, 0, "a", "b").unwrap().check_well_formed().is_err());
        assert!(Transaction::new(1, -5, "a", "b").unwrap().check_well_formed().is_err());
        assert!(Transaction::new(1, 5, "a", "").unwrap().check_well_formed().is_err());
    }

    #[test]
    fn test_max_nonce() {
        assert_eq!(max_nonce(&[]), -1);
        let txs = vec![
            Transaction::new(4, 1, "a", "b").unwrap(),
            Transaction::new(9, 1, "a", "b").unwrap(),
            Transaction::new(2, 1, "a", "b").unwrap(),
        ];
        assert_eq!(max_nonce(&txs), 9);
    }
}
