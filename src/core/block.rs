use crate::core::{ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, deserialize, serialize, sha256_digest};
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Block {
    timestamp: i64,
    pre_block_hash: Vec<u8>, // Empty for genesis
    hash: Vec<u8>,
    transactions: Vec<Transaction>,
    nonce: i64, // Proof-of-work seal
    height: i64,
    difficulty: u32, // Leading zero bits required of `hash`
}

impl Block {
    /// Assembles a block on top of `pre_block_hash` and seals it. Blocks the
    /// caller until proof-of-work succeeds.
    pub fn new_block(
        pre_block_hash: &[u8],
        transactions: &[Transaction],
        height: i64,
        difficulty: u32,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        // I start with an empty hash and a zero seal; proof-of-work fills both in
        let mut block = Block {
            timestamp: current_timestamp()?,
            pre_block_hash: pre_block_hash.to_vec(),
            hash: vec![],
            transactions: transactions.to_vec(),
            nonce: 0,
            height,
            difficulty,
        };

        info!("Starting proof-of-work for block at height {height} with difficulty {difficulty}");
        let (nonce, hash) = ProofOfWork::new_proof_of_work(&block)?.run()?;
        block.nonce = nonce;
        block.hash = hash;
        info!("Proof-of-work completed for block: {}", block.get_hash_hex());

        Ok(block)
    }

    pub fn generate_genesis_block(coinbase: &Transaction, difficulty: u32) -> Result<Block> {
        Block::new_block(&[], std::slice::from_ref(coinbase), 0, difficulty)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        deserialize::<Block>(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        serialize(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &[u8] {
        self.pre_block_hash.as_slice()
    }

    pub fn get_hash(&self) -> &[u8] {
        self.hash.as_slice()
    }

    pub fn get_hash_hex(&self) -> String {
        HEXLOWER.encode(self.hash.as_slice())
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_height(&self) -> i64 {
        self.height
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash.is_empty()
    }

    /// Digest over the full canonical encoding of every transaction, so the
    /// header hash commits to signatures as well as ids.
    pub fn hash_transactions(&self) -> Result<Vec<u8>> {
        // I hash the whole encodings, signatures included, not just the ids
        let mut encoded = vec![];
        for transaction in &self.transactions {
            encoded.extend(transaction.serialize()?);
        }
        Ok(sha256_digest(encoded.as_slice()))
    }

    /// Re-hashes the header fields with the stored seal and compares against
    /// the stored hash.
    pub fn verify_hash(&self) -> bool {
        match ProofOfWork::new_proof_of_work(self) {
            Ok(pow) => pow.hash_with_nonce(self.nonce) == self.hash,
            Err(_) => false,
        }
    }

    pub fn verify_pow(&self) -> bool {
        ProofOfWork::validate(self)
    }

    #[cfg(test)]
    pub(crate) fn set_hash_for_test(&mut self, hash: Vec<u8>) {
        self.hash = hash;
    }

    #[cfg(test)]
    pub(crate) fn set_nonce_for_test(&mut self, nonce: i64) {
        self.nonce = nonce;
    }

    #[cfg(test)]
    pub(crate) fn transactions_mut_for_test(&mut self) -> &mut Vec<Transaction> {
        &mut self.transactions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH";

    #[test]
    fn test_genesis_shape() {
        let coinbase = Transaction::new_coinbase_tx(ADDRESS, 100).unwrap();
        let genesis = Block::generate_genesis_block(&coinbase, 4).unwrap();

        assert_eq!(genesis.get_height(), 0);
        assert!(genesis.is_genesis());
        assert_eq!(genesis.get_transactions(), &[coinbase]);
        assert!(genesis.verify_pow());
        assert!(genesis.verify_hash());
    }

    #[test]
    fn test_empty_block_is_rejected() {
        assert!(matches!(
            Block::new_block(&[1u8; 32], &[], 1, 4),
            Err(BlockchainError::InvalidBlock(_))
        ));
    }

    #[test]
    fn test_tampered_content_breaks_hash() {
        let coinbase = Transaction::new_coinbase_tx(ADDRESS, 100).unwrap();
        let mut block = Block::new_block(&[7u8; 32], &[coinbase], 1, 4).unwrap();
        assert!(block.verify_hash());

        block.transactions_mut_for_test()[0] = Transaction::new_coinbase_tx(ADDRESS, 1000).unwrap();
        assert!(!block.verify_hash());
        // The stale hash still meets the target, but no longer matches the seal.
        assert!(!block.verify_pow());
    }

    #[test]
    fn test_serialization_round_trip_keeps_seal() {
        let coinbase = Transaction::new_coinbase_tx(ADDRESS, 100).unwrap();
        let block = Block::generate_genesis_block(&coinbase, 4).unwrap();
        let restored = Block::deserialize(&block.serialize().unwrap()).unwrap();
        assert_eq!(restored, block);
        assert!(restored.verify_hash());
    }
}
