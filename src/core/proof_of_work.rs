use crate::core::Block;
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use log::{debug, info};
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

const HASH_LEN: usize = 32;
const MAX_NONCE: i64 = i64::MAX;

/// Seal search over one block header. `difficulty` is the number of leading
/// zero bits the header hash must have.
pub struct ProofOfWork<'a> {
    block: &'a Block,
    tx_digest: Vec<u8>,
    target: BigInt,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(block: &'a Block) -> Result<ProofOfWork<'a>> {
        Ok(ProofOfWork {
            block,
            tx_digest: block.hash_transactions()?,
            target: Self::target(block.get_difficulty()),
        })
    }

    pub fn target(difficulty: u32) -> BigInt {
        // I need `difficulty` leading zero bits, so anything below 2^(256 - difficulty) works
        let mut target = BigInt::from(1);
        target.shl_assign(256 - difficulty.min(256));
        target
    }

    /// Re-derives the header hash from the stored seal and accepts the block
    /// only if that hash is the one stored and it meets the header's target.
    pub fn validate(block: &Block) -> bool {
        let hash = block.get_hash();
        if hash.len() != HASH_LEN || block.get_difficulty() == 0 {
            return false;
        }
        let pow = match ProofOfWork::new_proof_of_work(block) {
            Ok(pow) => pow,
            Err(_) => return false,
        };
        // I recompute the hash from the seal, so a hash that was edited after
        // sealing fails here even when it still happens to be below the target
        if pow.hash_with_nonce(block.get_nonce()) != hash {
            return false;
        }
        BigInt::from_bytes_be(Sign::Plus, hash) < pow.target
    }

    fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        // I concatenate the header fields in a fixed order, all integers big-endian
        let mut data_bytes = vec![];
        data_bytes.extend(self.block.get_pre_block_hash());
        data_bytes.extend(self.tx_digest.as_slice());
        data_bytes.extend(self.block.get_timestamp().to_be_bytes());
        data_bytes.extend(self.block.get_height().to_be_bytes());
        data_bytes.extend(self.block.get_difficulty().to_be_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    pub fn hash_with_nonce(&self, nonce: i64) -> Vec<u8> {
        sha256_digest(self.prepare_data(nonce).as_slice())
    }

    /// Blocks until a nonce is found whose header hash is below the target.
    pub fn run(&self) -> Result<(i64, Vec<u8>)> {
        debug!(
            "Mining block at height {} (difficulty {})",
            self.block.get_height(),
            self.block.get_difficulty()
        );
        let mut nonce = 0;
        while nonce < MAX_NONCE {
            let hash = self.hash_with_nonce(nonce);
            if BigInt::from_bytes_be(Sign::Plus, hash.as_slice()) < self.target {
                info!("Found seal {nonce}: {}", HEXLOWER.encode(hash.as_slice()));
                return Ok((nonce, hash));
            }
            nonce += 1;
        }
        Err(BlockchainError::InvalidProofOfWork(format!(
            "nonce space exhausted at height {}",
            self.block.get_height()
        )))
    }
}
