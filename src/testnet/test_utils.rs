//! Test utilities for blockchain testing

use crate::config::Config;
use crate::core::{Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::wallet::Wallet;
use secp256k1::SecretKey;
use tempfile::TempDir;

/// Few enough leading zero bits that a block seals in a few hundred hashes.
pub const TEST_DIFFICULTY: u32 = 8;

pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

/// Config for a store under `dir` with a test-friendly difficulty.
pub fn test_config(dir: &TempDir) -> Config {
    Config::new(dir.path().join("test_blockchain")).with_difficulty(TEST_DIFFICULTY)
}

/// Deterministic wallet whose secret key is the integer `seed`.
pub fn test_wallet(seed: u8) -> Wallet {
    let mut bytes = [0u8; 32];
    bytes[31] = seed.max(1);
    Wallet::from_secret_key(SecretKey::from_slice(&bytes).expect("small scalar is a valid key"))
}

/// Chain whose genesis pays `test_wallet(1)`.
pub fn create_test_blockchain() -> Result<(Blockchain, Wallet, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let wallet = test_wallet(1);
    let blockchain =
        Blockchain::create_with_genesis(test_config(&temp_dir), &wallet.get_address(), &wallet)?;
    Ok((blockchain, wallet, temp_dir))
}

/// Fresh node that has replayed every block of `source` through
/// `accept_new_block`.
pub fn create_replica(source: &Blockchain) -> Result<(Blockchain, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let config = test_config(&temp_dir)
        .with_difficulty(source.get_config().get_difficulty())
        .with_subsidy(source.get_config().get_subsidy());
    let replica = Blockchain::create_empty(config)?;

    let mut blocks: Vec<_> = source.iterator().collect();
    blocks.reverse();
    for block in &blocks {
        replica.accept_new_block(block)?;
    }
    Ok((replica, temp_dir))
}

/// Several replicas of `source`.
pub fn create_test_network(
    source: &Blockchain,
    node_count: usize,
) -> Result<Vec<(Blockchain, TempDir)>> {
    (0..node_count).map(|_| create_replica(source)).collect()
}

/// Signed transfer from `from`'s address, not queued anywhere.
pub fn signed_transfer(from: &Wallet, to: &str, amount: i64, nonce: i64) -> Transaction {
    let mut tx = Transaction::new(nonce, amount, &from.get_address(), to).expect("build transfer");
    tx.sign(from.get_secret_key()).expect("sign transfer");
    tx
}

/// Walks the chain from the tip and checks seals, header hashes, heights and
/// links.
pub fn validate_blockchain_integrity(blockchain: &Blockchain) -> Result<bool> {
    let mut expected_hash = blockchain.get_tip_hash();
    let mut expected_height = blockchain.get_best_height()?;

    for block in blockchain.iterator() {
        if block.get_hash() != expected_hash.as_slice()
            || block.get_height() != expected_height
            || !block.verify_pow()
            || !block.verify_hash()
        {
            return Ok(false);
        }
        expected_hash = block.get_pre_block_hash().to_vec();
        expected_height -= 1;
    }

    Ok(expected_hash.is_empty() && expected_height == -1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_blockchain() {
        let (blockchain, wallet, _temp_dir) = create_test_blockchain().unwrap();
        assert_eq!(blockchain.get_best_height().unwrap(), 0);
        assert_eq!(blockchain.get_balance(&wallet.get_address()).unwrap(), 100);
    }

    #[test]
    fn test_test_wallets_are_deterministic() {
        assert_eq!(test_wallet(1).get_address(), "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH");
        assert_eq!(test_wallet(7).get_address(), test_wallet(7).get_address());
        assert_ne!(test_wallet(1).get_address(), test_wallet(2).get_address());
    }

    #[test]
    fn test_create_test_network() {
        let (blockchain, _wallet, _temp_dir) = create_test_blockchain().unwrap();
        let nodes = create_test_network(&blockchain, 3).unwrap();
        assert_eq!(nodes.len(), 3);

        for (node, _) in nodes {
            assert_eq!(node.get_best_height().unwrap(), 0);
            assert_eq!(node.get_tip_hash(), blockchain.get_tip_hash());
        }
    }

    #[test]
    fn test_validate_blockchain_integrity() {
        let (blockchain, wallet, _temp_dir) = create_test_blockchain().unwrap();
        assert!(validate_blockchain_integrity(&blockchain).unwrap());

        let tx = signed_transfer(&wallet, &test_wallet(2).get_address(), 5, 1);
        blockchain.mine(&[tx]).unwrap();
        assert!(validate_blockchain_integrity(&blockchain).unwrap());
    }
}
