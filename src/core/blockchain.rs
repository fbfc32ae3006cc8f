// The chain owns the tip pointer and the storage handle. Blocks reach storage
// by one of two routes: mining locally (`mine`) or accepting a block produced
// elsewhere (`accept_new_block`). Both end in `commit_block`, a single sled
// transaction over the blocks, accounts and pending trees, so a commit either
// lands completely or not at all.

use crate::config::{Config, MiningPolicy};
use crate::core::{max_nonce, Account, Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::storage::{AccountLedger, MemoryPool, Storage, TIP_BLOCK_HASH_KEY};
use crate::wallet::{validate_address, Wallet};
use data_encoding::HEXLOWER;
use log::{info, warn};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::{Transactional, Tree};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

// I use this to tell `commit_block` what to do with the account ledger
#[derive(Clone, Copy)]
enum Settlement {
    // Self-mined blocks leave balances alone unless the config says otherwise
    Skip,
    // Credit every recipient, debit every non-coinbase sender
    Apply,
}

#[derive(Clone)]
pub struct Blockchain {
    tip_hash: Arc<RwLock<Vec<u8>>>, // Empty until a genesis block is committed
    storage: Storage,
    ledger: AccountLedger,
    mempool: MemoryPool,
    config: Config,
}

impl Blockchain {
    fn with_storage(storage: Storage, tip_hash: Vec<u8>, config: Config) -> Blockchain {
        Blockchain {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            ledger: AccountLedger::new(&storage),
            mempool: MemoryPool::new(&storage),
            storage,
            config,
        }
    }

    /// Opens the store with its trees but without requiring a chain. An
    /// existing chain at the same location is picked up as-is.
    pub fn create_empty(config: Config) -> Result<Blockchain> {
        config.validate()?;
        let storage = Storage::open(config.get_db_path())?;
        let tip_hash = storage.get_tip_hash()?.unwrap_or_default();
        if tip_hash.is_empty() {
            info!("Initialised empty ledger at {}", storage.get_path().display());
        }
        Ok(Self::with_storage(storage, tip_hash, config))
    }

    /// Creates a chain whose genesis block pays the subsidy to
    /// `genesis_address`. The coinbase is signed with `wallet`, which must
    /// own that address.
    pub fn create_with_genesis(
        config: Config,
        genesis_address: &str,
        wallet: &Wallet,
    ) -> Result<Blockchain> {
        config.validate()?;

        // I check for an existing chain first, so a second createblockchain is
        // always reported as such whatever address or key it was given
        let chain = Self::create_empty(config)?;
        if !chain.get_tip_hash().is_empty() {
            return Err(BlockchainError::AlreadyInitialized(
                chain.storage.get_path().display().to_string(),
            ));
        }

        if !validate_address(genesis_address) {
            return Err(BlockchainError::InvalidAddress(genesis_address.to_string()));
        }
        if wallet.get_address() != genesis_address {
            return Err(BlockchainError::Crypto(format!(
                "Signing key does not belong to {genesis_address}"
            )));
        }

        info!("Creating genesis block for address: {genesis_address}");
        let subsidy = chain.config.get_subsidy();
        let mut coinbase_tx = Transaction::new_coinbase_tx(genesis_address, subsidy)?;
        coinbase_tx.sign(wallet.get_secret_key())?;
        let genesis = Block::generate_genesis_block(&coinbase_tx, chain.config.get_difficulty())?;

        // I settle the genesis coinbase exactly like an accepted block does, so
        // the creating node and every replica hold the same opening account
        chain
            .commit_block(&genesis, Settlement::Apply)
            .map_err(|e| match e {
                // Someone else committed a genesis block between our check and commit.
                BlockchainError::InvalidChainLink(_) => BlockchainError::AlreadyInitialized(
                    chain.storage.get_path().display().to_string(),
                ),
                other => other,
            })?;
        Ok(chain)
    }

    /// Reopens an existing chain.
    pub fn load(config: Config) -> Result<Blockchain> {
        config.validate()?;
        if !Storage::exists(config.get_db_path()) {
            return Err(BlockchainError::NotFound(
                config.get_db_path().display().to_string(),
            ));
        }
        let storage = Storage::open(config.get_db_path())?;
        let tip_hash = storage.get_tip_hash()?.ok_or_else(|| {
            BlockchainError::NotFound(format!(
                "{} has no chain tip",
                config.get_db_path().display()
            ))
        })?;
        Ok(Self::with_storage(storage, tip_hash, config))
    }

    pub fn get_storage(&self) -> &Storage {
        &self.storage
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn get_tip_hash(&self) -> Vec<u8> {
        match self.tip_hash.read() {
            Ok(tip_hash) => tip_hash.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_tip_hash(&self, new_tip_hash: &[u8]) {
        let mut tip_hash = match self.tip_hash.write() {
            Ok(tip_hash) => tip_hash,
            Err(poisoned) => poisoned.into_inner(),
        };
        *tip_hash = new_tip_hash.to_vec();
    }

    pub fn iterator(&self) -> BlockchainIterator {
        BlockchainIterator::new(self.get_tip_hash(), self.storage.blocks().clone())
    }

    pub fn get_block(&self, block_hash: &[u8]) -> Result<Option<Block>> {
        if block_hash.is_empty() {
            return Ok(None);
        }
        match self.storage.blocks().get(block_hash)? {
            Some(block_bytes) => Ok(Some(Block::deserialize(block_bytes.as_ref())?)),
            None => Ok(None),
        }
    }

    /// Height of the tip block, or -1 for a chain without blocks.
    pub fn get_best_height(&self) -> Result<i64> {
        let tip_hash = self.get_tip_hash();
        if tip_hash.is_empty() {
            return Ok(-1);
        }
        let tip_block = self.get_block(&tip_hash)?.ok_or_else(|| {
            BlockchainError::Database(format!(
                "Tip block {} missing from store",
                HEXLOWER.encode(&tip_hash)
            ))
        })?;
        Ok(tip_block.get_height())
    }

    pub fn get_balance(&self, address: &str) -> Result<i64> {
        self.ledger.get_balance(address)
    }

    pub fn get_account(&self, address: &str) -> Result<Option<Account>> {
        self.ledger.get_account(address)
    }

    pub fn save_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.mempool.add(transaction)
    }

    pub fn find_unpacked_transaction_by_id(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        self.mempool.find_by_id(txid)
    }

    pub fn find_unpacked_transactions_by_sender(&self, address: &str) -> Result<Vec<Transaction>> {
        self.mempool.find_by_sender(address)
    }

    pub fn find_all_unpacked_transactions(&self) -> Result<BTreeMap<String, Vec<Transaction>>> {
        self.mempool.all_grouped_by_sender()
    }

    /// Builds, signs and queues a transfer. The nonce continues after the
    /// sender's highest pending nonce, or after the account nonce when
    /// nothing is pending.
    pub fn send(&self, from: &str, to: &str, amount: i64, wallet: &Wallet) -> Result<Transaction> {
        if !validate_address(from) {
            return Err(BlockchainError::InvalidAddress(format!(
                "Invalid sender address: {from}"
            )));
        }
        if !validate_address(to) {
            return Err(BlockchainError::InvalidAddress(format!(
                "Invalid recipient address: {to}"
            )));
        }
        if amount <= 0 {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Amount must be positive, got {amount}"
            )));
        }
        if wallet.get_address() != from {
            return Err(BlockchainError::Crypto(format!(
                "Signing key does not belong to {from}"
            )));
        }

        // I continue after my own pending transfers first, so several sends
        // before the next block still get distinct nonces
        let pending = self.mempool.find_by_sender(from)?;
        let nonce = if pending.is_empty() {
            self.ledger
                .get_account(from)?
                .map(|account| account.get_nonce())
                .unwrap_or(0)
                + 1
        } else {
            max_nonce(&pending) + 1
        };

        let mut transaction = Transaction::new(nonce, amount, from, to)?;
        transaction.sign(wallet.get_secret_key())?;
        // I check my own signature before it goes anywhere near the mempool
        if !transaction.verify() {
            return Err(BlockchainError::InvalidTransaction(format!(
                "Freshly signed transaction {} does not verify",
                transaction.get_id_hex()
            )));
        }

        self.save_transaction(&transaction)?;
        info!(
            "Queued transaction {}: {from} -> {to} ({amount}, nonce {nonce})",
            transaction.get_id_hex()
        );
        Ok(transaction)
    }

    /// Picks pending transactions according to `policy`, each sender's
    /// transactions ordered by nonce.
    pub fn collect_pending(&self, policy: MiningPolicy) -> Result<Vec<Transaction>> {
        let mut groups = self.mempool.all_grouped_by_sender()?;
        let mut transactions: Vec<Transaction> = match policy {
            MiningPolicy::SingleSender => match groups.pop_first() {
                Some((_, group)) => group,
                None => vec![],
            },
            MiningPolicy::AllSenders => groups.into_values().flatten().collect(),
        };
        transactions.sort_by(|a, b| {
            a.get_from()
                .cmp(b.get_from())
                .then(a.get_nonce().cmp(&b.get_nonce()))
        });
        Ok(transactions)
    }

    /// Mines the pending transactions selected by the configured policy.
    pub fn mine_pending(&self) -> Result<Block> {
        let transactions = self.collect_pending(self.config.get_mining_policy())?;
        if transactions.is_empty() {
            return Err(BlockchainError::NothingToMine);
        }
        self.mine(&transactions)
    }

    /// Verifies `transactions`, seals them into a block on the current tip
    /// and commits it, pruning them from the mempool. Blocks until the seal
    /// is found. Balances are only settled when the config asks for it.
    pub fn mine(&self, transactions: &[Transaction]) -> Result<Block> {
        let tip_hash = self.get_tip_hash();
        if tip_hash.is_empty() {
            return Err(BlockchainError::NotFound(
                "Cannot mine on a chain without a genesis block".to_string(),
            ));
        }
        if transactions.is_empty() {
            return Err(BlockchainError::NothingToMine);
        }
        // I never seal anything that another node would reject
        if let Err(e) = Self::validate_transactions(transactions, false) {
            warn!("Refusing to mine: {e}");
            return Err(e);
        }

        let next_height = self.get_best_height()? + 1;
        info!(
            "Mining block at height {next_height} with {} transactions",
            transactions.len()
        );
        let block = Block::new_block(
            &tip_hash,
            transactions,
            next_height,
            self.config.get_difficulty(),
        )?;

        // By default my own blocks don't touch balances; replicas settle them on accept
        let settlement = if self.config.settles_mined_blocks() {
            Settlement::Apply
        } else {
            Settlement::Skip
        };
        self.commit_block(&block, settlement)?;
        info!("Successfully mined block: {}", block.get_hash_hex());
        Ok(block)
    }

    /// Validates an externally produced block and, if every check passes,
    /// appends it and settles its transfers. Nothing is written on failure.
    pub fn accept_new_block(&self, block: &Block) -> Result<()> {
        if let Err(e) = self.validate_new_block(block) {
            warn!("Rejected block {}: {e}", block.get_hash_hex());
            return Err(e);
        }
        if let Err(e) = self.commit_block(block, Settlement::Apply) {
            warn!("Failed to commit block {}: {e}", block.get_hash_hex());
            return Err(e);
        }
        info!(
            "Accepted block {} at height {}",
            block.get_hash_hex(),
            block.get_height()
        );
        Ok(())
    }

    fn validate_new_block(&self, block: &Block) -> Result<()> {
        // 1. proof of work, against this chain's fixed difficulty
        if block.get_difficulty() != self.config.get_difficulty() {
            return Err(BlockchainError::InvalidProofOfWork(format!(
                "difficulty {} does not match required {}",
                block.get_difficulty(),
                self.config.get_difficulty()
            )));
        }
        if !block.verify_pow() {
            return Err(BlockchainError::InvalidProofOfWork(format!(
                "hash {} does not meet the target",
                block.get_hash_hex()
            )));
        }

        // 2. continuity with the current tip, and an honest header hash
        let tip_hash = self.get_tip_hash();
        let current_height = self.get_best_height()?;
        if block.get_pre_block_hash() != tip_hash.as_slice() {
            return Err(BlockchainError::InvalidChainLink(format!(
                "previous hash {} does not match tip {}",
                HEXLOWER.encode(block.get_pre_block_hash()),
                HEXLOWER.encode(&tip_hash)
            )));
        }
        if block.get_height() != current_height + 1 {
            return Err(BlockchainError::InvalidChainLink(format!(
                "height {} does not follow tip height {current_height}",
                block.get_height()
            )));
        }
        if !block.verify_hash() {
            return Err(BlockchainError::InvalidBlock(format!(
                "stored hash {} does not match block contents",
                block.get_hash_hex()
            )));
        }

        // 3. transactions
        let transactions = block.get_transactions();
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "block has no transactions".to_string(),
            ));
        }
        let is_genesis = block.get_height() == 0;
        if is_genesis {
            let subsidy = self.config.get_subsidy();
            let valid_coinbase = transactions.len() == 1
                && transactions[0].is_coinbase()
                && transactions[0].get_amount() == subsidy;
            if !valid_coinbase {
                return Err(BlockchainError::InvalidBlock(format!(
                    "genesis must hold exactly one coinbase of {subsidy}"
                )));
            }
        }
        Self::validate_transactions(transactions, is_genesis)
    }

    fn validate_transactions(transactions: &[Transaction], allow_coinbase: bool) -> Result<()> {
        for (i, transaction) in transactions.iter().enumerate() {
            if !transaction.verify() {
                return Err(BlockchainError::InvalidTransaction(format!(
                    "transaction {i} ({}) has an invalid signature",
                    transaction.get_id_hex()
                )));
            }
            transaction.check_well_formed()?;
            if transaction.is_coinbase() && !allow_coinbase {
                return Err(BlockchainError::InvalidTransaction(format!(
                    "transaction {i} ({}) is a coinbase outside the genesis block",
                    transaction.get_id_hex()
                )));
            }
        }
        Ok(())
    }

    fn commit_block(&self, block: &Block, settlement: Settlement) -> Result<()> {
        let block_data = block.serialize()?;
        let expected_tip = block.get_pre_block_hash();

        let storage = &self.storage;
        (storage.blocks(), storage.accounts(), storage.pending())
            .transaction(
                |(blocks, accounts, pending)| -> ConflictableTransactionResult<(), BlockchainError> {
                    // I only append on top of the tip this block was built on;
                    // if another commit got there first the whole thing aborts
                    let current_tip = blocks
                        .get(TIP_BLOCK_HASH_KEY)?
                        .map(|tip| tip.to_vec())
                        .unwrap_or_default();
                    if current_tip.as_slice() != expected_tip {
                        return Err(ConflictableTransactionError::Abort(
                            BlockchainError::InvalidChainLink(format!(
                                "tip moved to {} before block {} was committed",
                                HEXLOWER.encode(&current_tip),
                                block.get_hash_hex()
                            )),
                        ));
                    }

                    blocks.insert(block.get_hash(), block_data.as_slice())?;
                    blocks.insert(TIP_BLOCK_HASH_KEY, block.get_hash())?;

                    // Any overdraft aborts the transaction and rolls back the block too
                    match settlement {
                        Settlement::Skip => {}
                        Settlement::Apply => {
                            for tx in block.get_transactions() {
                                AccountLedger::apply_in(accounts, tx.get_to(), tx.get_amount())?;
                                if !tx.is_coinbase() {
                                    AccountLedger::apply_in(
                                        accounts,
                                        tx.get_from(),
                                        -tx.get_amount(),
                                    )?;
                                }
                            }
                        }
                    }

                    // I prune whatever this block carried from the local mempool
                    for tx in block.get_transactions() {
                        pending.remove(tx.get_id())?;
                    }
                    Ok(())
                },
            )?;

        self.set_tip_hash(block.get_hash());
        Ok(())
    }
}

/// Walks the chain backwards from the tip to the genesis block.
pub struct BlockchainIterator {
    blocks: Tree,
    current_hash: Vec<u8>,
}

impl BlockchainIterator {
    fn new(tip_hash: Vec<u8>, blocks: Tree) -> BlockchainIterator {
        BlockchainIterator {
            blocks,
            current_hash: tip_hash,
        }
    }
}

impl Iterator for BlockchainIterator {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_hash.is_empty() {
            return None;
        }
        let data = self.blocks.get(&self.current_hash).ok()??;
        let block = Block::deserialize(data.as_ref()).ok()?;
        self.current_hash = block.get_pre_block_hash().to_vec();
        Some(block)
    }
}
