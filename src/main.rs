// Entry point for the ledger CLI. Every command opens the store named by
// --db (or the environment), does one thing and exits.
use clap::Parser;
use data_encoding::HEXLOWER;
use ledger_chain::{
    validate_address, Blockchain, BlockchainError, Command, Config, MiningPolicy, Opt, Wallet,
};
use log::{error, info, LevelFilter};
use std::process;

fn main() {
    // Info level shows mining progress without the per-transaction debug noise
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    // Any failure is logged and turned into a non-zero exit status
    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// An explicit --db wins; only without it do I look at the path variables
fn load_config(opt: &Opt) -> Result<Config, BlockchainError> {
    Config::from_env_with_db_path(opt.db.as_deref())
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&opt)?;
    match opt.command {
        // Genesis: the coinbase must be signed by the key behind ADDRESS
        Command::Createblockchain { address, wif } => {
            let wallet = Wallet::from_wif(&wif)?;
            let blockchain = Blockchain::create_with_genesis(config, &address, &wallet)?;
            blockchain.get_storage().flush()?;
            println!("Done! Genesis block: {}", HEXLOWER.encode(&blockchain.get_tip_hash()));
        }
        // Keys are never stored; the user keeps the WIF
        Command::Createwallet => {
            let wallet = Wallet::new();
            println!("Your new address: {}", wallet.get_address());
            println!("Your private key (WIF): {}", wallet.to_wif());
        }
        Command::GetBalance { address } => {
            if !validate_address(&address) {
                return Err(format!("Invalid address: {address}").into());
            }
            let blockchain = Blockchain::load(config)?;
            let balance = blockchain.get_balance(&address)?;
            println!("Balance of {address}: {balance}");
        }
        // Sending only queues the transfer; it is settled once a block carrying it is accepted
        Command::Send {
            from,
            to,
            amount,
            wif,
        } => {
            let wallet = Wallet::from_wif(&wif)?;
            let blockchain = Blockchain::load(config)?;
            let transaction = blockchain.send(&from, &to, amount, &wallet)?;
            blockchain.get_storage().flush()?;
            println!("Success! Transaction {}", transaction.get_id_hex());
        }
        // Walk from the tip back to genesis
        Command::Printchain => {
            let blockchain = Blockchain::load(config)?;
            for block in blockchain.iterator() {
                println!("Height: {}", block.get_height());
                println!("Pre block hash: {}", HEXLOWER.encode(block.get_pre_block_hash()));
                println!("Cur block hash: {}", block.get_hash_hex());
                println!("Cur block Timestamp: {}", block.get_timestamp());
                println!("Nonce: {}", block.get_nonce());
                println!("PoW: {}", block.verify_pow() && block.verify_hash());

                for tx in block.get_transactions() {
                    println!("- Transaction txid_hex: {}", tx.get_id_hex());
                    let from = if tx.is_coinbase() {
                        "coinbase"
                    } else {
                        tx.get_from()
                    };
                    println!(
                        "-- from = {}, to = {}, amount = {}, nonce = {}",
                        from,
                        tx.get_to(),
                        tx.get_amount(),
                        tx.get_nonce()
                    );
                }
                println!()
            }
        }
        Command::Mine {
            address,
            all,
            settle,
        } => {
            if !validate_address(&address) {
                return Err(format!("Invalid miner address: {address}").into());
            }
            let policy = if all {
                MiningPolicy::AllSenders
            } else {
                MiningPolicy::SingleSender
            };
            let config = config
                .with_mining_policy(policy)
                .with_settle_mined_blocks(settle);
            let blockchain = Blockchain::load(config)?;
            let block = blockchain.mine_pending()?;
            blockchain.get_storage().flush()?;
            info!("Block {} mined by {address}", block.get_hash_hex());
            println!(
                "Mined block {} at height {} with {} transactions",
                block.get_hash_hex(),
                block.get_height(),
                block.get_transactions().len()
            );
        }
    }
    Ok(())
}
