use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "ledger-chain")]
pub struct Opt {
    /// Ledger store location. Defaults to $LEDGER_DB_PATH, then $HOME/.blockchain.db
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "createblockchain", about = "Create a new blockchain")]
    Createblockchain {
        #[arg(long, help = "The address to send the genesis subsidy to")]
        address: String,
        #[arg(long, help = "WIF private key of ADDRESS, used to sign the genesis coinbase")]
        wif: String,
    },
    #[command(name = "createwallet", about = "Generate a key pair and print its address and WIF")]
    Createwallet,
    #[command(name = "getbalance", about = "Get the balance of the target address")]
    GetBalance {
        #[arg(long, help = "The wallet address")]
        address: String,
    },
    #[command(name = "send", about = "Queue a signed transfer in the memory pool")]
    Send {
        #[arg(long, help = "Source wallet address")]
        from: String,
        #[arg(long, help = "Destination wallet address")]
        to: String,
        #[arg(long, help = "Amount to send")]
        amount: i64,
        #[arg(long, help = "WIF private key of the source address")]
        wif: String,
    },
    #[command(name = "printchain", about = "Print all blocks in the blockchain")]
    Printchain,
    #[command(name = "mine", about = "Seal pending transactions into a new block")]
    Mine {
        #[arg(long, help = "Miner address")]
        address: String,
        #[arg(long, help = "Pack every pending sender instead of just the first one")]
        all: bool,
        #[arg(long, help = "Apply the block's transfers to account balances on commit")]
        settle: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_send() {
        let opt = Opt::try_parse_from([
            "ledger-chain",
            "send",
            "--from",
            "1BgGZ9tcN4rm9KBzDn7KprQz87SZ26SAMH",
            "--to",
            "1cMh228HTCiwS8ZsaakH8A8wze1JR5ZsP",
            "--amount",
            "30",
            "--wif",
            "KwDiBf89QgGbjEhKnhXJuH7LrciVrZi3qYjgd9M7rFU73sVHnoWn",
        ])
        .unwrap();
        assert!(opt.db.is_none());
        assert!(matches!(opt.command, Command::Send { amount: 30, .. }));
    }

    #[test]
    fn test_global_db_flag() {
        let opt = Opt::try_parse_from(["ledger-chain", "printchain", "--db", "/tmp/chain"]).unwrap();
        assert_eq!(opt.db, Some(PathBuf::from("/tmp/chain")));
        assert!(matches!(opt.command, Command::Printchain));
    }

    #[test]
    fn test_missing_required_flag_is_rejected() {
        assert!(Opt::try_parse_from(["ledger-chain", "getbalance"]).is_err());
        assert!(Opt::try_parse_from(["ledger-chain", "send", "--from", "a", "--to", "b"]).is_err());
    }

    #[test]
    fn test_mine_flags() {
        let opt =
            Opt::try_parse_from(["ledger-chain", "mine", "--address", "miner", "--all"]).unwrap();
        match opt.command {
            Command::Mine {
                address,
                all,
                settle,
            } => {
                assert_eq!(address, "miner");
                assert!(all);
                assert!(!settle);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
