use crate::error::{BlockchainError, Result};
use std::env;
use std::path::{Path, PathBuf};

const DB_FILE_NAME: &str = ".blockchain.db";
const DEFAULT_DIFFICULTY: u32 = 16;
const DEFAULT_SUBSIDY: i64 = 100;

const DB_PATH_KEY: &str = "LEDGER_DB_PATH";
const DIFFICULTY_KEY: &str = "LEDGER_DIFFICULTY";
const HOME_KEY: &str = "HOME";

/// Which pending transactions a single `mine` call packs into a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningPolicy {
    /// One sender per block: the first sender in address order.
    #[default]
    SingleSender,
    /// Every pending transaction, grouped by sender.
    AllSenders,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    db_path: PathBuf,
    difficulty: u32,
    subsidy: i64,
    mining_policy: MiningPolicy,
    settle_mined_blocks: bool,
}

impl Config {
    pub fn new(db_path: impl AsRef<Path>) -> Config {
        Config {
            db_path: db_path.as_ref().to_path_buf(),
            difficulty: DEFAULT_DIFFICULTY,
            subsidy: DEFAULT_SUBSIDY,
            mining_policy: MiningPolicy::default(),
            settle_mined_blocks: false,
        }
    }

    /// Resolves the store location from `LEDGER_DB_PATH`, falling back to
    /// `$HOME/.blockchain.db`, and the difficulty from `LEDGER_DIFFICULTY`.
    pub fn from_env() -> Result<Config> {
        Self::from_env_with_db_path(None)
    }

    /// Like [`Config::from_env`], but an explicit `db_path` wins and the
    /// path variables are then never consulted.
    pub fn from_env_with_db_path(db_path: Option<&Path>) -> Result<Config> {
        Self::from_lookup(db_path, |key| env::var(key).ok())
    }

    // I keep the actual resolution independent of the process environment so
    // it can be exercised with any set of variables
    fn from_lookup(db_path: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let db_path = match db_path {
            Some(path) => path.to_path_buf(),
            None => match lookup(DB_PATH_KEY) {
                Some(path) => PathBuf::from(path),
                None => {
                    let home = lookup(HOME_KEY).ok_or_else(|| {
                        BlockchainError::Config(format!(
                            "Neither {DB_PATH_KEY} nor {HOME_KEY} is set"
                        ))
                    })?;
                    PathBuf::from(home).join(DB_FILE_NAME)
                }
            },
        };

        let mut config = Config::new(db_path);
        if let Some(difficulty) = lookup(DIFFICULTY_KEY) {
            let difficulty = difficulty.parse::<u32>().map_err(|e| {
                BlockchainError::Config(format!("Invalid {DIFFICULTY_KEY} '{difficulty}': {e}"))
            })?;
            config = config.with_difficulty(difficulty);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_db_path(mut self, db_path: impl AsRef<Path>) -> Config {
        self.db_path = db_path.as_ref().to_path_buf();
        self
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Config {
        self.difficulty = difficulty;
        self
    }

    pub fn with_subsidy(mut self, subsidy: i64) -> Config {
        self.subsidy = subsidy;
        self
    }

    pub fn with_mining_policy(mut self, mining_policy: MiningPolicy) -> Config {
        self.mining_policy = mining_policy;
        self
    }

    /// When set, blocks this node mines update account balances on commit,
    /// exactly as accepted blocks do.
    pub fn with_settle_mined_blocks(mut self, settle: bool) -> Config {
        self.settle_mined_blocks = settle;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=255).contains(&self.difficulty) {
            return Err(BlockchainError::Config(format!(
                "Difficulty must be between 1 and 255 bits, got {}",
                self.difficulty
            )));
        }
        if self.subsidy <= 0 {
            return Err(BlockchainError::Config(format!(
                "Subsidy must be positive, got {}",
                self.subsidy
            )));
        }
        Ok(())
    }

    pub fn get_db_path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub fn get_difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn get_subsidy(&self) -> i64 {
        self.subsidy
    }

    pub fn get_mining_policy(&self) -> MiningPolicy {
        self.mining_policy
    }

    pub fn settles_mined_blocks(&self) -> bool {
        self.settle_mined_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("/tmp/ledger");
        assert_eq!(config.get_db_path(), Path::new("/tmp/ledger"));
        assert_eq!(config.get_difficulty(), DEFAULT_DIFFICULTY);
        assert_eq!(config.get_subsidy(), 100);
        assert_eq!(config.get_mining_policy(), MiningPolicy::SingleSender);
        assert!(!config.settles_mined_blocks());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = Config::new("/a")
            .with_db_path("/b")
            .with_difficulty(4)
            .with_subsidy(50)
            .with_mining_policy(MiningPolicy::AllSenders)
            .with_settle_mined_blocks(true);
        assert_eq!(config.get_db_path(), Path::new("/b"));
        assert_eq!(config.get_difficulty(), 4);
        assert_eq!(config.get_subsidy(), 50);
        assert_eq!(config.get_mining_policy(), MiningPolicy::AllSenders);
        assert!(config.settles_mined_blocks());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::new("/a").with_difficulty(0).validate().is_err());
        assert!(Config::new("/a").with_difficulty(256).validate().is_err());
        assert!(Config::new("/a").with_subsidy(0).validate().is_err());
    }

    #[test]
    fn test_explicit_path_needs_no_path_variables() {
        let config = Config::from_lookup(Some(Path::new("/data/ledger")), |_| None).unwrap();
        assert_eq!(config.get_db_path(), Path::new("/data/ledger"));
        assert_eq!(config.get_difficulty(), DEFAULT_DIFFICULTY);

        assert!(matches!(
            Config::from_lookup(None, |_| None),
            Err(BlockchainError::Config(_))
        ));
    }

    #[test]
    fn test_lookup_precedence() {
        let vars = |key: &str| match key {
            DB_PATH_KEY => Some("/env/ledger".to_string()),
            HOME_KEY => Some("/home/someone".to_string()),
            DIFFICULTY_KEY => Some("12".to_string()),
            _ => None,
        };
        let config = Config::from_lookup(None, vars).unwrap();
        assert_eq!(config.get_db_path(), Path::new("/env/ledger"));
        assert_eq!(config.get_difficulty(), 12);

        let config = Config::from_lookup(Some(Path::new("/flag")), vars).unwrap();
        assert_eq!(config.get_db_path(), Path::new("/flag"));
        assert_eq!(config.get_difficulty(), 12);

        let home_only = |key: &str| (key == HOME_KEY).then(|| "/home/someone".to_string());
        let config = Config::from_lookup(None, home_only).unwrap();
        assert_eq!(config.get_db_path(), Path::new("/home/someone/.blockchain.db"));

        let bad = |key: &str| (key == DIFFICULTY_KEY).then(|| "lots".to_string());
        assert!(Config::from_lookup(Some(Path::new("/flag")), bad).is_err());
    }
}
