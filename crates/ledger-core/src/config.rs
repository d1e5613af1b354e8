use crate::constants::{GENESIS_COINBASE_DATA, MINING_SUBSIDY, POW_TARGET_DIFFICULTY};
use crate::error::{LedgerError, Result};

/// Consensus parameters shared by every component that builds or checks blocks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainConfig {
    /// Proof-of-work difficulty in bits; target is `1 << (256 - difficulty)`.
    pub difficulty: u32,
    /// Value created by each coinbase transaction.
    pub subsidy: u64,
    /// Memo carried by the genesis coinbase input.
    pub genesis_memo: String,
    /// Shard the nonce search across the rayon pool.
    pub parallel_mining: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: POW_TARGET_DIFFICULTY,
            subsidy: MINING_SUBSIDY,
            genesis_memo: GENESIS_COINBASE_DATA.to_string(),
            parallel_mining: false,
        }
    }
}

impl ChainConfig {
    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_subsidy(mut self, subsidy: u64) -> Self {
        self.subsidy = subsidy;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.difficulty == 0 || self.difficulty >= 256 {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty must be in 1..=255, got {}",
                self.difficulty
            )));
        }
        if self.subsidy == 0 {
            return Err(LedgerError::InvalidConfig(
                "subsidy must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
