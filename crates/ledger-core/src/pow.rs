//! Hashcash-style proof of work over a block's linking fields.

use crate::block::Block;
use crate::config::ChainConfig;
use crate::error::{LedgerError, Result};
use crate::mine::{self, CancelFlag};
use crate::Hash;
use primitive_types::U256;
use sha2::{Digest, Sha256};

/// Difficulty, derived target and search strategy for one chain.
#[derive(Clone, Debug)]
pub struct ProofOfWork {
    difficulty: u32,
    target: U256,
    parallel: bool,
    cancel: CancelFlag,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<Self> {
        if difficulty == 0 || difficulty >= 256 {
            return Err(LedgerError::InvalidConfig(format!(
                "difficulty must be in 1..=255, got {difficulty}"
            )));
        }
        Ok(Self {
            difficulty,
            target: U256::one() << (256 - difficulty as usize),
            parallel: false,
            cancel: CancelFlag::default(),
        })
    }

    pub fn from_config(config: &ChainConfig) -> Result<Self> {
        Ok(Self::new(config.difficulty)?.with_parallel(config.parallel_mining))
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn target(&self) -> U256 {
        self.target
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Hasher already fed with `prev_hash ‖ merkle_root ‖ timestamp ‖ difficulty`;
    /// only the nonce is appended per attempt.
    pub(crate) fn prefix_state(&self, block: &Block) -> Sha256 {
        let mut hasher = Sha256::new();
        hasher.update(&block.prev_hash);
        hasher.update(block.merkle_root());
        hasher.update(block.timestamp.to_be_bytes());
        hasher.update(i64::from(self.difficulty).to_be_bytes());
        hasher
    }

    pub(crate) fn hash_nonce(prefix: &Sha256, nonce: i64) -> Hash {
        let mut hasher = prefix.clone();
        hasher.update(nonce.to_be_bytes());
        hasher.finalize().into()
    }

    /// The full pre-image hashed for `nonce`.
    pub fn prepare_data(&self, block: &Block, nonce: i64) -> Vec<u8> {
        let mut data = Vec::with_capacity(block.prev_hash.len() + 32 + 24);
        data.extend_from_slice(&block.prev_hash);
        data.extend_from_slice(&block.merkle_root());
        data.extend_from_slice(&block.timestamp.to_be_bytes());
        data.extend_from_slice(&i64::from(self.difficulty).to_be_bytes());
        data.extend_from_slice(&nonce.to_be_bytes());
        data
    }

    /// True when `hash`, read as a big-endian 256-bit integer, is below the target.
    pub fn meets_target(&self, hash: &[u8]) -> bool {
        hash.len() == 32 && U256::from_big_endian(hash) < self.target
    }

    /// Searches nonces from zero upward and returns the winning `(nonce, hash)`.
    pub fn run(&self, block: &Block) -> Result<(i64, Hash)> {
        let prefix = self.prefix_state(block);
        if self.parallel {
            mine::search_parallel(self, &prefix)
        } else {
            mine::search_sequential(self, &prefix)
        }
    }

    /// Recomputes the hash for the block's stored nonce and checks it against the
    /// target and the stored hash.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = Self::hash_nonce(&self.prefix_state(block), block.nonce);
        hash[..] == block.hash[..] && self.meets_target(&hash)
    }
}
