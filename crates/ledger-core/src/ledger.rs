//! Orchestration of chain and UTXO index for the operational entry points.

use crate::address::validate_address;
use crate::block::Block;
use crate::chain::{Chain, ChainStore};
use crate::config::ChainConfig;
use crate::error::{LedgerError, Result};
use crate::transaction::Transaction;
use crate::utxo::UtxoIndex;
use crate::wallet::Wallet;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Ledger<S: ChainStore> {
    chain: Chain<S>,
    utxo: UtxoIndex<S>,
}

impl<S: ChainStore> Ledger<S> {
    /// Creates the chain with its genesis block; the genesis output is indexed with it.
    pub fn create(store: Arc<S>, config: ChainConfig, genesis_address: &str) -> Result<Self> {
        let chain = Chain::initialize(store, config, genesis_address)?;
        let utxo = UtxoIndex::new(chain.clone());
        Ok(Self { chain, utxo })
    }

    /// Opens an existing chain and brings its index up to the tip.
    pub fn open(store: Arc<S>, config: ChainConfig) -> Result<Self> {
        let chain = Chain::open(store, config)?;
        let utxo = UtxoIndex::new(chain.clone());
        let replayed = utxo.catch_up()?;
        if replayed > 0 {
            warn!(blocks = replayed, "utxo index was behind the chain");
        }
        Ok(Self { chain, utxo })
    }

    pub fn chain(&self) -> &Chain<S> {
        &self.chain
    }

    pub fn utxo(&self) -> &UtxoIndex<S> {
        &self.utxo
    }

    pub fn balance(&self, address: &str) -> Result<u64> {
        self.utxo.balance(address)
    }

    /// Transfers `amount` from `from` to `to` in a block of its own.
    pub fn send(&self, from: &Wallet, to: &str, amount: u64) -> Result<Block> {
        if !validate_address(to) {
            return Err(LedgerError::InvalidAddress(to.to_string()));
        }
        let tx = Transaction::new_transfer(from, to, amount, &self.utxo)?;
        let block = self.chain.mine_block(vec![tx])?;
        info!(from = %from.address(), to, amount, block = %block.hash_hex(), "transfer settled");
        Ok(block)
    }

    /// Mines a coinbase-only block whose memo is `data`, paying the subsidy to `address`.
    ///
    /// Repeating a memo and recipient reproduces a coinbase id already on the chain,
    /// which `mine_block` refuses.
    pub fn add_block(&self, data: &str, address: &str) -> Result<Block> {
        let coinbase =
            Transaction::new_coinbase(address, self.chain.config().subsidy, Some(data))?;
        self.chain.mine_block(vec![coinbase])
    }

    pub fn reindex(&self) -> Result<usize> {
        self.utxo.reindex()
    }
}
