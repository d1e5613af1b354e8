//! Derived index of unspent outputs, keyed by transaction id.
//!
//! The index is a projection of the chain: `reindex` rebuilds it from scratch and
//! `update` folds in one block. Both must land on the same state. `Chain::mine_block`
//! commits the fold of each new block together with the block itself, and the store
//! records which block the index reflects so a lagging index can be caught up.

use crate::address::locking_hash_from_address;
use crate::block::Block;
use crate::chain::{Chain, ChainIter, ChainStore};
use crate::error::{LedgerError, Result};
use crate::transaction::{Transaction, TxOutput};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An output together with its position in the transaction that created it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedOutput {
    pub index: u32,
    pub output: TxOutput,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoEntry {
    pub outputs: Vec<IndexedOutput>,
}

impl UtxoEntry {
    pub fn from_outputs(outputs: &[TxOutput]) -> Self {
        Self {
            outputs: outputs
                .iter()
                .enumerate()
                .map(|(index, output)| IndexedOutput {
                    index: index as u32,
                    output: output.clone(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

pub type UtxoMap = BTreeMap<Vec<u8>, UtxoEntry>;

/// Selected outputs per transaction id, in scan order.
pub type SpendableOutputs = BTreeMap<Vec<u8>, Vec<u32>>;

/// Writes and removals applied to the UTXO bucket in one atomic step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoBatch {
    pub puts: Vec<(Vec<u8>, UtxoEntry)>,
    pub deletes: Vec<Vec<u8>>,
}

/// Walks blocks newest to oldest and keeps every output no later input spends.
pub fn scan_unspent<S: ChainStore>(blocks: ChainIter<S>) -> Result<UtxoMap> {
    let mut spent: HashSet<(Vec<u8>, i64)> = HashSet::new();
    let mut utxo = UtxoMap::new();

    for block in blocks {
        let block = block?;
        // within a block a transaction can only spend earlier siblings
        for tx in block.transactions.iter().rev() {
            for (index, output) in tx.outputs.iter().enumerate() {
                if spent.contains(&(tx.id.clone(), index as i64)) {
                    continue;
                }
                utxo.entry(tx.id.clone())
                    .or_default()
                    .outputs
                    .push(IndexedOutput {
                        index: index as u32,
                        output: output.clone(),
                    });
            }
            if !tx.is_coinbase() {
                for input in &tx.inputs {
                    spent.insert((input.txid.clone(), input.vout));
                }
            }
        }
    }

    for entry in utxo.values_mut() {
        entry.outputs.sort_by_key(|o| o.index);
    }
    Ok(utxo)
}

/// Computes the batch that folds `transactions` into an index read through `lookup`.
///
/// An input whose output is absent from the index (or consumed earlier in the same
/// list) is `NotFound`.
pub fn compute_update<F>(transactions: &[Transaction], lookup: F) -> Result<UtxoBatch>
where
    F: Fn(&[u8]) -> Result<Option<UtxoEntry>>,
{
    let mut overlay: BTreeMap<Vec<u8>, Option<UtxoEntry>> = BTreeMap::new();

    for tx in transactions {
        if !tx.is_coinbase() {
            for input in &tx.inputs {
                let current = match overlay.get(&input.txid) {
                    Some(staged) => staged.clone(),
                    None => lookup(&input.txid)?,
                };
                let mut entry = current.ok_or_else(|| {
                    LedgerError::NotFound(format!(
                        "utxo entry for {}",
                        hex::encode(&input.txid)
                    ))
                })?;
                let before = entry.outputs.len();
                entry.outputs.retain(|o| i64::from(o.index) != input.vout);
                if entry.outputs.len() == before {
                    return Err(LedgerError::NotFound(format!(
                        "unspent output {} of {}",
                        input.vout,
                        hex::encode(&input.txid)
                    )));
                }
                let staged = (!entry.is_empty()).then_some(entry);
                overlay.insert(input.txid.clone(), staged);
            }
        }
        if !tx.outputs.is_empty() {
            overlay.insert(tx.id.clone(), Some(UtxoEntry::from_outputs(&tx.outputs)));
        }
    }

    let mut batch = UtxoBatch::default();
    for (txid, staged) in overlay {
        match staged {
            Some(entry) => batch.puts.push((txid, entry)),
            None => batch.deletes.push(txid),
        }
    }
    Ok(batch)
}

/// UTXO set bound to a chain; reads and writes go through the chain's store.
pub struct UtxoIndex<S: ChainStore> {
    chain: Chain<S>,
}

impl<S: ChainStore> Clone for UtxoIndex<S> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
        }
    }
}

impl<S: ChainStore> UtxoIndex<S> {
    pub fn new(chain: Chain<S>) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Chain<S> {
        &self.chain
    }

    fn store(&self) -> &Arc<S> {
        self.chain.store()
    }

    /// Rebuilds the whole index from the chain. Returns the number of entries.
    pub fn reindex(&self) -> Result<usize> {
        let tip = self.chain.lock()?;
        self.rebuild(&tip)
    }

    fn rebuild(&self, tip: &[u8]) -> Result<usize> {
        let utxo = scan_unspent(ChainIter::from_hash(Arc::clone(self.store()), tip.to_vec()))?;
        self.store().replace_utxo(&utxo, tip)?;
        self.store().flush()?;
        info!(entries = utxo.len(), "utxo index rebuilt");
        Ok(utxo.len())
    }

    /// Folds a stored block into the index: drops the outputs its inputs consume and
    /// adds the outputs it creates. A block the index already reflects is a no-op; the
    /// index must otherwise sit at the block's parent.
    pub fn update(&self, block: &Block) -> Result<()> {
        let _writer = self.chain.lock()?;
        if self.store().get_block(&block.hash)?.is_none() {
            return Err(LedgerError::NotFound(format!("block {}", block.hash_hex())));
        }
        self.fold(block)?;
        self.store().flush()
    }

    fn fold(&self, block: &Block) -> Result<bool> {
        let store = self.store();
        let at = store.utxo_tip()?.unwrap_or_default();
        if at == block.hash {
            return Ok(false);
        }
        if at != block.prev_hash {
            return Err(LedgerError::StaleIndex {
                index: hex::encode(&at),
                tip: block.hash_hex(),
            });
        }
        let batch = compute_update(&block.transactions, |txid| store.get_utxo(txid))?;
        debug!(
            block = %block.hash_hex(),
            puts = batch.puts.len(),
            deletes = batch.deletes.len(),
            "utxo update"
        );
        store.apply_utxo(&batch, &block.hash)?;
        Ok(true)
    }

    /// Brings the index up to the chain tip. Blocks after the one the index reflects are
    /// replayed through `update`; an index whose block is not on the chain is rebuilt.
    /// Returns the number of blocks replayed.
    pub fn catch_up(&self) -> Result<usize> {
        let tip = self.chain.lock()?;
        let at = self.store().utxo_tip()?.unwrap_or_default();
        if at == *tip {
            return Ok(0);
        }

        // an empty marker means nothing is indexed yet, so every block is pending
        let mut pending = Vec::new();
        let mut found = at.is_empty();
        for block in ChainIter::from_hash(Arc::clone(self.store()), tip.clone()) {
            let block = block?;
            if block.hash == at {
                found = true;
                break;
            }
            pending.push(block);
        }
        if !found {
            warn!(index = %hex::encode(&at), "utxo index is not on the chain");
            self.rebuild(&tip)?;
            return Ok(0);
        }

        for block in pending.iter().rev() {
            self.fold(block)?;
        }
        self.store().flush()?;
        info!(blocks = pending.len(), "utxo index caught up");
        Ok(pending.len())
    }

    /// Accumulates outputs locked to `locking_hash` in key order until `amount` is reached.
    pub fn find_spendable_outputs(
        &self,
        locking_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, SpendableOutputs)> {
        let mut accumulated = 0u64;
        let mut selected = SpendableOutputs::new();
        for (txid, entry) in self.store().utxo_entries()? {
            for o in entry.outputs {
                if accumulated >= amount {
                    return Ok((accumulated, selected));
                }
                if o.output.is_locked_with(locking_hash) {
                    accumulated = accumulated
                        .checked_add(o.output.value)
                        .ok_or(LedgerError::ValueOverflow)?;
                    selected.entry(txid.clone()).or_default().push(o.index);
                }
            }
        }
        Ok((accumulated, selected))
    }

    pub fn find_utxo(&self, locking_hash: &[u8]) -> Result<Vec<TxOutput>> {
        Ok(self
            .store()
            .utxo_entries()?
            .into_iter()
            .flat_map(|(_, entry)| entry.outputs)
            .filter(|o| o.output.is_locked_with(locking_hash))
            .map(|o| o.output)
            .collect())
    }

    pub fn balance(&self, address: &str) -> Result<u64> {
        let locking_hash = locking_hash_from_address(address)?;
        self.find_utxo(&locking_hash)?
            .iter()
            .try_fold(0u64, |sum, o| sum.checked_add(o.value))
            .ok_or(LedgerError::ValueOverflow)
    }

    pub fn count_transactions(&self) -> Result<usize> {
        Ok(self.store().utxo_entries()?.len())
    }

    /// Current contents of the index.
    pub fn snapshot(&self) -> Result<UtxoMap> {
        Ok(self.store().utxo_entries()?.into_iter().collect())
    }
}
