//! Append-only chain over an abstract bucketed store.

use crate::address::locking_hash_from_address;
use crate::block::Block;
use crate::config::ChainConfig;
use crate::error::{LedgerError, Result};
use crate::mine::CancelFlag;
use crate::pow::ProofOfWork;
use crate::transaction::{Transaction, TxOutput, TxResolver};
use crate::utxo::{compute_update, UtxoBatch, UtxoEntry, UtxoMap};
use p256::ecdsa::SigningKey;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// Storage contract the chain and UTXO index run on.
/// This lives in `ledger-core` to avoid a circular dependency.
///
/// Every mutating method must be all-or-nothing.
pub trait ChainStore: Send + Sync {
    fn tip(&self) -> Result<Option<Vec<u8>>>;
    fn get_block(&self, hash: &[u8]) -> Result<Option<Block>>;
    /// Writes `block`, moves the tip to its hash and applies `utxo` (marking the index
    /// as built at that hash) in one atomic step, provided the stored tip still equals
    /// `expected_tip`. `None` means "no chain yet".
    fn commit_block(&self, block: &Block, expected_tip: Option<&[u8]>, utxo: &UtxoBatch)
        -> Result<()>;
    /// Hash of the block the UTXO index was last brought up to.
    fn utxo_tip(&self) -> Result<Option<Vec<u8>>>;
    /// All UTXO entries in key order.
    fn utxo_entries(&self) -> Result<Vec<(Vec<u8>, UtxoEntry)>>;
    fn get_utxo(&self, txid: &[u8]) -> Result<Option<UtxoEntry>>;
    /// Clears the UTXO bucket and writes `entries` built at `tip` atomically.
    fn replace_utxo(&self, entries: &UtxoMap, tip: &[u8]) -> Result<()>;
    /// Applies `batch` and marks the index as built at `tip` atomically.
    fn apply_utxo(&self, batch: &UtxoBatch, tip: &[u8]) -> Result<()>;
    fn flush(&self) -> Result<()>;
}

/// Restartable reverse iterator: yields the block at the cursor, then follows
/// `prev_hash` until the genesis block has been produced.
pub struct ChainIter<S: ChainStore> {
    store: Arc<S>,
    next: Option<Vec<u8>>,
}

impl<S: ChainStore> ChainIter<S> {
    pub fn from_hash(store: Arc<S>, start: Vec<u8>) -> Self {
        Self {
            store,
            next: Some(start),
        }
    }
}

impl<S: ChainStore> Clone for ChainIter<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            next: self.next.clone(),
        }
    }
}

impl<S: ChainStore> Iterator for ChainIter<S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.store.get_block(&hash) {
            Ok(Some(block)) => {
                if !block.is_genesis() {
                    self.next = Some(block.prev_hash.clone());
                }
                Some(Ok(block))
            }
            Ok(None) => Some(Err(LedgerError::NotFound(format!(
                "block {}",
                hex::encode(&hash)
            )))),
            Err(e) => Some(Err(e)),
        }
    }
}

/// Linear lookup of a transaction id, newest block first.
fn find_in<S: ChainStore>(iter: ChainIter<S>, id: &[u8]) -> Result<Transaction> {
    for block in iter {
        if let Some(tx) = block?.transactions.into_iter().find(|tx| tx.id == id) {
            return Ok(tx);
        }
    }
    Err(LedgerError::NotFound(format!("transaction {}", hex::encode(id))))
}

/// Resolver pinned to a tip hash, for use while the writer lock is held.
struct AtTip<'a, S: ChainStore> {
    store: &'a Arc<S>,
    tip: &'a [u8],
}

impl<S: ChainStore> TxResolver for AtTip<'_, S> {
    fn resolve(&self, txid: &[u8]) -> Result<Transaction> {
        find_in(ChainIter::from_hash(Arc::clone(self.store), self.tip.to_vec()), txid)
    }
}

/// Chain façade. The cached tip sits behind a mutex that also serializes writers; it
/// only moves after the store has committed the matching block.
pub struct Chain<S: ChainStore> {
    store: Arc<S>,
    config: ChainConfig,
    pow: ProofOfWork,
    tip: Arc<Mutex<Vec<u8>>>,
}

impl<S: ChainStore> Clone for Chain<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            pow: self.pow.clone(),
            tip: Arc::clone(&self.tip),
        }
    }
}

impl<S: ChainStore> fmt::Debug for Chain<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tip = self.tip.lock().map(|t| hex::encode(&*t)).unwrap_or_default();
        f.debug_struct("Chain")
            .field("tip", &tip)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: ChainStore> Chain<S> {
    /// Creates the genesis block paying the subsidy to `genesis_address`.
    pub fn initialize(store: Arc<S>, config: ChainConfig, genesis_address: &str) -> Result<Self> {
        config.validate()?;
        locking_hash_from_address(genesis_address)?;
        if store.tip()?.is_some() {
            return Err(LedgerError::AlreadyExists("blockchain".to_string()));
        }

        let pow = ProofOfWork::from_config(&config)?;
        let coinbase =
            Transaction::new_coinbase(genesis_address, config.subsidy, Some(&config.genesis_memo))?;
        let genesis = Block::genesis(coinbase, &pow)?;
        let utxo = compute_update(&genesis.transactions, |_| Ok(None))?;
        store.commit_block(&genesis, None, &utxo)?;
        store.flush()?;
        info!(hash = %genesis.hash_hex(), address = genesis_address, "genesis block created");

        Ok(Self {
            store,
            config,
            pow,
            tip: Arc::new(Mutex::new(genesis.hash)),
        })
    }

    pub fn open(store: Arc<S>, config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let tip = store.tip()?.ok_or_else(|| {
            LedgerError::NotFound("no existing blockchain, create one first".to_string())
        })?;
        let pow = ProofOfWork::from_config(&config)?;
        let head = store
            .get_block(&tip)?
            .ok_or_else(|| LedgerError::CorruptData(format!("tip block {}", hex::encode(&tip))))?;
        // the difficulty is part of the hashed header, so only the mining difficulty validates
        if !pow.validate(&head) {
            return Err(LedgerError::InvalidConfig(format!(
                "tip block {} does not satisfy difficulty {}",
                head.hash_hex(),
                config.difficulty
            )));
        }
        Ok(Self {
            store,
            config,
            pow,
            tip: Arc::new(Mutex::new(tip)),
        })
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Raising this flag aborts an in-progress `mine_block`.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.pow.cancel_flag().clone()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Vec<u8>>> {
        self.tip
            .lock()
            .map_err(|_| LedgerError::Storage("chain writer lock poisoned".to_string()))
    }

    pub fn tip(&self) -> Result<Vec<u8>> {
        Ok(self.lock()?.clone())
    }

    pub fn iter(&self) -> Result<ChainIter<S>> {
        Ok(ChainIter::from_hash(Arc::clone(&self.store), self.tip()?))
    }

    /// Number of blocks after genesis.
    pub fn height(&self) -> Result<u64> {
        let mut count = 0u64;
        for block in self.iter()? {
            block?;
            count += 1;
        }
        Ok(count.saturating_sub(1))
    }

    pub fn find_transaction(&self, id: &[u8]) -> Result<Transaction> {
        find_in(self.iter()?, id)
    }

    pub fn sign_transaction(&self, tx: &mut Transaction, key: &SigningKey) -> Result<()> {
        let prev = self.prev_transactions(tx)?;
        tx.sign(key, &prev)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let prev = self.prev_transactions(tx)?;
        tx.verify(&prev)
    }

    fn prev_transactions(&self, tx: &Transaction) -> Result<HashMap<Vec<u8>, Transaction>> {
        let mut prev = HashMap::new();
        for input in &tx.inputs {
            if !prev.contains_key(&input.txid) {
                prev.insert(input.txid.clone(), self.find_transaction(&input.txid)?);
            }
        }
        Ok(prev)
    }

    /// Verifies `transactions`, mines a block on the current tip and commits it together
    /// with the UTXO changes it causes.
    ///
    /// Every input must reference an output that is unspent in the index, and no
    /// transaction id may already be on the chain. A raised cancel flag aborts one call
    /// with `MiningCancelled` and is cleared.
    pub fn mine_block(&self, transactions: Vec<Transaction>) -> Result<Block> {
        if transactions.is_empty() {
            return Err(LedgerError::InvalidTransaction(
                "a block needs at least one transaction".to_string(),
            ));
        }
        let mut tip = self.lock()?;
        let indexed = self.store.utxo_tip()?.unwrap_or_default();
        if indexed != *tip {
            return Err(LedgerError::StaleIndex {
                index: hex::encode(&indexed),
                tip: hex::encode(&*tip),
            });
        }
        let resolver = AtTip {
            store: &self.store,
            tip: tip.as_slice(),
        };
        let mut seen = HashSet::new();
        for tx in &transactions {
            if !seen.insert(tx.id.as_slice()) {
                return Err(LedgerError::InvalidTransaction(format!(
                    "{} appears twice in the block",
                    hex::encode(&tx.id)
                )));
            }
            match resolver.resolve(&tx.id) {
                Ok(_) => {
                    return Err(LedgerError::InvalidTransaction(format!(
                        "{} is already on the chain",
                        hex::encode(&tx.id)
                    )))
                }
                Err(LedgerError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
            let verified = match tx.verify(&resolver) {
                Ok(ok) => ok,
                Err(LedgerError::NotFound(what)) => {
                    warn!(id = %hex::encode(&tx.id), "references unknown {what}");
                    false
                }
                Err(e) => return Err(e),
            };
            if !verified {
                return Err(LedgerError::InvalidTransaction(hex::encode(&tx.id)));
            }
        }

        let utxo = compute_update(&transactions, |txid| self.store.get_utxo(txid)).map_err(
            |e| match e {
                LedgerError::NotFound(what) => {
                    warn!("block rejected, spends {what}");
                    LedgerError::InvalidTransaction(format!("spends {what}"))
                }
                other => other,
            },
        )?;

        let block = match Block::new(transactions, tip.clone(), &self.pow) {
            Err(LedgerError::MiningCancelled) => {
                self.pow.cancel_flag().reset();
                return Err(LedgerError::MiningCancelled);
            }
            mined => mined?,
        };
        self.store.commit_block(&block, Some(tip.as_slice()), &utxo)?;
        *tip = block.hash.clone();
        info!(
            hash = %block.hash_hex(),
            nonce = block.nonce,
            txs = block.transactions.len(),
            "block appended"
        );
        Ok(block)
    }

    /// Brute-force scan for outputs locked to `locking_hash` that no input in the chain
    /// references. Independent of the UTXO index.
    pub fn find_unspent_outputs(&self, locking_hash: &[u8]) -> Result<Vec<(Vec<u8>, u32, TxOutput)>> {
        let blocks: Vec<Block> = self.iter()?.collect::<Result<_>>()?;
        let spent: HashSet<(&[u8], i64)> = blocks
            .iter()
            .flat_map(|b| b.transactions.iter())
            .filter(|tx| !tx.is_coinbase())
            .flat_map(|tx| tx.inputs.iter().map(|i| (i.txid.as_slice(), i.vout)))
            .collect();

        let mut unspent = Vec::new();
        for tx in blocks.iter().flat_map(|b| b.transactions.iter()) {
            for (index, out) in tx.outputs.iter().enumerate() {
                if out.is_locked_with(locking_hash)
                    && !spent.contains(&(tx.id.as_slice(), index as i64))
                {
                    unspent.push((tx.id.clone(), index as u32, out.clone()));
                }
            }
        }
        Ok(unspent)
    }
}

impl<S: ChainStore> TxResolver for Chain<S> {
    fn resolve(&self, txid: &[u8]) -> Result<Transaction> {
        self.find_transaction(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::transaction::TxInput;
    use crate::wallet::Wallet;

    fn config() -> ChainConfig {
        ChainConfig::default().with_difficulty(8)
    }

    fn new_chain(owner: &Wallet) -> Chain<MemoryStore> {
        Chain::initialize(Arc::new(MemoryStore::default()), config(), &owner.address()).unwrap()
    }

    #[test]
    fn initialize_then_open() {
        let owner = Wallet::generate();
        let store = Arc::new(MemoryStore::default());
        let chain = Chain::initialize(Arc::clone(&store), config(), &owner.address()).unwrap();
        let tip = chain.tip().unwrap();
        let reopened = Chain::open(store, config()).unwrap();
        assert_eq!(reopened.tip().unwrap(), tip);
        assert_eq!(reopened.height().unwrap(), 0);
    }

    #[test]
    fn initialize_twice_fails() {
        let owner = Wallet::generate();
        let store = Arc::new(MemoryStore::default());
        Chain::initialize(Arc::clone(&store), config(), &owner.address()).unwrap();
        let err = Chain::initialize(store, config(), &owner.address()).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
    }

    #[test]
    fn open_without_chain_fails() {
        let err = Chain::open(Arc::new(MemoryStore::default()), config()).unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[test]
    fn initialize_rejects_bad_address() {
        let err = Chain::initialize(Arc::new(MemoryStore::default()), config(), "nope")
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAddress(_)));
    }

    #[test]
    fn genesis_holds_single_coinbase() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let blocks: Vec<Block> = chain.iter().unwrap().collect::<Result<_>>().unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_genesis());
        assert_eq!(blocks[0].transactions.len(), 1);
        assert!(blocks[0].transactions[0].is_coinbase());
        assert_eq!(blocks[0].transactions[0].outputs[0].value, config().subsidy);
    }

    #[test]
    fn iterator_walks_newest_to_genesis_and_restarts() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let mut hashes = vec![chain.tip().unwrap()];
        for _ in 0..3 {
            let cb = Transaction::new_coinbase(&owner.address(), 10, None).unwrap();
            hashes.push(chain.mine_block(vec![cb]).unwrap().hash);
        }
        hashes.reverse();

        let iter = chain.iter().unwrap();
        let walked: Vec<Vec<u8>> = iter.clone().map(|b| b.unwrap().hash).collect();
        assert_eq!(walked, hashes);
        let again: Vec<Vec<u8>> = iter.map(|b| b.unwrap().hash).collect();
        assert_eq!(again, hashes);
        assert_eq!(chain.height().unwrap(), 3);
    }

    #[test]
    fn every_stored_block_validates() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let cb = Transaction::new_coinbase(&owner.address(), 10, None).unwrap();
        chain.mine_block(vec![cb]).unwrap();
        for block in chain.iter().unwrap() {
            assert!(chain.pow().validate(&block.unwrap()));
        }
    }

    #[test]
    fn find_transaction_hits_and_misses() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let cb = Transaction::new_coinbase(&owner.address(), 10, Some("second")).unwrap();
        chain.mine_block(vec![cb.clone()]).unwrap();
        assert_eq!(chain.find_transaction(&cb.id).unwrap(), cb);
        assert!(matches!(
            chain.find_transaction(&[0u8; 32]),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn mine_block_rejects_bad_signature_and_keeps_tip() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let genesis = chain.iter().unwrap().next().unwrap().unwrap();
        let funding = genesis.transactions[0].clone();

        let mut tx = Transaction {
            id: vec![],
            inputs: vec![TxInput {
                txid: funding.id.clone(),
                vout: 0,
                signature: vec![],
                public_key: owner.public_key().to_vec(),
            }],
            outputs: vec![TxOutput {
                value: 10,
                locking_hash: owner.locking_hash(),
            }],
        };
        tx.id = tx.hash().to_vec();
        chain.sign_transaction(&mut tx, owner.signing_key()).unwrap();
        assert!(chain.verify_transaction(&tx).unwrap());

        let mut forged = tx.clone();
        forged.inputs[0].signature[5] ^= 0x10;
        let before = chain.tip().unwrap();
        let err = chain.mine_block(vec![forged]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert_eq!(chain.tip().unwrap(), before);

        chain.mine_block(vec![tx]).unwrap();
        assert_ne!(chain.tip().unwrap(), before);
    }

    #[test]
    fn mine_block_rejects_unknown_reference() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let tx = Transaction {
            id: vec![1; 32],
            inputs: vec![TxInput {
                txid: vec![9; 32],
                vout: 0,
                signature: vec![],
                public_key: owner.public_key().to_vec(),
            }],
            outputs: vec![],
        };
        assert!(matches!(
            chain.mine_block(vec![tx]),
            Err(LedgerError::InvalidTransaction(_))
        ));
        assert!(matches!(
            chain.mine_block(vec![]),
            Err(LedgerError::InvalidTransaction(_))
        ));
    }

    fn signed_spend(
        chain: &Chain<MemoryStore>,
        owner: &Wallet,
        funding: &[u8],
        to: &Wallet,
        value: u64,
    ) -> Transaction {
        let mut tx = Transaction {
            id: vec![],
            inputs: vec![TxInput {
                txid: funding.to_vec(),
                vout: 0,
                signature: vec![],
                public_key: owner.public_key().to_vec(),
            }],
            outputs: vec![TxOutput {
                value,
                locking_hash: to.locking_hash(),
            }],
        };
        tx.id = tx.hash().to_vec();
        chain.sign_transaction(&mut tx, owner.signing_key()).unwrap();
        tx
    }

    fn genesis_funding(chain: &Chain<MemoryStore>) -> Vec<u8> {
        let genesis = chain.iter().unwrap().last().unwrap().unwrap();
        genesis.transactions[0].id.clone()
    }

    #[test]
    fn initialize_indexes_genesis_output() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let funding = genesis_funding(&chain);
        assert_eq!(chain.store().utxo_tip().unwrap(), Some(chain.tip().unwrap()));
        let entry = chain.store().get_utxo(&funding).unwrap().unwrap();
        assert_eq!(entry.outputs.len(), 1);
        assert_eq!(entry.outputs[0].output.value, config().subsidy);
    }

    #[test]
    fn open_with_other_difficulty_fails() {
        let owner = Wallet::generate();
        let store = Arc::new(MemoryStore::default());
        Chain::initialize(Arc::clone(&store), config(), &owner.address()).unwrap();
        let err = Chain::open(store, config().with_difficulty(9)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidConfig(_)));
    }

    #[test]
    fn replayed_transaction_is_rejected() {
        let owner = Wallet::generate();
        let other = Wallet::generate();
        let chain = new_chain(&owner);
        let tx = signed_spend(&chain, &owner, &genesis_funding(&chain), &other, 10);
        chain.mine_block(vec![tx.clone()]).unwrap();

        let tip = chain.tip().unwrap();
        let index = chain.store().utxo_entries().unwrap();
        let err = chain.mine_block(vec![tx]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert_eq!(chain.tip().unwrap(), tip);
        assert_eq!(chain.store().utxo_entries().unwrap(), index);
        assert_eq!(chain.store().utxo_tip().unwrap(), Some(tip));
    }

    #[test]
    fn spent_output_cannot_be_spent_again() {
        let owner = Wallet::generate();
        let first = Wallet::generate();
        let second = Wallet::generate();
        let chain = new_chain(&owner);
        let funding = genesis_funding(&chain);
        let pay_first = signed_spend(&chain, &owner, &funding, &first, 10);
        let pay_second = signed_spend(&chain, &owner, &funding, &second, 10);

        let err = chain
            .mine_block(vec![pay_first.clone(), pay_second.clone()])
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert_eq!(chain.height().unwrap(), 0);

        chain.mine_block(vec![pay_first]).unwrap();
        let tip = chain.tip().unwrap();
        let err = chain.mine_block(vec![pay_second]).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransaction(_)));
        assert_eq!(chain.tip().unwrap(), tip);
        assert_eq!(chain.find_unspent_outputs(&second.locking_hash()).unwrap().len(), 0);
    }

    #[test]
    fn duplicate_coinbase_is_rejected() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let cb = Transaction::new_coinbase(&owner.address(), 10, Some("once")).unwrap();
        chain.mine_block(vec![cb.clone()]).unwrap();
        assert!(matches!(
            chain.mine_block(vec![cb.clone()]),
            Err(LedgerError::InvalidTransaction(_))
        ));
        let fresh = Transaction::new_coinbase(&owner.address(), 10, Some("twice")).unwrap();
        assert!(matches!(
            chain.mine_block(vec![fresh.clone(), fresh]),
            Err(LedgerError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn stale_index_blocks_mining() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        chain
            .store()
            .replace_utxo(&UtxoMap::new(), &[0xEE; 32])
            .unwrap();
        let cb = Transaction::new_coinbase(&owner.address(), 10, None).unwrap();
        let err = chain.mine_block(vec![cb]).unwrap_err();
        assert!(matches!(err, LedgerError::StaleIndex { .. }));
        assert_eq!(chain.height().unwrap(), 0);
    }

    #[test]
    fn cancellation_aborts_one_mining_call() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let tip = chain.tip().unwrap();
        chain.cancel_flag().cancel();

        let cb = Transaction::new_coinbase(&owner.address(), 10, None).unwrap();
        let err = chain.mine_block(vec![cb.clone()]).unwrap_err();
        assert!(matches!(err, LedgerError::MiningCancelled));
        assert_eq!(chain.tip().unwrap(), tip);
        assert!(!chain.cancel_flag().is_cancelled());

        chain.mine_block(vec![cb]).unwrap();
        assert_eq!(chain.height().unwrap(), 1);
    }

    #[test]
    fn debug_shows_tip() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let shown = format!("{chain:?}");
        assert!(shown.contains(&hex::encode(chain.tip().unwrap())));
    }

    #[test]
    fn stale_writer_is_rejected_by_store() {
        let owner = Wallet::generate();
        let chain = new_chain(&owner);
        let stale_tip = chain.tip().unwrap();
        let cb = Transaction::new_coinbase(&owner.address(), 10, None).unwrap();
        chain.mine_block(vec![cb]).unwrap();

        let cb = Transaction::new_coinbase(&owner.address(), 10, None).unwrap();
        let orphan = Block::new(vec![cb], stale_tip.clone(), chain.pow()).unwrap();
        let err = chain
            .store()
            .commit_block(&orphan, Some(stale_tip.as_slice()), &UtxoBatch::default())
            .unwrap_err();
        assert!(matches!(err, LedgerError::StaleTip));
    }
}
