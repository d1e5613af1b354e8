use ledger_core::constants::{BLOCKS_BUCKET, TIP_KEY, UTXO_BUCKET, UTXO_TIP_KEY};
use ledger_core::{Block, ChainStore, LedgerError, Result, UtxoBatch, UtxoEntry, UtxoMap};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Batch, Db, Transactional, Tree};
use std::path::Path;
use tracing::{debug, info};

fn storage_err(err: sled::Error) -> LedgerError {
  LedgerError::Storage(err.to_string())
}

fn encode_puts(batch: &UtxoBatch) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
  batch
    .puts
    .iter()
    .map(|(txid, entry)| -> Result<(Vec<u8>, Vec<u8>)> { Ok((txid.clone(), entry.serialize()?)) })
    .collect()
}

/// `ChainStore` over two sled trees: `blocks` (hash -> block, plus the tip under
/// `l`) and `utxo` (txid -> unspent outputs, plus the indexed block hash under `l`).
/// A block, the tip move and its UTXO changes commit in one transaction.
#[derive(Clone)]
pub struct SledStore {
  db: Db,
  blocks: Tree,
  utxo: Tree,
}

impl SledStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let db = sled::open(path.as_ref()).map_err(storage_err)?;
    let blocks = db.open_tree(BLOCKS_BUCKET).map_err(storage_err)?;
    let utxo = db.open_tree(UTXO_BUCKET).map_err(storage_err)?;
    info!(path = %path.as_ref().display(), "sled store opened");
    Ok(Self { db, blocks, utxo })
  }

  /// Drops every block and UTXO entry.
  pub fn clear(&self) -> Result<()> {
    self.blocks.clear().map_err(storage_err)?;
    self.utxo.clear().map_err(storage_err)?;
    self.flush()
  }
}

impl ChainStore for SledStore {
  fn tip(&self) -> Result<Option<Vec<u8>>> {
    Ok(self.blocks.get(TIP_KEY).map_err(storage_err)?.map(|v| v.to_vec()))
  }

  fn get_block(&self, hash: &[u8]) -> Result<Option<Block>> {
    self
      .blocks
      .get(hash)
      .map_err(storage_err)?
      .map(|bytes| Block::deserialize(&bytes))
      .transpose()
  }

  fn commit_block(&self, block: &Block, expected_tip: Option<&[u8]>, utxo: &UtxoBatch) -> Result<()> {
    let bytes = block.serialize()?;
    let puts = encode_puts(utxo)?;
    let outcome = (&self.blocks, &self.utxo).transaction(|(blocks, index)| {
      let current = blocks.get(TIP_KEY)?;
      match (current.as_deref(), expected_tip) {
        (Some(_), None) => {
          return Err(ConflictableTransactionError::Abort(
            LedgerError::AlreadyExists("blockchain".to_string()),
          ))
        }
        (current, expected) if current != expected => {
          return Err(ConflictableTransactionError::Abort(LedgerError::StaleTip))
        }
        _ => {}
      }
      blocks.insert(block.hash.as_slice(), bytes.as_slice())?;
      blocks.insert(TIP_KEY, block.hash.as_slice())?;
      for txid in &utxo.deletes {
        index.remove(txid.as_slice())?;
      }
      for (txid, entry) in &puts {
        index.insert(txid.as_slice(), entry.as_slice())?;
      }
      index.insert(UTXO_TIP_KEY, block.hash.as_slice())?;
      Ok(())
    });
    match outcome {
      Ok(()) => {}
      Err(TransactionError::Abort(e)) => return Err(e),
      Err(TransactionError::Storage(e)) => return Err(storage_err(e)),
    }
    self.flush()?;
    debug!(hash = %block.hash_hex(), puts = puts.len(), deletes = utxo.deletes.len(), "block committed");
    Ok(())
  }

  fn utxo_tip(&self) -> Result<Option<Vec<u8>>> {
    Ok(self.utxo.get(UTXO_TIP_KEY).map_err(storage_err)?.map(|v| v.to_vec()))
  }

  fn utxo_entries(&self) -> Result<Vec<(Vec<u8>, UtxoEntry)>> {
    self
      .utxo
      .iter()
      .filter(|kv| !matches!(kv, Ok((k, _)) if k.as_ref() == UTXO_TIP_KEY))
      .map(|kv| -> Result<(Vec<u8>, UtxoEntry)> {
        let (k, v) = kv.map_err(storage_err)?;
        Ok((k.to_vec(), UtxoEntry::deserialize(&v)?))
      })
      .collect()
  }

  fn get_utxo(&self, txid: &[u8]) -> Result<Option<UtxoEntry>> {
    if txid == UTXO_TIP_KEY {
      return Ok(None);
    }
    self
      .utxo
      .get(txid)
      .map_err(storage_err)?
      .map(|bytes| UtxoEntry::deserialize(&bytes))
      .transpose()
  }

  fn replace_utxo(&self, entries: &UtxoMap, tip: &[u8]) -> Result<()> {
    let mut batch = Batch::default();
    for key in self.utxo.iter().keys() {
      let key = key.map_err(storage_err)?;
      if &key[..] != UTXO_TIP_KEY && !entries.contains_key(&key[..]) {
        batch.remove(key);
      }
    }
    for (txid, entry) in entries {
      batch.insert(txid.as_slice(), entry.serialize()?);
    }
    batch.insert(UTXO_TIP_KEY, tip);
    self.utxo.apply_batch(batch).map_err(storage_err)
  }

  fn apply_utxo(&self, batch: &UtxoBatch, tip: &[u8]) -> Result<()> {
    let mut b = Batch::default();
    for txid in &batch.deletes {
      b.remove(txid.as_slice());
    }
    for (txid, entry) in encode_puts(batch)? {
      b.insert(txid, entry);
    }
    b.insert(UTXO_TIP_KEY, tip);
    self.utxo.apply_batch(b).map_err(storage_err)?;
    self.flush()
  }

  fn flush(&self) -> Result<()> {
    self.db.flush().map_err(storage_err)?;
    Ok(())
  }
}
