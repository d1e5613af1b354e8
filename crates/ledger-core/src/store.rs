//! In-process `ChainStore`, used by tests and throwaway chains.

use crate::block::Block;
use crate::chain::ChainStore;
use crate::error::{LedgerError, Result};
use crate::utxo::{UtxoBatch, UtxoEntry, UtxoMap};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Buckets {
    blocks: BTreeMap<Vec<u8>, Vec<u8>>,
    tip: Option<Vec<u8>>,
    utxo: BTreeMap<Vec<u8>, Vec<u8>>,
    utxo_tip: Option<Vec<u8>>,
}

impl Buckets {
    fn apply(&mut self, encoded: Vec<(Vec<u8>, Vec<u8>)>, deletes: &[Vec<u8>], tip: &[u8]) {
        for txid in deletes {
            self.utxo.remove(txid);
        }
        self.utxo.extend(encoded);
        self.utxo_tip = Some(tip.to_vec());
    }
}

fn encode_puts(batch: &UtxoBatch) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    batch
        .puts
        .iter()
        .map(|(txid, entry)| -> Result<(Vec<u8>, Vec<u8>)> {
            Ok((txid.clone(), entry.serialize()?))
        })
        .collect()
}

/// Values are kept serialized so decoding is exercised the same way as on disk.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Buckets>,
}

impl MemoryStore {
    fn buckets(&self) -> Result<MutexGuard<'_, Buckets>> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Storage("memory store lock poisoned".to_string()))
    }
}

impl ChainStore for MemoryStore {
    fn tip(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.buckets()?.tip.clone())
    }

    fn get_block(&self, hash: &[u8]) -> Result<Option<Block>> {
        self.buckets()?
            .blocks
            .get(hash)
            .map(|bytes| Block::deserialize(bytes))
            .transpose()
    }

    fn commit_block(
        &self,
        block: &Block,
        expected_tip: Option<&[u8]>,
        utxo: &UtxoBatch,
    ) -> Result<()> {
        let bytes = block.serialize()?;
        let encoded = encode_puts(utxo)?;
        let mut b = self.buckets()?;
        match (b.tip.as_deref(), expected_tip) {
            (Some(_), None) => return Err(LedgerError::AlreadyExists("blockchain".to_string())),
            (current, expected) if current != expected => return Err(LedgerError::StaleTip),
            _ => {}
        }
        b.blocks.insert(block.hash.clone(), bytes);
        b.tip = Some(block.hash.clone());
        b.apply(encoded, &utxo.deletes, &block.hash);
        Ok(())
    }

    fn utxo_tip(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.buckets()?.utxo_tip.clone())
    }

    fn utxo_entries(&self) -> Result<Vec<(Vec<u8>, UtxoEntry)>> {
        self.buckets()?
            .utxo
            .iter()
            .map(|(k, v)| -> Result<(Vec<u8>, UtxoEntry)> {
                Ok((k.clone(), UtxoEntry::deserialize(v)?))
            })
            .collect()
    }

    fn get_utxo(&self, txid: &[u8]) -> Result<Option<UtxoEntry>> {
        self.buckets()?
            .utxo
            .get(txid)
            .map(|v| UtxoEntry::deserialize(v))
            .transpose()
    }

    fn replace_utxo(&self, entries: &UtxoMap, tip: &[u8]) -> Result<()> {
        let mut fresh = BTreeMap::new();
        for (txid, entry) in entries {
            fresh.insert(txid.clone(), entry.serialize()?);
        }
        let mut b = self.buckets()?;
        b.utxo = fresh;
        b.utxo_tip = Some(tip.to_vec());
        Ok(())
    }

    fn apply_utxo(&self, batch: &UtxoBatch, tip: &[u8]) -> Result<()> {
        let encoded = encode_puts(batch)?;
        self.buckets()?.apply(encoded, &batch.deletes, tip);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
