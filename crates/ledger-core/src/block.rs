use crate::error::Result;
use crate::merkle::merkle_root;
use crate::pow::ProofOfWork;
use crate::transaction::Transaction;
use crate::Hash;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: i64,
    pub transactions: Vec<Transaction>,
    /// Empty for the genesis block.
    pub prev_hash: Vec<u8>,
    pub hash: Vec<u8>,
    pub nonce: i64,
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

impl Block {
    /// Stamps the current time and runs proof of work to completion.
    pub fn new(
        transactions: Vec<Transaction>,
        prev_hash: Vec<u8>,
        pow: &ProofOfWork,
    ) -> Result<Self> {
        let mut block = Block {
            timestamp: unix_now(),
            transactions,
            prev_hash,
            hash: Vec::new(),
            nonce: 0,
        };
        let (nonce, hash) = pow.run(&block)?;
        block.nonce = nonce;
        block.hash = hash.to_vec();
        Ok(block)
    }

    pub fn genesis(coinbase: Transaction, pow: &ProofOfWork) -> Result<Self> {
        Self::new(vec![coinbase], Vec::new(), pow)
    }

    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_empty()
    }

    /// Merkle commitment over the transaction ids.
    pub fn merkle_root(&self) -> Hash {
        let ids: Vec<&[u8]> = self.transactions.iter().map(|t| t.id.as_slice()).collect();
        merkle_root(&ids)
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(&self.hash)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::wallet::Wallet;

    fn pow() -> ProofOfWork {
        ProofOfWork::new(8).unwrap()
    }

    #[test]
    fn genesis_block_example() {
        let w = Wallet::generate();
        let cb = Transaction::new_coinbase(&w.address(), 10, Some("genesis")).unwrap();
        let genesis = Block::genesis(cb.clone(), &pow()).unwrap();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.transactions, vec![cb]);
        assert_eq!(genesis.hash.len(), 32);
        assert!(pow().validate(&genesis));
        assert!(genesis.timestamp > 0);
    }

    #[test]
    fn block_links_to_parent() {
        let w = Wallet::generate();
        let genesis = Block::genesis(
            Transaction::new_coinbase(&w.address(), 10, None).unwrap(),
            &pow(),
        )
        .unwrap();
        let next = Block::new(
            vec![Transaction::new_coinbase(&w.address(), 10, None).unwrap()],
            genesis.hash.clone(),
            &pow(),
        )
        .unwrap();
        assert_eq!(next.prev_hash, genesis.hash);
        assert!(!next.is_genesis());
        assert!(pow().validate(&next));
    }

    #[test]
    fn tampering_with_transactions_breaks_pow() {
        let w = Wallet::generate();
        let mut block = Block::genesis(
            Transaction::new_coinbase(&w.address(), 10, None).unwrap(),
            &pow(),
        )
        .unwrap();
        block.transactions[0].id[0] ^= 0xFF;
        assert!(!pow().validate(&block));
    }

    #[test]
    fn block_serialization_round_trip() {
        let w = Wallet::generate();
        let block = Block::genesis(
            Transaction::new_coinbase(&w.address(), 10, None).unwrap(),
            &pow(),
        )
        .unwrap();
        let bytes = block.serialize().unwrap();
        assert_eq!(Block::deserialize(&bytes).unwrap(), block);
    }

    #[test]
    fn empty_block_round_trip() {
        let block = Block {
            timestamp: 0,
            transactions: vec![],
            prev_hash: vec![],
            hash: vec![],
            nonce: 0,
        };
        assert_eq!(block.merkle_root(), [0u8; 32]);
        let bytes = block.serialize().unwrap();
        assert_eq!(Block::deserialize(&bytes).unwrap(), block);
    }

    #[test]
    fn garbage_bytes_are_corrupt() {
        let err = Block::deserialize(&[0xFF; 7]).unwrap_err();
        assert!(matches!(err, LedgerError::CorruptData(_)));
    }
}
