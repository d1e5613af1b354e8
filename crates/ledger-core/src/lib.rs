//! Core of a single-node UTXO ledger: blocks linked by proof of work, transactions
//! signed with P-256 keys, and a rebuildable index of unspent outputs.
//!
//! Persistence is abstracted behind [`ChainStore`]; `ledger-storage` provides the
//! on-disk implementation and [`store::MemoryStore`] an in-process one.

pub mod address;
pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod hashing;
pub mod ledger;
pub mod merkle;
pub mod mine;
pub mod pow;
pub mod store;
pub mod transaction;
pub mod utxo;
pub mod wallet;

pub type Hash = [u8; 32];

pub use address::{address_from_public_key, locking_hash_from_address, validate_address};
pub use block::Block;
pub use chain::{Chain, ChainIter, ChainStore};
pub use config::ChainConfig;
pub use error::{LedgerError, Result};
pub use ledger::Ledger;
pub use merkle::merkle_root;
pub use mine::CancelFlag;
pub use pow::ProofOfWork;
pub use transaction::{Transaction, TxInput, TxOutput, TxResolver};
pub use utxo::{IndexedOutput, UtxoBatch, UtxoEntry, UtxoIndex, UtxoMap};
pub use wallet::{Wallet, Wallets};
