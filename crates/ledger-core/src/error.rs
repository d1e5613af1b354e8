//! Error types for the ledger core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("corrupt data: {0}")]
    CorruptData(String),

    #[error("crypto failure: {0}")]
    CryptoFailure(String),

    #[error("nonce space exhausted at difficulty {0}")]
    NonceExhausted(u32),

    #[error("stored tip no longer matches the expected parent")]
    StaleTip,

    #[error("utxo index is at {index}, chain tip is {tip}")]
    StaleIndex { index: String, tip: String },

    #[error("output values overflow u64")]
    ValueOverflow,

    #[error("mining cancelled")]
    MiningCancelled,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::CorruptData(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::CorruptData(err.to_string())
    }
}

impl From<p256::ecdsa::Error> for LedgerError {
    fn from(err: p256::ecdsa::Error) -> Self {
        LedgerError::CryptoFailure(err.to_string())
    }
}
