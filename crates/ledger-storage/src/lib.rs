//! On-disk storage for the ledger, built on sled.

pub mod sled_store;

pub use sled_store::SledStore;
