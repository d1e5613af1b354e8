use std::fs;
use std::sync::Arc;

use ledger_core::{ChainConfig, Ledger, Wallet};
use ledger_storage::SledStore;
use tempfile::{tempdir, TempDir};

/// Low difficulty keeps mining in tests fast.
pub fn test_config() -> ChainConfig {
    ChainConfig::default().with_difficulty(8)
}

pub fn create_temp_store() -> (TempDir, Arc<SledStore>) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let store = SledStore::open(temp_dir.path()).expect("Failed to open SledStore");
    (temp_dir, Arc::new(store))
}

/// Fresh on-disk ledger whose genesis pays `owner`.
pub fn create_temp_ledger(owner: &Wallet) -> (TempDir, Ledger<SledStore>) {
    let (temp_dir, store) = create_temp_store();
    let ledger =
        Ledger::create(store, test_config(), &owner.address()).expect("Failed to create ledger");
    (temp_dir, ledger)
}

pub fn teardown_store(temp_dir: TempDir, store: Arc<SledStore>) {
    let db_path = temp_dir.path().to_path_buf();
    store.clear().expect("Failed to clear the store");
    drop(store);
    temp_dir.close().expect("Failed to delete temp dir");
    let _ = fs::remove_dir_all(&db_path);
    assert!(!db_path.exists(), "Database directory should be removed");
}
