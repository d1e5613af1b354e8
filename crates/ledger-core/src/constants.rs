pub const POW_TARGET_DIFFICULTY: u32 = 20;
pub const MINING_SUBSIDY: u64 = 10;
pub const GENESIS_COINBASE_DATA: &str =
    "The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// Leading byte of every base-58 address.
pub const ADDRESS_VERSION: u8 = 0x00;
pub const ADDRESS_CHECKSUM_LEN: usize = 4;
/// RIPEMD-160 output length.
pub const LOCKING_HASH_SIZE: usize = 20;

/// P-256 scalar / coordinate width.
pub const KEY_COORD_SIZE: usize = 32;

/// The mining loops check the cancel flag once per this many nonces.
pub const CANCEL_POLL_INTERVAL: i64 = 4096;

/// Reserved key in the blocks bucket holding the tip hash.
pub const TIP_KEY: &[u8] = b"l";
/// Reserved key in the utxo bucket holding the block hash the index reflects.
pub const UTXO_TIP_KEY: &[u8] = b"l";
pub const BLOCKS_BUCKET: &str = "blocks";
pub const UTXO_BUCKET: &str = "utxo";
