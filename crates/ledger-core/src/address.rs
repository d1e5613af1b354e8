//! Base-58 check encoding of locking hashes.
//!
//! `address = base58(version ‖ locking_hash ‖ checksum)` where the checksum is the first
//! four bytes of a double SHA-256 over `version ‖ locking_hash`.

use crate::constants::{ADDRESS_CHECKSUM_LEN, ADDRESS_VERSION, LOCKING_HASH_SIZE};
use crate::error::{LedgerError, Result};
use crate::hashing::{checksum, hash_pub_key};

/// Encodes a locking hash (RIPEMD-160 of the public key's SHA-256) as an address.
pub fn encode_address(locking_hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(1 + locking_hash.len() + ADDRESS_CHECKSUM_LEN);
    payload.push(ADDRESS_VERSION);
    payload.extend_from_slice(locking_hash);
    let check = checksum(&payload, ADDRESS_CHECKSUM_LEN);
    payload.extend_from_slice(&check);
    bs58::encode(payload).into_string()
}

pub fn address_from_public_key(public_key: &[u8]) -> String {
    encode_address(&hash_pub_key(public_key))
}

/// Decodes an address back to its locking hash, checking version, length and checksum.
pub fn locking_hash_from_address(address: &str) -> Result<Vec<u8>> {
    let raw = bs58::decode(address)
        .into_vec()
        .map_err(|e| LedgerError::InvalidAddress(format!("{address}: {e}")))?;
    if raw.len() != 1 + LOCKING_HASH_SIZE + ADDRESS_CHECKSUM_LEN {
        return Err(LedgerError::InvalidAddress(format!(
            "{address}: decoded length {}",
            raw.len()
        )));
    }
    let (payload, actual) = raw.split_at(raw.len() - ADDRESS_CHECKSUM_LEN);
    if payload[0] != ADDRESS_VERSION {
        return Err(LedgerError::InvalidAddress(format!(
            "{address}: unknown version {:#04x}",
            payload[0]
        )));
    }
    if checksum(payload, ADDRESS_CHECKSUM_LEN) != actual {
        return Err(LedgerError::InvalidAddress(format!("{address}: checksum mismatch")));
    }
    Ok(payload[1..].to_vec())
}

pub fn validate_address(address: &str) -> bool {
    locking_hash_from_address(address).is_ok()
}
