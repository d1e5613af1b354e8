use crate::Hash;
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

pub fn sha256(data: impl AsRef<[u8]>) -> Hash {
    let digest = Sha256::digest(data.as_ref());
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..]);
    out
}

/// SHA-256 over the concatenation of `parts`, without building the joined buffer.
pub fn sha256_concat(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// RIPEMD-160(SHA-256(public_key)): the value an output is locked to.
pub fn hash_pub_key(public_key: &[u8]) -> Vec<u8> {
    let sha = sha256(public_key);
    Ripemd160::digest(sha).to_vec()
}

/// First `len` bytes of SHA-256(SHA-256(payload)).
pub fn checksum(payload: &[u8], len: usize) -> Vec<u8> {
    let second = sha256(sha256(payload));
    second[..len.min(second.len())].to_vec()
}
