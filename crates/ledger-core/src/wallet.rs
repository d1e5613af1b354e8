//! P-256 key pairs and the on-disk wallet collection.

use crate::address::address_from_public_key;
use crate::constants::KEY_COORD_SIZE;
use crate::error::{LedgerError, Result};
use crate::hashing::hash_pub_key;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{EncodedPoint, FieldBytes, PublicKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A single key pair. The public key is kept in raw `X ‖ Y` form (64 bytes), which is
/// what transaction inputs carry and what addresses are derived from.
#[derive(Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    public_key: Vec<u8>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl Wallet {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = raw_public_key(signing_key.verifying_key());
        Self {
            signing_key,
            public_key,
        }
    }

    pub fn from_private_key(bytes: &[u8]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(bytes)?;
        let public_key = raw_public_key(signing_key.verifying_key());
        Ok(Self {
            signing_key,
            public_key,
        })
    }

    pub fn address(&self) -> String {
        address_from_public_key(&self.public_key)
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn locking_hash(&self) -> Vec<u8> {
        hash_pub_key(&self.public_key)
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn private_key_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

/// Uncompressed SEC1 point without the `0x04` tag.
pub fn raw_public_key(key: &VerifyingKey) -> Vec<u8> {
    let point = PublicKey::from(key).to_encoded_point(false);
    let mut out = Vec::with_capacity(2 * KEY_COORD_SIZE);
    if let (Some(x), Some(y)) = (point.x(), point.y()) {
        out.extend_from_slice(x);
        out.extend_from_slice(y);
    }
    out
}

/// Splits a raw key in half and rebuilds the curve point from `(x, y)`.
pub fn verifying_key_from_raw(raw: &[u8]) -> Result<VerifyingKey> {
    if raw.is_empty() || raw.len() % 2 != 0 {
        return Err(LedgerError::CryptoFailure(format!(
            "raw public key has odd length {}",
            raw.len()
        )));
    }
    let (x, y) = raw.split_at(raw.len() / 2);
    let x = left_pad(x)?;
    let y = left_pad(y)?;
    let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Ok(VerifyingKey::from_encoded_point(&point)?)
}

/// Left-pads a big-endian integer to the curve's field width.
pub(crate) fn left_pad(bytes: &[u8]) -> Result<FieldBytes> {
    if bytes.len() > KEY_COORD_SIZE {
        return Err(LedgerError::CryptoFailure(format!(
            "component of {} bytes exceeds field size",
            bytes.len()
        )));
    }
    let mut out = FieldBytes::default();
    out[KEY_COORD_SIZE - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

#[derive(Serialize, Deserialize)]
struct WalletRecord {
    private_key: String,
    public_key: String,
}

#[derive(Serialize, Deserialize, Default)]
struct WalletFile {
    wallets: BTreeMap<String, WalletRecord>,
}

/// Address-keyed wallet collection backed by a JSON file.
#[derive(Debug)]
pub struct Wallets {
    path: PathBuf,
    wallets: BTreeMap<String, Wallet>,
}

impl Wallets {
    /// Loads the wallet file at `path`; a missing file yields an empty collection.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut wallets = BTreeMap::new();
        if path.exists() {
            let bytes = fs::read(&path)?;
            let file: WalletFile = serde_json::from_slice(&bytes)?;
            for (address, record) in file.wallets {
                let private_key = hex::decode(&record.private_key)
                    .map_err(|e| LedgerError::CorruptData(format!("wallet {address}: {e}")))?;
                let wallet = Wallet::from_private_key(&private_key)?;
                if hex::encode(wallet.public_key()) != record.public_key
                    || wallet.address() != address
                {
                    return Err(LedgerError::CorruptData(format!(
                        "wallet {address}: key pair does not match its address"
                    )));
                }
                wallets.insert(address, wallet);
            }
            debug!(count = wallets.len(), path = %path.display(), "wallets loaded");
        }
        Ok(Self { path, wallets })
    }

    /// Generates a key pair, stores it and returns its address. Call `save` to persist.
    pub fn create_wallet(&mut self) -> String {
        let wallet = Wallet::generate();
        let address = wallet.address();
        self.wallets.insert(address.clone(), wallet);
        info!(%address, "wallet created");
        address
    }

    pub fn get(&self, address: &str) -> Result<&Wallet> {
        self.wallets
            .get(address)
            .ok_or_else(|| LedgerError::NotFound(format!("no wallet for address {address}")))
    }

    pub fn addresses(&self) -> Vec<String> {
        self.wallets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    /// Writes the collection to a sibling temp file and renames it over the target.
    pub fn save(&self) -> Result<()> {
        let file = WalletFile {
            wallets: self
                .wallets
                .iter()
                .map(|(address, w)| {
                    (
                        address.clone(),
                        WalletRecord {
                            private_key: hex::encode(w.private_key_bytes()),
                            public_key: hex::encode(w.public_key()),
                        },
                    )
                })
                .collect(),
        };
        let bytes = serde_json::to_vec_pretty(&file)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
