//! Transactions, the trimmed-copy signing scheme and coinbase/transfer construction.

use crate::address::locking_hash_from_address;
use crate::chain::ChainStore;
use crate::error::{LedgerError, Result};
use crate::hashing::{hash_pub_key, sha256};
use crate::utxo::UtxoIndex;
use crate::wallet::{left_pad, verifying_key_from_raw, Wallet};
use crate::Hash;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Output index carried by the single input of a coinbase transaction.
pub const COINBASE_VOUT: i64 = -1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the transaction whose output is spent; empty for coinbase.
    pub txid: Vec<u8>,
    /// Position of the spent output, `-1` for coinbase.
    pub vout: i64,
    pub signature: Vec<u8>,
    /// Raw `X ‖ Y` key of the spender, or the memo bytes of a coinbase.
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// Whether this input was created by the holder of the key hashing to `locking_hash`.
    pub fn uses_key(&self, locking_hash: &[u8]) -> bool {
        hash_pub_key(&self.public_key) == locking_hash
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub locking_hash: Vec<u8>,
}

impl TxOutput {
    /// Locks `value` to the key hash encoded in `address`.
    pub fn new(value: u64, address: &str) -> Result<Self> {
        Ok(Self {
            value,
            locking_hash: locking_hash_from_address(address)?,
        })
    }

    pub fn is_locked_with(&self, locking_hash: &[u8]) -> bool {
        self.locking_hash == locking_hash
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Vec<u8>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Looks up the full prior transaction an input refers to.
pub trait TxResolver {
    fn resolve(&self, txid: &[u8]) -> Result<Transaction>;
}

impl TxResolver for HashMap<Vec<u8>, Transaction> {
    fn resolve(&self, txid: &[u8]) -> Result<Transaction> {
        self.get(txid)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", hex::encode(txid))))
    }
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

impl Transaction {
    /// Mints `subsidy` to `to`. Without a memo a random suffix keeps ids unique.
    pub fn new_coinbase(to: &str, subsidy: u64, memo: Option<&str>) -> Result<Self> {
        let memo = match memo {
            Some(m) if !m.is_empty() => m.to_string(),
            _ => {
                let mut salt = [0u8; 8];
                rand::thread_rng().fill_bytes(&mut salt);
                format!("Reward sent to: {to} ({})", hex::encode(salt))
            }
        };
        let input = TxInput {
            txid: Vec::new(),
            vout: COINBASE_VOUT,
            signature: Vec::new(),
            public_key: memo.into_bytes(),
        };
        let mut tx = Transaction {
            id: Vec::new(),
            inputs: vec![input],
            outputs: vec![TxOutput::new(subsidy, to)?],
        };
        tx.id = tx.hash().to_vec();
        Ok(tx)
    }

    /// Builds and signs a transfer of `amount` from `from` to `to`, spending outputs
    /// picked by the UTXO index and returning any excess as change.
    pub fn new_transfer<S: ChainStore>(
        from: &Wallet,
        to: &str,
        amount: u64,
        utxo: &UtxoIndex<S>,
    ) -> Result<Self> {
        if amount == 0 {
            return Err(LedgerError::InvalidTransaction(
                "amount must be positive".to_string(),
            ));
        }
        let recipient = TxOutput::new(amount, to)?;
        let (accumulated, spendable) =
            utxo.find_spendable_outputs(&from.locking_hash(), amount)?;
        if accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                available: accumulated,
                requested: amount,
            });
        }

        let inputs = spendable
            .into_iter()
            .flat_map(|(txid, positions)| {
                positions.into_iter().map(move |vout| TxInput {
                    txid: txid.clone(),
                    vout: i64::from(vout),
                    signature: Vec::new(),
                    public_key: from.public_key().to_vec(),
                })
            })
            .collect();

        let mut outputs = vec![recipient];
        if accumulated > amount {
            outputs.push(TxOutput {
                value: accumulated - amount,
                locking_hash: from.locking_hash(),
            });
        }

        let mut tx = Transaction {
            id: Vec::new(),
            inputs,
            outputs,
        };
        tx.id = tx.hash().to_vec();
        utxo.chain().sign_transaction(&mut tx, from.signing_key())?;
        debug!(id = %hex::encode(&tx.id), amount, change = accumulated - amount, "transfer built");
        Ok(tx)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1
            && self.inputs[0].txid.is_empty()
            && self.inputs[0].vout == COINBASE_VOUT
    }

    /// Length-prefixed encoding of every field except `id`.
    pub fn hash_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.inputs.len() as u32).to_be_bytes());
        for input in &self.inputs {
            put_bytes(&mut buf, &input.txid);
            buf.extend_from_slice(&input.vout.to_be_bytes());
            put_bytes(&mut buf, &input.signature);
            put_bytes(&mut buf, &input.public_key);
        }
        buf.extend_from_slice(&(self.outputs.len() as u32).to_be_bytes());
        for output in &self.outputs {
            buf.extend_from_slice(&output.value.to_be_bytes());
            put_bytes(&mut buf, &output.locking_hash);
        }
        buf
    }

    /// SHA-256 of the transaction with its id treated as empty.
    pub fn hash(&self) -> Hash {
        sha256(self.hash_bytes())
    }

    /// Copy with every input's signature and public key cleared.
    pub fn trimmed_copy(&self) -> Self {
        Transaction {
            id: self.id.clone(),
            inputs: self
                .inputs
                .iter()
                .map(|input| TxInput {
                    txid: input.txid.clone(),
                    vout: input.vout,
                    signature: Vec::new(),
                    public_key: Vec::new(),
                })
                .collect(),
            outputs: self.outputs.clone(),
        }
    }

    pub fn sign(&mut self, key: &SigningKey, resolver: &impl TxResolver) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }
        for index in 0..self.inputs.len() {
            let digest = signing_digest(self, index, resolver)?;
            let signature: Signature = key.sign_prehash(&digest)?;
            self.inputs[index].signature = signature.to_bytes().to_vec();
        }
        Ok(())
    }

    /// Checks every input signature, stopping at the first failure.
    pub fn verify(&self, resolver: &impl TxResolver) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }
        for (index, input) in self.inputs.iter().enumerate() {
            let (digest, locking_hash) = input_context(self, index, resolver)?;
            if !input.uses_key(&locking_hash) {
                warn!(input = index, "input key does not own the referenced output");
                return Ok(false);
            }
            let Ok(key) = verifying_key_from_raw(&input.public_key) else {
                warn!(input = index, "malformed public key");
                return Ok(false);
            };
            let Ok(signature) = decode_signature(&input.signature) else {
                warn!(input = index, "malformed signature");
                return Ok(false);
            };
            if key.verify_prehash(&digest, &signature).is_err() {
                warn!(input = index, "signature check failed");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// The message signed for input `index`: the trimmed copy with that input's key slot set
/// to the locking hash of the output it spends, hashed.
pub fn signing_digest(tx: &Transaction, index: usize, resolver: &impl TxResolver) -> Result<Hash> {
    input_context(tx, index, resolver).map(|(digest, _)| digest)
}

fn input_context(
    tx: &Transaction,
    index: usize,
    resolver: &impl TxResolver,
) -> Result<(Hash, Vec<u8>)> {
    let input = tx.inputs.get(index).ok_or_else(|| {
        LedgerError::InvalidTransaction(format!("input {index} out of range"))
    })?;
    let prev = resolver.resolve(&input.txid)?;
    let spent = usize::try_from(input.vout)
        .ok()
        .and_then(|vout| prev.outputs.get(vout))
        .ok_or_else(|| {
            LedgerError::InvalidTransaction(format!(
                "input {index} spends missing output {} of {}",
                input.vout,
                hex::encode(&input.txid)
            ))
        })?;

    let mut trimmed = tx.trimmed_copy();
    trimmed.inputs[index].public_key = spent.locking_hash.clone();
    Ok((trimmed.hash(), spent.locking_hash.clone()))
}

/// Splits a signature into big-endian `r` and `s` halves.
fn decode_signature(bytes: &[u8]) -> Result<Signature> {
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return Err(LedgerError::CryptoFailure(format!(
            "signature has odd length {}",
            bytes.len()
        )));
    }
    let (r, s) = bytes.split_at(bytes.len() / 2);
    Ok(Signature::from_scalars(left_pad(r)?, left_pad(s)?)?)
}
