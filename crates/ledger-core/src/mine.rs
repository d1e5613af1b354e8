use crate::constants::CANCEL_POLL_INTERVAL;
use crate::error::{LedgerError, Result};
use crate::pow::ProofOfWork;
use crate::Hash;
use rayon::prelude::*;
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared flag polled by the nonce search; raising it aborts mining.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

enum Outcome {
    Found(i64, Hash),
    Cancelled,
}

pub(crate) fn search_sequential(pow: &ProofOfWork, prefix: &Sha256) -> Result<(i64, Hash)> {
    let cancel = pow.cancel_flag();
    for nonce in 0..i64::MAX {
        if nonce % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            return Err(LedgerError::MiningCancelled);
        }
        let hash = ProofOfWork::hash_nonce(prefix, nonce);
        if pow.meets_target(&hash) {
            info!(nonce, hash = %hex::encode(hash), "mined block");
            return Ok((nonce, hash));
        }
    }
    Err(LedgerError::NonceExhausted(pow.difficulty()))
}

/// Searches nonces in parallel until a hash falls below the target. Rayon splits the
/// range across threads; the first hit (or a cancellation) stops the rest.
pub(crate) fn search_parallel(pow: &ProofOfWork, prefix: &Sha256) -> Result<(i64, Hash)> {
    let cancel = pow.cancel_flag();
    debug!(threads = rayon::current_num_threads(), "parallel nonce search");

    let found = (0i64..i64::MAX).into_par_iter().find_map_any(|nonce| {
        if nonce % CANCEL_POLL_INTERVAL == 0 && cancel.is_cancelled() {
            return Some(Outcome::Cancelled);
        }
        let hash = ProofOfWork::hash_nonce(prefix, nonce);
        pow.meets_target(&hash).then_some(Outcome::Found(nonce, hash))
    });

    match found {
        Some(Outcome::Found(nonce, hash)) => {
            info!(nonce, hash = %hex::encode(hash), "mined block");
            Ok((nonce, hash))
        }
        Some(Outcome::Cancelled) => Err(LedgerError::MiningCancelled),
        None => Err(LedgerError::NonceExhausted(pow.difficulty())),
    }
}
