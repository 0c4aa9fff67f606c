use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task::JoinHandle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Highest difficulty a SHA-256 hex digest can satisfy
pub const MAX_DIFFICULTY: u32 = 64;

/// Errors that can occur during a proof-of-work search
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PowError {
    #[error("Proof-of-work search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("Difficulty {0} is out of range (1..=64)")]
    InvalidDifficulty(u32),
}

/// Cooperative cancellation flag shared between a search and its owner
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every search holding a clone of this token to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A nonce that satisfies the difficulty predicate for some previous proof
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// The winning nonce
    pub nonce: u64,

    /// The proof value the sealed block will carry
    pub proof: u64,

    /// Hex digest produced by the winning nonce
    pub hash: String,
}

/// The proof-of-work puzzle.
///
/// A nonce solves the puzzle for `previous_proof` at `difficulty` when
/// `sha256("{previous_proof²}{nonce}{difficulty}")` starts with `difficulty`
/// hex zeros. The proof recorded in the block is the last eight bytes of
/// that digest, so each block's puzzle depends on its predecessor's solution.
pub struct ProofOfWork;

impl ProofOfWork {
    /// Scans nonces upward from 0 until one meets `difficulty`.
    ///
    /// The search has no upper bound; `cancel` is polled before every attempt.
    pub fn solve(previous_proof: u64, difficulty: u32, cancel: &CancelToken) -> Result<Solution, PowError> {
        check_difficulty(difficulty)?;
        info!("Starting proof-of-work: previous proof {}, difficulty {}", previous_proof, difficulty);

        let mut nonce: u64 = 0;
        loop {
            if cancel.is_cancelled() {
                debug!("Proof-of-work cancelled at nonce {}", nonce);
                return Err(PowError::Cancelled { attempts: nonce });
            }

            let digest = raw_digest(previous_proof, nonce, difficulty);
            let hash = hex::encode(digest);

            if meets_difficulty(&hash, difficulty) {
                info!("Proof-of-work solved: nonce={}, hash={}", nonce, hash);
                return Ok(Solution {
                    nonce,
                    proof: fold_proof(&digest),
                    hash,
                });
            }

            nonce = nonce.wrapping_add(1);
        }
    }

    /// Runs [`ProofOfWork::solve`] on tokio's blocking pool
    pub fn solve_async(
        previous_proof: u64,
        difficulty: u32,
        cancel: CancelToken,
    ) -> JoinHandle<Result<Solution, PowError>> {
        tokio::task::spawn_blocking(move || Self::solve(previous_proof, difficulty, &cancel))
    }

    /// Recomputes the solution a nonce yields against `previous_proof`
    pub fn evaluate(previous_proof: u64, nonce: u64, difficulty: u32) -> Solution {
        let digest = raw_digest(previous_proof, nonce, difficulty);
        Solution {
            nonce,
            proof: fold_proof(&digest),
            hash: hex::encode(digest),
        }
    }

    /// Checks that `nonce` solves the puzzle and yields `proof`
    pub fn verify(previous_proof: u64, difficulty: u32, nonce: u64, proof: u64) -> bool {
        if check_difficulty(difficulty).is_err() {
            return false;
        }

        let solution = Self::evaluate(previous_proof, nonce, difficulty);
        solution.proof == proof && meets_difficulty(&solution.hash, difficulty)
    }
}

/// Checks that `hash` starts with `difficulty` '0' characters
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

pub(crate) fn check_difficulty(difficulty: u32) -> Result<(), PowError> {
    if difficulty == 0 || difficulty > MAX_DIFFICULTY {
        return Err(PowError::InvalidDifficulty(difficulty));
    }
    Ok(())
}

fn raw_digest(previous_proof: u64, nonce: u64, difficulty: u32) -> [u8; 32] {
    let squared = u128::from(previous_proof) * u128::from(previous_proof);
    let challenge = format!("{}{}{}", squared, nonce, difficulty);

    let mut hasher = Sha256::new();
    hasher.update(challenge.as_bytes());
    hasher.finalize().into()
}

fn fold_proof(digest: &[u8; 32]) -> u64 {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[24..]);
    u64::from_be_bytes(tail)
}
