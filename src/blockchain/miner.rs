use log::{info, warn};

use std::sync::{Arc, Mutex, MutexGuard};

use super::block::Block;
use super::chain::{Blockchain, BlockchainError};
use super::crypto::Address;
use super::pow::{CancelToken, ProofOfWork};

/// A ledger shared between concurrent miners and callers
pub type SharedLedger = Arc<Mutex<Blockchain>>;

/// Wraps a ledger for sharing
pub fn shared(blockchain: Blockchain) -> SharedLedger {
    Arc::new(Mutex::new(blockchain))
}

/// Mines blocks on a shared ledger.
///
/// The search runs on tokio's blocking pool without holding the lock. Sealing
/// happens under the lock and re-checks the solution against the tip at that
/// moment, so two miners can never seal against the same tip; the loser
/// searches again against the new tip.
#[derive(Debug, Clone)]
pub struct Miner {
    ledger: SharedLedger,
    address: Address,
    cancel: CancelToken,
}

impl Miner {
    pub fn new(ledger: SharedLedger, address: Address) -> Self {
        Miner {
            ledger,
            address,
            cancel: CancelToken::new(),
        }
    }

    /// Token that aborts this miner's current and future searches
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Mines one block, retrying whenever another miner moved the tip first
    pub async fn mine(&self) -> Result<Block, BlockchainError> {
        loop {
            let (previous_proof, difficulty, tip_index) = {
                let ledger = self.lock()?;
                let tip = ledger.get_last_block();
                (tip.proof, ledger.difficulty(), tip.index)
            };

            let solution = ProofOfWork::solve_async(previous_proof, difficulty, self.cancel.clone())
                .await
                .map_err(|e| BlockchainError::SystemError(e.to_string()))??;

            let mut ledger = self.lock()?;
            match ledger.seal_block(solution.proof, solution.nonce, &self.address) {
                Ok(block) => {
                    info!("{} sealed block {}", self.address, block.index);
                    return Ok(block);
                }
                Err(BlockchainError::PreconditionViolation(reason)) => {
                    warn!(
                        "{} lost the race for block {}: {}",
                        self.address,
                        tip_index + 1,
                        reason
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Blockchain>, BlockchainError> {
        self.ledger
            .lock()
            .map_err(|e| BlockchainError::SystemError(format!("ledger lock poisoned: {}", e)))
    }
}
