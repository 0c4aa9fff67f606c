// Blockchain module
//
// This module contains the ledger engine including:
// - Block structure and hashing
// - Transaction structure
// - Proof of work puzzle
// - Balance accounting and per-address history
// - Chain validation
// - Ledger orchestration, fork resolution and propagation
// - Miners over a shared ledger

pub mod account;
pub mod block;
pub mod chain;
pub mod crypto;
pub mod history;
pub mod miner;
pub mod pow;
pub mod transaction;
pub mod validation;

// Re-export main components for easier access
pub use account::{Account, AccountError, AccountState};
pub use block::Block;
pub use chain::{Blockchain, BlockchainError};
pub use crypto::{AcceptAllAddresses, Address, AddressValidator};
pub use miner::{Miner, SharedLedger};
pub use pow::{CancelToken, PowError, ProofOfWork, Solution};
pub use transaction::{Transaction, TransactionError};
pub use validation::{IntegrityViolation, ViolationKind};
