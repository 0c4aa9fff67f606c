use log::{debug, info, warn};
use thiserror::Error;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::account::{AccountError, AccountState};
use super::block::Block;
use super::crypto::{AcceptAllAddresses, Address, AddressValidator};
use super::history::TransactionHistory;
use super::pow::{check_difficulty, CancelToken, PowError, ProofOfWork, Solution};
use super::transaction::{total_fees, Transaction, TransactionError};
use super::validation::{validate_blocks, validate_link, IntegrityViolation};
use crate::config::LedgerConfig;

/// Default mining difficulty (number of leading zeros required in hash)
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Default base reward for mining a block
pub const DEFAULT_MINING_REWARD: f64 = 50.0;

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Account error: {0}")]
    AccountError(#[from] AccountError),

    #[error("Proof-of-work error: {0}")]
    PowError(#[from] PowError),

    #[error(transparent)]
    IntegrityViolation(#[from] IntegrityViolation),

    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("System error: {0}")]
    SystemError(String),
}

/// The ledger: chain, pending pool, balances and per-address history.
///
/// The chain is stored contiguously from genesis to tip and always holds at
/// least the genesis block. Everything is mutated only through the methods
/// below; balances and history are projections of the chain that can be
/// rebuilt at any time.
#[derive(Clone)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    chain: Vec<Block>,

    /// Pending transactions to be included in the next block
    pending_transactions: Vec<Transaction>,

    /// Balance map derived from the chain
    account_state: AccountState,

    /// Transactions per address
    history: TransactionHistory,

    /// Opening balances replayed before the first block
    allocations: BTreeMap<Address, f64>,

    /// Mining difficulty for future blocks
    difficulty: u32,

    /// Base mining reward
    mining_reward: f64,

    /// Well-formedness check for submitted addresses
    address_validator: Arc<dyn AddressValidator>,
}

impl fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blockchain")
            .field("height", &self.chain.len())
            .field("pending", &self.pending_transactions.len())
            .field("difficulty", &self.difficulty)
            .field("mining_reward", &self.mining_reward)
            .finish()
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block and default settings
    pub fn new() -> Self {
        let genesis = Block::genesis();
        info!("Genesis block created: {} ({})", genesis.index, genesis.hash);

        Blockchain {
            chain: vec![genesis],
            pending_transactions: Vec::new(),
            account_state: AccountState::new(),
            history: TransactionHistory::new(),
            allocations: BTreeMap::new(),
            difficulty: DEFAULT_DIFFICULTY,
            mining_reward: DEFAULT_MINING_REWARD,
            address_validator: Arc::new(AcceptAllAddresses),
        }
    }

    /// Creates a new blockchain with the given difficulty
    pub fn with_difficulty(difficulty: u32) -> Result<Self, BlockchainError> {
        let mut blockchain = Blockchain::new();
        blockchain.set_difficulty(difficulty)?;
        Ok(blockchain)
    }

    /// Creates a new blockchain from a validated configuration
    ///
    /// Allocations in the config become opening balances.
    pub fn from_config(config: &LedgerConfig) -> Result<Self, BlockchainError> {
        let mut blockchain = Blockchain::with_difficulty(config.difficulty)?;
        blockchain.set_mining_reward(config.mining_reward)?;

        for (address, amount) in &config.allocations {
            blockchain.fund(&Address::new(address.as_str()), *amount)?;
        }

        Ok(blockchain)
    }

    /// Replaces the address validator consulted on submission
    pub fn with_address_validator(mut self, validator: impl AddressValidator + 'static) -> Self {
        self.address_validator = Arc::new(validator);
        self
    }

    /// Changes the difficulty of future blocks; sealed blocks keep theirs
    pub fn set_difficulty(&mut self, difficulty: u32) -> Result<(), BlockchainError> {
        check_difficulty(difficulty)?;
        self.difficulty = difficulty;
        Ok(())
    }

    pub fn set_mining_reward(&mut self, reward: f64) -> Result<(), BlockchainError> {
        if !reward.is_finite() || reward < 0.0 {
            return Err(AccountError::InvalidAmount(format!(
                "Mining reward must be a non-negative number: {}",
                reward
            ))
            .into());
        }
        self.mining_reward = reward;
        Ok(())
    }

    /// Grants an opening balance outside the chain.
    ///
    /// Allocations are the base every balance recomputation starts from, so
    /// they survive [`Blockchain::recalculate_balances`] and fork adoption.
    pub fn fund(&mut self, address: &Address, amount: f64) -> Result<(), BlockchainError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(AccountError::InvalidAmount(format!(
                "Allocation must be a non-negative number: {}",
                amount
            ))
            .into());
        }

        *self.allocations.entry(address.clone()).or_insert(0.0) += amount;
        self.account_state.credit(address, amount);
        info!("Allocated {} to {}", amount, address);
        Ok(())
    }

    /// Gets the last block in the chain
    pub fn get_last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("Blockchain should always have at least the genesis block")
    }

    pub fn get_genesis_block(&self) -> &Block {
        &self.chain[0]
    }

    /// Creates a transaction and adds it to the pending pool
    ///
    /// # Returns
    ///
    /// The index of the block expected to include the transaction. This is
    /// advisory: the chain may move before the pool is sealed.
    pub fn submit_transaction(
        &mut self,
        sender: &Address,
        recipient: &Address,
        amount: f64,
        fee: f64,
    ) -> Result<u64, BlockchainError> {
        let transaction = Transaction::new(sender.clone(), recipient.clone(), amount, fee)?;
        self.add_transaction(transaction)
    }

    /// Submits a transaction that pays no fee
    pub fn submit_transfer(
        &mut self,
        sender: &Address,
        recipient: &Address,
        amount: f64,
    ) -> Result<u64, BlockchainError> {
        let transaction = Transaction::transfer(sender.clone(), recipient.clone(), amount)?;
        self.add_transaction(transaction)
    }

    /// Adds a transaction to the pending pool.
    ///
    /// Both addresses must pass the validator, and a non-reward sender must
    /// hold `amount + fee`. A rejected transaction leaves the ledger untouched.
    /// Balances only change when the pool is sealed.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<u64, BlockchainError> {
        if !transaction.is_reward() {
            self.check_address(&transaction.sender)?;
        }
        self.check_address(&transaction.recipient)?;

        if !transaction.is_reward() {
            if let Err(err) = self
                .account_state
                .ensure_funds(&transaction.sender, transaction.total_amount())
            {
                warn!("Rejected transaction {}: {}", transaction.id, err);
                return Err(err.into());
            }
        }

        info!(
            "Transaction created: {} sends {} (fee {}) to {}",
            transaction.sender, transaction.amount, transaction.fee, transaction.recipient
        );
        self.accept_transaction(transaction);

        Ok(self.get_last_block().index + 1)
    }

    fn check_address(&self, address: &Address) -> Result<(), BlockchainError> {
        if !self.address_validator.is_valid_address(address) {
            warn!("Rejected invalid address {}", address);
            return Err(TransactionError::InvalidAddress(address.clone()).into());
        }
        Ok(())
    }

    /// Searches for a nonce against the tip's proof at the current difficulty
    pub fn solve_proof_of_work(&self, cancel: &CancelToken) -> Result<Solution, BlockchainError> {
        let previous_proof = self.get_last_block().proof;
        Ok(ProofOfWork::solve(previous_proof, self.difficulty, cancel)?)
    }

    /// Seals the pending pool into a new block.
    ///
    /// `proof` and `nonce` must solve the puzzle posed by the current tip at
    /// the current difficulty, otherwise `PreconditionViolation` is returned
    /// and nothing changes. On success a reward of base reward plus the
    /// pending transactions' fees is appended for `miner`, the block is linked after the
    /// tip, the pool is emptied and balances are updated.
    pub fn seal_block(&mut self, proof: u64, nonce: u64, miner: &Address) -> Result<Block, BlockchainError> {
        let (tip_index, tip_proof, tip_hash) = {
            let tip = self.get_last_block();
            (tip.index, tip.proof, tip.hash.clone())
        };

        if !ProofOfWork::verify(tip_proof, self.difficulty, nonce, proof) {
            return Err(BlockchainError::PreconditionViolation(format!(
                "nonce {} with proof {} does not solve block {} at difficulty {}",
                nonce, proof, tip_index, self.difficulty
            )));
        }

        self.check_address(miner)?;

        let fees = total_fees(&self.pending_transactions);
        let reward = Transaction::new_reward(miner.clone(), self.mining_reward + fees);
        self.history.record(&reward);
        self.pending_transactions.push(reward);

        let transactions = std::mem::take(&mut self.pending_transactions);
        let block = Block::new(
            tip_index + 1,
            transactions,
            proof,
            nonce,
            self.difficulty,
            tip_hash,
        );

        self.account_state.apply_block(&block);
        self.chain.push(block.clone());

        info!(
            "Block {} created with {} transactions and hash {}",
            block.index,
            block.transactions.len(),
            block.hash
        );
        Ok(block)
    }

    /// Solves the proof of work for the tip and seals the pending pool
    pub fn mine_block(&mut self, miner: &Address, cancel: &CancelToken) -> Result<Block, BlockchainError> {
        let solution = self.solve_proof_of_work(cancel)?;
        self.seal_block(solution.proof, solution.nonce, miner)
    }

    /// Validates the chain, reporting the first offending block
    pub fn validate_chain(&self) -> Result<(), IntegrityViolation> {
        validate_blocks(&self.chain)
    }

    /// Validates the blockchain
    ///
    /// # Returns
    ///
    /// true if the blockchain is valid, false otherwise
    pub fn is_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(violation) => {
                warn!("{}", violation);
                false
            }
        }
    }

    /// Gets the balance of an address (0 for unknown addresses)
    pub fn get_balance(&self, address: &Address) -> f64 {
        self.account_state.balance(address)
    }

    /// Gets the transactions an address took part in, oldest first
    pub fn get_history(&self, address: &Address) -> &[Transaction] {
        self.history.for_address(address)
    }

    /// Gets the entire blockchain
    pub fn get_chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn get_pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn get_account_state(&self) -> &AccountState {
        &self.account_state
    }

    pub fn allocations(&self) -> &BTreeMap<Address, f64> {
        &self.allocations
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    /// Number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Always false: the genesis block is created with the ledger
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Resets balances to the allocations and replays every block from genesis
    pub fn recalculate_balances(&mut self) {
        self.account_state.reset(&self.allocations);
        for block in &self.chain {
            self.account_state.apply_block(block);
        }
        debug!("Balances recalculated from {} blocks", self.chain.len());
    }

    /// Adopts the longest valid chain among the ledger's own and `candidates`.
    ///
    /// A candidate replaces the current best only when strictly longer, so
    /// on equal length the first one seen wins and the ledger's own chain is
    /// always seen first. Candidates that fail validation are skipped. There
    /// is no cumulative-work comparison.
    ///
    /// On adoption balances are recomputed from the allocations, pending
    /// transactions already contained in the new chain are dropped, and the
    /// history is rebuilt from the new chain plus the remaining pool.
    ///
    /// # Returns
    ///
    /// true if a candidate replaced the ledger's chain
    pub fn resolve_fork(&mut self, candidates: &[Vec<Block>]) -> bool {
        let mut best: Option<&Vec<Block>> = None;
        let mut best_len = self.chain.len();

        for (position, candidate) in candidates.iter().enumerate() {
            if candidate.len() <= best_len {
                continue;
            }
            if let Err(violation) = validate_blocks(candidate) {
                warn!("Skipping fork candidate {}: {}", position, violation);
                continue;
            }
            best = Some(candidate);
            best_len = candidate.len();
        }

        let Some(adopted) = best else {
            info!("Fork resolution kept the local chain of {} blocks", self.chain.len());
            return false;
        };

        self.chain = adopted.clone();
        self.recalculate_balances();

        let sealed: HashSet<&str> = self
            .chain
            .iter()
            .flat_map(|block| block.transactions.iter())
            .map(|tx| tx.id.as_str())
            .collect();
        self.pending_transactions
            .retain(|tx| !sealed.contains(tx.id.as_str()));

        self.history = TransactionHistory::rebuild(&self.chain, &self.pending_transactions);

        info!(
            "Fork resolution adopted a chain of {} blocks with tip {}",
            self.chain.len(),
            self.get_last_block().hash
        );
        true
    }

    /// Appends a transaction received from a peer to the pending pool without checks
    pub fn accept_transaction(&mut self, transaction: Transaction) {
        self.history.record(&transaction);
        self.pending_transactions.push(transaction);
    }

    /// Appends a block sealed by a peer on top of this ledger's tip.
    ///
    /// The block must be a valid successor of the tip. Its transactions are
    /// removed from the pending pool, added to the history if unseen, and
    /// applied to the balances.
    pub fn accept_block(&mut self, block: Block) -> Result<(), BlockchainError> {
        validate_link(self.get_last_block(), &block)?;

        let included: HashSet<&str> = block.transactions.iter().map(|tx| tx.id.as_str()).collect();
        let known: HashSet<String> = self
            .pending_transactions
            .iter()
            .filter(|tx| included.contains(tx.id.as_str()))
            .map(|tx| tx.id.clone())
            .collect();

        for transaction in &block.transactions {
            if !known.contains(&transaction.id) {
                self.history.record(transaction);
            }
        }
        self.pending_transactions
            .retain(|tx| !known.contains(&tx.id));

        self.account_state.apply_block(&block);
        info!("Accepted block {} from peer ({})", block.index, block.hash);
        self.chain.push(block);
        Ok(())
    }

    /// Hands a transaction to every peer's pending pool
    pub fn propagate_transaction<'a>(
        transaction: &Transaction,
        peers: impl IntoIterator<Item = &'a mut Blockchain>,
    ) {
        let mut delivered = 0usize;
        for peer in peers {
            peer.accept_transaction(transaction.clone());
            delivered += 1;
        }
        debug!("Propagated transaction {} to {} peers", transaction.id, delivered);
    }

    /// Offers a block to every peer, returning each peer's verdict in order
    pub fn propagate_block<'a>(
        block: &Block,
        peers: impl IntoIterator<Item = &'a mut Blockchain>,
    ) -> Vec<Result<(), BlockchainError>> {
        peers
            .into_iter()
            .map(|peer| {
                let result = peer.accept_block(block.clone());
                if let Err(err) = &result {
                    warn!("Peer rejected block {}: {}", block.index, err);
                }
                result
            })
            .collect()
    }

    /// Renders the chain as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, BlockchainError> {
        Ok(serde_json::to_string_pretty(&self.chain)?)
    }
}
