use dashmap::DashMap;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::collections::BTreeMap;

use super::block::Block;
use super::crypto::Address;
use super::transaction::Transaction;

/// Errors that can occur during account operations
#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Represents an account balance derived from the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The account's address
    pub address: Address,

    /// The account's balance (may go negative, see [`AccountState::apply_transaction`])
    pub balance: f64,
}

impl Account {
    /// Creates a new empty account
    pub fn new(address: Address) -> Self {
        Account {
            address,
            balance: 0.0,
        }
    }

    /// Checks if the account has sufficient funds
    pub fn has_sufficient_funds(&self, amount: f64) -> bool {
        self.balance >= amount
    }
}

/// Balance map of every account touched by the chain.
///
/// Balances are a projection of the chain plus the opening allocations; they
/// can always be rebuilt with [`AccountState::replay`]. Absent addresses hold 0.
#[derive(Debug, Clone, Default)]
pub struct AccountState {
    accounts: DashMap<Address, Account>,
}

impl AccountState {
    /// Creates an empty account state
    pub fn new() -> Self {
        AccountState {
            accounts: DashMap::new(),
        }
    }

    /// Creates an account state holding the given opening balances
    pub fn with_allocations(allocations: &BTreeMap<Address, f64>) -> Self {
        let state = AccountState::new();
        for (address, amount) in allocations {
            state.credit(address, *amount);
        }
        state
    }

    /// Rebuilds balances from `allocations` by applying every block in order
    ///
    /// Replaying the same blocks over the same allocations always yields the same map.
    pub fn replay<'a>(
        allocations: &BTreeMap<Address, f64>,
        blocks: impl IntoIterator<Item = &'a Block>,
    ) -> Self {
        let state = AccountState::with_allocations(allocations);
        let mut applied = 0usize;
        for block in blocks {
            state.apply_block(block);
            applied += 1;
        }
        debug!("Replayed {} blocks over {} allocations", applied, allocations.len());
        state
    }

    /// Gets an account by address, or an empty account if it doesn't exist
    pub fn get_account(&self, address: &Address) -> Account {
        if let Some(account) = self.accounts.get(address) {
            account.clone()
        } else {
            Account::new(address.clone())
        }
    }

    /// Gets the balance of an address (0 when absent)
    pub fn balance(&self, address: &Address) -> f64 {
        self.accounts
            .get(address)
            .map(|account| account.balance)
            .unwrap_or(0.0)
    }

    /// Fails with `InsufficientFunds` unless `address` holds at least `required`
    pub fn ensure_funds(&self, address: &Address, required: f64) -> Result<(), AccountError> {
        let account = self.get_account(address);
        if !account.has_sufficient_funds(required) {
            return Err(AccountError::InsufficientFunds {
                required,
                available: account.balance,
            });
        }
        Ok(())
    }

    pub fn credit(&self, address: &Address, amount: f64) {
        self.accounts
            .entry(address.clone())
            .or_insert_with(|| Account::new(address.clone()))
            .balance += amount;
    }

    pub fn debit(&self, address: &Address, amount: f64) {
        self.accounts
            .entry(address.clone())
            .or_insert_with(|| Account::new(address.clone()))
            .balance -= amount;
    }

    /// Applies one sealed transaction.
    ///
    /// The sender is debited `amount + fee` unless it is the reward sentinel,
    /// and the recipient is credited `amount`. Funds were checked at
    /// submission, so no check happens here and a balance may go negative
    /// when several pending transactions overdraw the same sender.
    pub fn apply_transaction(&self, transaction: &Transaction) {
        if !transaction.is_reward() {
            self.debit(&transaction.sender, transaction.total_amount());
        }
        self.credit(&transaction.recipient, transaction.amount);
    }

    /// Applies every transaction of a sealed block in list order
    pub fn apply_block(&self, block: &Block) {
        for transaction in &block.transactions {
            self.apply_transaction(transaction);
        }
    }

    /// Drops every balance and starts over from `allocations`
    pub fn reset(&self, allocations: &BTreeMap<Address, f64>) {
        self.accounts.clear();
        for (address, amount) in allocations {
            self.credit(address, *amount);
        }
    }

    /// Gets all accounts, ordered by address
    pub fn get_all_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.address.cmp(&b.address));
        accounts
    }

    /// Address-ordered copy of the balance map
    pub fn snapshot(&self) -> BTreeMap<Address, f64> {
        self.accounts
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().balance))
            .collect()
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> f64 {
        self.accounts.iter().map(|entry| entry.value().balance).sum()
    }
}
