use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::crypto::Address;

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(Address),
}

/// Represents a balance-affecting transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: String,

    /// Sender's address (the reward sentinel for mining rewards)
    pub sender: Address,

    /// Recipient's address
    pub recipient: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Fee paid to the miner of the including block
    pub fee: f64,

    /// Timestamp when the transaction was created
    pub timestamp: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The address of the sender
    /// * `recipient` - The address of the recipient
    /// * `amount` - The amount to transfer
    /// * `fee` - The transaction fee
    ///
    /// # Returns
    ///
    /// The transaction, or `InvalidAmount` if the amount or fee is negative or not finite
    pub fn new(
        sender: Address,
        recipient: Address,
        amount: f64,
        fee: f64,
    ) -> Result<Self, TransactionError> {
        check_amount("amount", amount)?;
        check_amount("fee", fee)?;

        Ok(Transaction {
            id: Uuid::new_v4().to_string(),
            sender,
            recipient,
            amount,
            fee,
            timestamp: Utc::now(),
        })
    }

    /// Creates a fee-less transaction
    pub fn transfer(sender: Address, recipient: Address, amount: f64) -> Result<Self, TransactionError> {
        Self::new(sender, recipient, amount, 0.0)
    }

    /// Creates a mining reward transaction
    ///
    /// # Arguments
    ///
    /// * `recipient` - The address of the miner
    /// * `amount` - The base reward plus collected fees
    pub fn new_reward(recipient: Address, amount: f64) -> Self {
        Transaction {
            id: Uuid::new_v4().to_string(),
            sender: Address::reward_sender(),
            recipient,
            amount,
            fee: 0.0,
            timestamp: Utc::now(),
        }
    }

    /// Checks if the transaction mints a mining reward
    pub fn is_reward(&self) -> bool {
        self.sender.is_reward_sender()
    }

    /// Gets the total amount debited from the sender (amount + fee)
    pub fn total_amount(&self) -> f64 {
        self.amount + self.fee
    }

}

/// Sum of the fees paid by the non-reward transactions in `transactions`
pub fn total_fees<'a>(transactions: impl IntoIterator<Item = &'a Transaction>) -> f64 {
    transactions
        .into_iter()
        .filter(|tx| !tx.is_reward())
        .map(|tx| tx.fee)
        .sum()
}

fn check_amount(field: &str, value: f64) -> Result<(), TransactionError> {
    if !value.is_finite() || value < 0.0 {
        return Err(TransactionError::InvalidAmount(format!(
            "{} must be a non-negative number: {}",
            field, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction() {
        let transaction = Transaction::new(
            Address::new("alice"),
            Address::new("bob"),
            10.5,
            0.25,
        )
        .unwrap();

        assert_eq!(transaction.sender, Address::new("alice"));
        assert_eq!(transaction.recipient, Address::new("bob"));
        assert_eq!(transaction.amount, 10.5);
        assert_eq!(transaction.fee, 0.25);
        assert_eq!(transaction.total_amount(), 10.75);
        assert!(!transaction.id.is_empty());
        assert!(!transaction.is_reward());
    }

    #[test]
    fn test_fee_defaults_to_zero() {
        let transaction = Transaction::transfer(Address::new("a"), Address::new("b"), 3.0).unwrap();
        assert_eq!(transaction.fee, 0.0);
        assert_eq!(transaction.total_amount(), 3.0);
    }

    #[test]
    fn test_rejects_bad_amounts() {
        let a = Address::new("a");
        let b = Address::new("b");

        assert!(matches!(
            Transaction::new(a.clone(), b.clone(), -1.0, 0.0),
            Err(TransactionError::InvalidAmount(_))
        ));
        assert!(matches!(
            Transaction::new(a.clone(), b.clone(), 1.0, -0.5),
            Err(TransactionError::InvalidAmount(_))
        ));
        assert!(Transaction::new(a.clone(), b.clone(), f64::NAN, 0.0).is_err());
        assert!(Transaction::new(a, b, 0.0, 0.0).is_ok());
    }

    #[test]
    fn test_reward_transaction() {
        let transaction = Transaction::new_reward(Address::new("miner"), 53.0);

        assert!(transaction.sender.is_reward_sender());
        assert_eq!(transaction.recipient, Address::new("miner"));
        assert_eq!(transaction.amount, 53.0);
        assert_eq!(transaction.fee, 0.0);
        assert!(transaction.is_reward());
    }

    #[test]
    fn test_total_fees_skips_rewards() {
        let transactions = vec![
            Transaction::new(Address::new("a"), Address::new("b"), 10.0, 2.0).unwrap(),
            Transaction::new(Address::new("b"), Address::new("c"), 5.0, 0.5).unwrap(),
            Transaction::new_reward(Address::new("miner"), 50.0),
        ];

        assert_eq!(total_fees(&transactions), 2.5);
        assert_eq!(total_fees(std::iter::empty()), 0.0);
    }
}
