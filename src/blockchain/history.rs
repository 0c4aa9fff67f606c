use std::collections::HashMap;

use super::block::Block;
use super::crypto::Address;
use super::transaction::Transaction;

/// Per-address list of the transactions an address took part in
#[derive(Debug, Clone, Default)]
pub struct TransactionHistory {
    entries: HashMap<Address, Vec<Transaction>>,
}

impl TransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `transaction` to the sender's and the recipient's lists
    ///
    /// Self-transfers are listed once.
    pub fn record(&mut self, transaction: &Transaction) {
        self.entries
            .entry(transaction.sender.clone())
            .or_default()
            .push(transaction.clone());

        if transaction.recipient != transaction.sender {
            self.entries
                .entry(transaction.recipient.clone())
                .or_default()
                .push(transaction.clone());
        }
    }

    /// Transactions involving `address`, oldest first
    pub fn for_address(&self, address: &Address) -> &[Transaction] {
        self.entries
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Rebuilds the history from a chain followed by still-pending transactions
    pub fn rebuild<'a>(
        blocks: impl IntoIterator<Item = &'a Block>,
        pending: &[Transaction],
    ) -> Self {
        let mut history = TransactionHistory::new();
        for block in blocks {
            for transaction in &block.transactions {
                history.record(transaction);
            }
        }
        for transaction in pending {
            history.record(transaction);
        }
        history
    }

    /// Number of addresses with at least one entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_both_parties() {
        let mut history = TransactionHistory::new();
        let first = Transaction::transfer(Address::new("a"), Address::new("b"), 1.0).unwrap();
        let second = Transaction::transfer(Address::new("b"), Address::new("c"), 2.0).unwrap();

        history.record(&first);
        history.record(&second);

        assert_eq!(history.for_address(&Address::new("a")), &[first.clone()]);
        assert_eq!(history.for_address(&Address::new("b")), &[first, second.clone()]);
        assert_eq!(history.for_address(&Address::new("c")), &[second]);
        assert!(history.for_address(&Address::new("d")).is_empty());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_self_transfer_listed_once() {
        let mut history = TransactionHistory::new();
        let transaction = Transaction::transfer(Address::new("a"), Address::new("a"), 1.0).unwrap();

        history.record(&transaction);

        assert_eq!(history.for_address(&Address::new("a")).len(), 1);
    }

    #[test]
    fn test_rebuild_orders_chain_before_pending() {
        let sealed = Transaction::transfer(Address::new("a"), Address::new("b"), 1.0).unwrap();
        let pending = Transaction::transfer(Address::new("b"), Address::new("a"), 1.0).unwrap();
        let block = Block::new(2, vec![sealed.clone()], 1, 0, 1, "prev".to_string());

        let history = TransactionHistory::rebuild([&block], &[pending.clone()]);

        assert_eq!(history.for_address(&Address::new("a")), &[sealed, pending]);
    }
}
