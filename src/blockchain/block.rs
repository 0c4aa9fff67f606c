use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::crypto::sha256_hex;
use super::transaction::Transaction;

/// Previous-hash value carried by the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Index of the genesis block
pub const GENESIS_INDEX: u64 = 1;

/// Proof value of the genesis block
pub const GENESIS_PROOF: u64 = 1;

/// Nonce of the genesis block
pub const GENESIS_NONCE: u64 = 0;

/// Difficulty recorded in the genesis block
pub const GENESIS_DIFFICULTY: u32 = 1;

/// Represents a sealed block in the chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position of the block in the chain, starting at 1
    pub index: u64,

    /// Timestamp when the block was sealed (informational only)
    pub timestamp: DateTime<Utc>,

    /// Transactions included in this block, in submission order
    pub transactions: Vec<Transaction>,

    /// Proof value derived from the winning proof-of-work digest
    pub proof: u64,

    /// Nonce that solved the proof-of-work puzzle
    pub nonce: u64,

    /// Difficulty in effect when the block was sealed
    pub difficulty: u32,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of this block's canonical fields
    pub hash: String,
}

impl Block {
    /// Creates the genesis block
    pub fn genesis() -> Self {
        Block::new(
            GENESIS_INDEX,
            Vec::new(),
            GENESIS_PROOF,
            GENESIS_NONCE,
            GENESIS_DIFFICULTY,
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Creates and seals a new block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `transactions` - The transactions to include in the block
    /// * `proof` - The proof value of the solved puzzle
    /// * `nonce` - The nonce that solved the puzzle
    /// * `difficulty` - The difficulty the puzzle was solved at
    /// * `previous_hash` - The hash of the previous block
    ///
    /// # Returns
    ///
    /// A new Block whose `hash` is already computed
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        nonce: u64,
        difficulty: u32,
        previous_hash: String,
    ) -> Self {
        let block = Block {
            index,
            timestamp: Utc::now(),
            transactions,
            proof,
            nonce,
            difficulty,
            previous_hash,
            hash: String::new(),
        };

        let hash = block.calculate_hash();

        Block { hash, ..block }
    }

    /// Calculates the hash of the block
    ///
    /// Every field except `hash` itself is serialized through a
    /// `serde_json::Value`, whose maps keep their keys sorted, so equal
    /// content always produces byte-identical input.
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        let block_data = serde_json::json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": self.transactions,
            "proof": self.proof,
            "nonce": self.nonce,
            "difficulty": self.difficulty,
            "previous_hash": self.previous_hash,
        });

        sha256_hex(block_data.to_string().as_bytes())
    }

    /// Checks that the stored hash matches the block's content
    pub fn has_valid_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Checks every fixed genesis field. The hash is checked separately.
    pub fn is_genesis(&self) -> bool {
        self.index == GENESIS_INDEX
            && self.previous_hash == GENESIS_PREVIOUS_HASH
            && self.transactions.is_empty()
            && self.proof == GENESIS_PROOF
            && self.nonce == GENESIS_NONCE
            && self.difficulty == GENESIS_DIFFICULTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Address;

    fn sample_block() -> Block {
        let transactions = vec![
            Transaction::new(Address::new("alice"), Address::new("bob"), 10.0, 1.0).unwrap(),
            Transaction::new_reward(Address::new("miner"), 51.0),
        ];

        Block::new(2, transactions, 100, 7, 2, "previous_hash".to_string())
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert_eq!(genesis.index, 1);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.proof, 1);
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.difficulty, 1);
        assert_eq!(genesis.previous_hash, "0");
        assert!(genesis.is_genesis());
        assert!(genesis.has_valid_hash());
    }

    #[test]
    fn test_new_block() {
        let block = sample_block();

        assert_eq!(block.index, 2);
        assert_eq!(block.proof, 100);
        assert_eq!(block.nonce, 7);
        assert_eq!(block.previous_hash, "previous_hash");
        assert_eq!(block.hash.len(), 64); // SHA-256 hash is 64 characters in hex
        assert!(!block.is_genesis());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = sample_block();
        let copy = block.clone();

        assert_eq!(block.calculate_hash(), block.calculate_hash());
        assert_eq!(block.calculate_hash(), copy.calculate_hash());
        assert_eq!(block.hash, block.calculate_hash());
    }

    #[test]
    fn test_hash_survives_json_round_trip() {
        let block = sample_block();
        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();

        assert!(decoded.has_valid_hash());
    }

    #[test]
    fn test_every_field_changes_hash() {
        let block = sample_block();
        let original = block.calculate_hash();

        let mutations: Vec<Box<dyn Fn(&mut Block)>> = vec![
            Box::new(|b: &mut Block| b.index += 1),
            Box::new(|b: &mut Block| b.timestamp = b.timestamp + chrono::Duration::seconds(1)),
            Box::new(|b: &mut Block| b.transactions[0].amount += 1.0),
            Box::new(|b: &mut Block| {
                b.transactions.pop();
            }),
            Box::new(|b: &mut Block| b.proof += 1),
            Box::new(|b: &mut Block| b.nonce += 1),
            Box::new(|b: &mut Block| b.difficulty += 1),
            Box::new(|b: &mut Block| b.previous_hash.push('x')),
        ];

        for mutate in mutations {
            let mut tampered = block.clone();
            mutate(&mut tampered);
            assert_ne!(tampered.calculate_hash(), original);
            assert!(!tampered.has_valid_hash());
        }
    }

    #[test]
    fn test_own_hash_is_not_hashed() {
        let mut block = sample_block();
        let original = block.calculate_hash();
        block.hash = "something else".to_string();

        assert_eq!(block.calculate_hash(), original);
    }
}
