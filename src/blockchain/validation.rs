use thiserror::Error;

use super::block::Block;
use super::pow::ProofOfWork;

/// Why a block failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// The chain has no blocks at all
    EmptyChain,
    /// The first block does not have genesis shape
    InvalidGenesis,
    /// The stored hash does not match the block's content
    HashMismatch,
    /// `previous_hash` does not match the predecessor's hash
    BrokenLink,
    /// The index is not the predecessor's index plus one
    IndexGap,
    /// The nonce does not solve the puzzle posed by the predecessor's proof
    InvalidProofOfWork,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            ViolationKind::EmptyChain => "chain is empty",
            ViolationKind::InvalidGenesis => "invalid genesis block",
            ViolationKind::HashMismatch => "stored hash does not match content",
            ViolationKind::BrokenLink => "previous hash does not match predecessor",
            ViolationKind::IndexGap => "index does not follow predecessor",
            ViolationKind::InvalidProofOfWork => "invalid proof of work",
        };
        f.write_str(reason)
    }
}

/// First integrity failure found while walking a chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Chain integrity violation at block {index}: {reason}")]
pub struct IntegrityViolation {
    /// Index of the offending block
    pub index: u64,
    pub reason: ViolationKind,
}

impl IntegrityViolation {
    fn at(block: &Block, reason: ViolationKind) -> Self {
        IntegrityViolation {
            index: block.index,
            reason,
        }
    }
}

/// Walks `blocks` from genesis to tip and reports the first violation.
///
/// Each block must carry its own content hash. For every adjacent pair the
/// later block must link to the earlier one's hash, follow its index, and
/// carry a nonce/proof that solves the puzzle posed by the earlier block's
/// proof at the later block's difficulty. The walk is read-only.
pub fn validate_blocks(blocks: &[Block]) -> Result<(), IntegrityViolation> {
    let genesis = blocks.first().ok_or(IntegrityViolation {
        index: 0,
        reason: ViolationKind::EmptyChain,
    })?;

    if !genesis.is_genesis() {
        return Err(IntegrityViolation::at(genesis, ViolationKind::InvalidGenesis));
    }
    if !genesis.has_valid_hash() {
        return Err(IntegrityViolation::at(genesis, ViolationKind::HashMismatch));
    }

    for pair in blocks.windows(2) {
        validate_link(&pair[0], &pair[1])?;
    }

    Ok(())
}

/// Checks that `next` is a well-formed successor of `current`
pub fn validate_link(current: &Block, next: &Block) -> Result<(), IntegrityViolation> {
    if !next.has_valid_hash() {
        return Err(IntegrityViolation::at(next, ViolationKind::HashMismatch));
    }
    if next.previous_hash != current.hash {
        return Err(IntegrityViolation::at(next, ViolationKind::BrokenLink));
    }
    if next.index != current.index + 1 {
        return Err(IntegrityViolation::at(next, ViolationKind::IndexGap));
    }
    if !ProofOfWork::verify(current.proof, next.difficulty, next.nonce, next.proof) {
        return Err(IntegrityViolation::at(next, ViolationKind::InvalidProofOfWork));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::Address;
    use crate::blockchain::pow::CancelToken;
    use crate::blockchain::transaction::Transaction;

    fn extend(chain: &mut Vec<Block>, difficulty: u32) {
        let tip = chain.last().unwrap();
        let solution = ProofOfWork::solve(tip.proof, difficulty, &CancelToken::new()).unwrap();
        let block = Block::new(
            tip.index + 1,
            vec![Transaction::new_reward(Address::new("miner"), 50.0)],
            solution.proof,
            solution.nonce,
            difficulty,
            tip.hash.clone(),
        );
        chain.push(block);
    }

    fn valid_chain(length: usize) -> Vec<Block> {
        let mut chain = vec![Block::genesis()];
        while chain.len() < length {
            extend(&mut chain, 1);
        }
        chain
    }

    #[test]
    fn test_valid_chain() {
        assert_eq!(validate_blocks(&valid_chain(1)), Ok(()));
        assert_eq!(validate_blocks(&valid_chain(4)), Ok(()));
    }

    #[test]
    fn test_empty_chain() {
        let err = validate_blocks(&[]).unwrap_err();
        assert_eq!(err.reason, ViolationKind::EmptyChain);
    }

    #[test]
    fn test_bad_genesis() {
        let mut chain = valid_chain(1);
        chain[0].previous_hash = "1".to_string();

        let err = validate_blocks(&chain).unwrap_err();
        assert_eq!(err, IntegrityViolation { index: 1, reason: ViolationKind::InvalidGenesis });
    }

    #[test]
    fn test_rehashed_genesis_fields() {
        let forgeries: Vec<Box<dyn Fn(&mut Block)>> = vec![
            Box::new(|b: &mut Block| b.proof = 999_999),
            Box::new(|b: &mut Block| b.nonce = 42),
            Box::new(|b: &mut Block| b.difficulty = 7),
            Box::new(|b: &mut Block| b.index = 0),
        ];

        for forge in forgeries {
            let mut genesis = Block::genesis();
            forge(&mut genesis);
            genesis.hash = genesis.calculate_hash();

            let mut chain = vec![genesis];
            extend(&mut chain, 1);

            let err = validate_blocks(&chain).unwrap_err();
            assert_eq!(err.reason, ViolationKind::InvalidGenesis);
            assert_eq!(err.index, chain[0].index);
        }
    }

    #[test]
    fn test_rehashed_broken_link() {
        let mut chain = valid_chain(3);
        chain[2].previous_hash = "f".repeat(64);
        chain[2].hash = chain[2].calculate_hash();

        let err = validate_blocks(&chain).unwrap_err();
        assert_eq!(err, IntegrityViolation { index: 3, reason: ViolationKind::BrokenLink });
    }

    #[test]
    fn test_rehashed_index_gap() {
        let mut chain = valid_chain(2);
        chain[1].index = 5;
        chain[1].hash = chain[1].calculate_hash();

        let err = validate_blocks(&chain).unwrap_err();
        assert_eq!(err, IntegrityViolation { index: 5, reason: ViolationKind::IndexGap });
    }

    #[test]
    fn test_rehashed_bad_proof() {
        let mut chain = valid_chain(2);
        chain[1].proof = chain[1].proof.wrapping_add(1);
        chain[1].hash = chain[1].calculate_hash();

        let err = validate_blocks(&chain).unwrap_err();
        assert_eq!(err, IntegrityViolation { index: 2, reason: ViolationKind::InvalidProofOfWork });
    }

    #[test]
    fn test_tampered_transactions() {
        let mut chain = valid_chain(4);
        chain[2].transactions[0].amount = 1_000_000.0;

        let err = validate_blocks(&chain).unwrap_err();
        assert_eq!(err, IntegrityViolation { index: 3, reason: ViolationKind::HashMismatch });
    }
}
