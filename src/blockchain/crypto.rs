use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Sender address used by system-issued mining rewards
pub const REWARD_SENDER: &str = "0";

/// Errors that can occur while handling addresses and digests
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),
}

/// Represents an account address
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates an address from anything string-like
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }

    /// The sentinel sender of reward transactions
    pub fn reward_sender() -> Self {
        Address(REWARD_SENDER.to_string())
    }

    /// Checks if this is the reward sentinel
    pub fn is_reward_sender(&self) -> bool {
        self.0 == REWARD_SENDER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CryptoError::InvalidAddress(s.to_string()));
        }

        Ok(Address(trimmed.to_string()))
    }
}

/// Decides whether an address is well formed.
///
/// The ledger consults its validator for both parties of every submitted
/// transaction. Closures of the form `Fn(&Address) -> bool` implement it too.
pub trait AddressValidator: Send + Sync {
    fn is_valid_address(&self, address: &Address) -> bool;
}

/// Validator that accepts every address
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllAddresses;

impl AddressValidator for AcceptAllAddresses {
    fn is_valid_address(&self, _address: &Address) -> bool {
        true
    }
}

impl<F> AddressValidator for F
where
    F: Fn(&Address) -> bool + Send + Sync,
{
    fn is_valid_address(&self, address: &Address) -> bool {
        self(address)
    }
}

/// SHA-256 of `data` as a lowercase hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}
