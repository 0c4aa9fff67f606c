//! A single-process proof-of-work ledger.
//!
//! - [`blockchain`] - blocks, proof of work, balances, validation and fork resolution
//! - [`config`] - configuration loaded from `config.toml`

#![forbid(unsafe_code)]

pub mod blockchain;
pub mod config;
