//! Append-only audit chain for the Freight Token Ledger (FTL).
//!
//! This crate provides:
//! - The sealed, hash-linked [`Block`] type
//! - `ChainWriter` / `ChainReader` trait boundaries
//! - The in-memory [`Chain`], which mines every appended block under a
//!   proof-of-work difficulty target
//! - Chain validation (hash links, digests, difficulty, index continuity)

pub mod block;
pub mod config;
pub mod error;
pub mod memory;
pub mod traits;
pub mod validation;

pub use block::{Block, BlockRef};
pub use config::{ChainConfig, SealMode};
pub use error::ChainError;
pub use memory::Chain;
pub use traits::{ChainReader, ChainWriter};
pub use validation::{ChainValidator, ValidationReport, Violation, ViolationKind};

pub use ftl_crypto::{CancelToken, Difficulty};
