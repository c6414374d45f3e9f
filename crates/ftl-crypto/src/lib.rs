//! Cryptographic primitives for the Freight Token Ledger.
//!
//! Provides the canonical SHA-256 block digest, the proof-of-work sealer
//! (nonce search under a leading-zero difficulty target, with cooperative
//! cancellation), and hash chain verification.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod chain;
pub mod hasher;
pub mod pow;

pub use chain::{HashChainVerifier, LinkError, SealedRecord};
pub use hasher::{block_digest, BlockHeader, DIGEST_HEX_LEN};
pub use pow::{CancelToken, Difficulty, Seal, SealError, Sealer};
