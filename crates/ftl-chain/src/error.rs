use ftl_crypto::{LinkError, SealError};

/// Errors produced by chain operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    #[error("chain has no blocks; append needs a genesis block to link to")]
    Empty,

    #[error("sealing failed: {0}")]
    Seal(#[from] SealError),

    #[error("chain tip kept moving; gave up after {retries} reseals")]
    Contention { retries: u32 },

    #[error("integrity violation: {0}")]
    Integrity(#[from] LinkError),

    #[error("chain {0} lock poisoned")]
    LockPoisoned(&'static str),

    #[error("invalid chain configuration: {0}")]
    InvalidConfig(String),
}
