use ftl_chain::ChainError;
use ftl_fabric::FabricError;
use ftl_tokens::TokenError;
use ftl_types::TypeError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("token ledger: {0}")]
    Token(#[from] TokenError),

    #[error("audit chain: {0}")]
    Chain(#[from] ChainError),

    #[error("event bus: {0}")]
    Fabric(#[from] FabricError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("audit record serialization: {0}")]
    AuditCodec(#[from] serde_json::Error),

    /// The mutation was applied, the audit append failed, and the mutation
    /// was reverted. Ledger state is as before the call.
    #[error("audit append failed, operation rolled back: {source}")]
    AuditFailed { source: ChainError },

    /// The audit append failed and reverting the mutation failed too. The
    /// token ledger now holds an unaudited change.
    #[error("audit append failed ({audit}) and rollback failed ({rollback})")]
    RollbackFailed {
        audit: ChainError,
        rollback: TokenError,
    },

    #[error("recorder guard poisoned")]
    GuardPoisoned,
}

impl RecorderError {
    /// Returns `true` if the caller's input was rejected before anything
    /// was mutated.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Token(TokenError::Validation(_))
        )
    }

    /// Returns `true` for balance, escrow or allowance underflow.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::Token(e) if e.is_insufficient_funds())
    }
}

impl From<TypeError> for RecorderError {
    fn from(error: TypeError) -> Self {
        Self::Validation(error.to_string())
    }
}

pub type RecorderResult<T> = Result<T, RecorderError>;
