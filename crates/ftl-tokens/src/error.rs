use ftl_types::{Amount, ParticipantId, TokenId};

/// Errors produced by token ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("insufficient funds: {participant} has {available} {token} available, needs {required}")]
    InsufficientFunds {
        participant: ParticipantId,
        token: TokenId,
        available: Amount,
        required: Amount,
    },

    #[error("insufficient escrow: {participant} has {locked} {token} locked, needs {required}")]
    InsufficientEscrow {
        participant: ParticipantId,
        token: TokenId,
        locked: Amount,
        required: Amount,
    },

    #[error(
        "insufficient allowance: {spender} may move {allowance} {token} for {owner}, needs {required}"
    )]
    InsufficientAllowance {
        owner: ParticipantId,
        spender: ParticipantId,
        token: TokenId,
        allowance: Amount,
        required: Amount,
    },

    #[error("{token} {what} would overflow")]
    Overflow { token: TokenId, what: &'static str },

    #[error("token ledger {0} lock poisoned")]
    LockPoisoned(&'static str),
}

impl TokenError {
    /// Returns `true` for every underflow case: balance, escrow or allowance.
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. }
                | Self::InsufficientEscrow { .. }
                | Self::InsufficientAllowance { .. }
        )
    }

    pub(crate) fn overflow(token: &TokenId, what: &'static str) -> Self {
        Self::Overflow {
            token: token.clone(),
            what,
        }
    }
}
