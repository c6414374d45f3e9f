use serde::{Deserialize, Serialize};

use ftl_crypto::Difficulty;

use crate::error::ChainError;

/// Where the proof-of-work search runs relative to the chain's write lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SealMode {
    /// Mine while holding the exclusive lock. Readers and writers wait for
    /// the whole search; negligible at low difficulty.
    #[default]
    Locked,
    /// Mine with no lock held, then re-check the tip under the write lock.
    /// If another append won the race the block is rebuilt on the new tip
    /// and mined again, at most `max_retries` times.
    Optimistic { max_retries: u32 },
}

/// Configuration for a [`Chain`](crate::Chain).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero hex digits required of every non-genesis block hash.
    pub difficulty: Difficulty,
    /// Upper bound on digests computed per seal; `None` searches until found
    /// or cancelled.
    pub max_seal_attempts: Option<u64>,
    pub seal_mode: SealMode,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::DEFAULT,
            max_seal_attempts: None,
            seal_mode: SealMode::Locked,
        }
    }
}

impl ChainConfig {
    /// Configuration with a given difficulty and defaults otherwise.
    pub fn with_difficulty(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.max_seal_attempts == Some(0) {
            return Err(ChainError::InvalidConfig(
                "max_seal_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
