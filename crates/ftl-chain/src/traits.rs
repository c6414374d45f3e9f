use ftl_crypto::CancelToken;

use crate::block::{Block, BlockRef};
use crate::error::ChainError;

/// Write boundary for audit chain append operations.
pub trait ChainWriter: Send + Sync {
    /// Mine a new block carrying `payload` and link it onto the tip.
    fn append(&self, payload: &str) -> Result<BlockRef, ChainError>;

    /// Like [`ChainWriter::append`], but the search also stops when `cancel`
    /// is cancelled.
    fn append_with_cancel(
        &self,
        payload: &str,
        cancel: &CancelToken,
    ) -> Result<BlockRef, ChainError>;
}

/// Read boundary for audit chain queries.
pub trait ChainReader: Send + Sync {
    /// Owned copy of every block, in order. Never observes a partial append.
    fn snapshot(&self) -> Result<Vec<Block>, ChainError>;

    fn len(&self) -> Result<u64, ChainError>;

    fn tip(&self) -> Result<Option<BlockRef>, ChainError>;

    fn get(&self, index: u64) -> Result<Option<Block>, ChainError>;
}
