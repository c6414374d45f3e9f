use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, info_span, warn, Span};

use ftl_crypto::{BlockHeader, CancelToken, Difficulty, HashChainVerifier, Sealer};
use ftl_types::{Clock, SystemClock};

use crate::block::{Block, BlockRef};
use crate::config::{ChainConfig, SealMode};
use crate::error::ChainError;
use crate::traits::{ChainReader, ChainWriter};

/// In-memory audit chain: an append-only sequence of sealed blocks.
///
/// Always holds a genesis block after construction. Appends mine a new
/// block against the tip; reads take a shared lock and return copies.
pub struct Chain {
    config: ChainConfig,
    sealer: Sealer,
    clock: Arc<dyn Clock>,
    cancel: CancelToken,
    span: Span,
    inner: RwLock<ChainState>,
}

#[derive(Default)]
struct ChainState {
    blocks: Vec<Block>,
}

impl Chain {
    /// A chain with the default configuration (difficulty 3) and the
    /// system clock.
    pub fn new() -> Self {
        Self::build(ChainConfig::default(), Arc::new(SystemClock))
    }

    /// A chain with an explicit configuration and clock.
    pub fn with_config(config: ChainConfig, clock: Arc<dyn Clock>) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    /// Log chain activity under `span` instead of the default `chain` span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    fn build(config: ChainConfig, clock: Arc<dyn Clock>) -> Self {
        let sealer = Sealer::new(config.difficulty).with_max_attempts(config.max_seal_attempts);
        let genesis = Block::genesis(clock.now());
        let span = info_span!("chain", difficulty = config.difficulty.zeros());

        span.in_scope(|| info!(hash = %genesis.hash, "genesis block created"));

        Self {
            config,
            sealer,
            clock,
            cancel: CancelToken::new(),
            span,
            inner: RwLock::new(ChainState {
                blocks: vec![genesis],
            }),
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn difficulty(&self) -> Difficulty {
        self.config.difficulty
    }

    /// Clock used to stamp new blocks.
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Chain-wide cancellation token.
    ///
    /// Cancelling it aborts any in-flight seal and makes every later append
    /// fail with a cancelled seal error. Intended for shutdown.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Verify links, digests, difficulty and indices of the whole chain.
    pub fn validate(&self) -> Result<(), ChainError> {
        let blocks = self.snapshot()?;
        HashChainVerifier::verify_chain(&blocks, self.config.difficulty)?;
        Ok(())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, ChainState>, ChainError> {
        self.inner
            .read()
            .map_err(|_| ChainError::LockPoisoned("read"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, ChainState>, ChainError> {
        self.inner
            .write()
            .map_err(|_| ChainError::LockPoisoned("write"))
    }

    /// Build the successor of `tip` carrying `payload` and mine it.
    fn seal_successor(
        &self,
        tip: &Block,
        payload: &str,
        cancel: &CancelToken,
    ) -> Result<Block, ChainError> {
        let index = tip.index + 1;
        // Never let block time run backwards, even if the clock does.
        let timestamp = self.clock.now().max(tip.timestamp);
        let header = BlockHeader {
            index,
            timestamp,
            payload,
            prev_hash: &tip.hash,
            nonce: 0,
        };

        let seal = self.sealer.seal(&header, cancel)?;
        debug!(index, nonce = seal.nonce, attempts = seal.attempts, "block sealed");

        Ok(Block {
            index,
            timestamp,
            payload: payload.to_string(),
            prev_hash: tip.hash.clone(),
            hash: seal.hash,
            nonce: seal.nonce,
        })
    }

    fn append_locked(&self, payload: &str, cancel: &CancelToken) -> Result<BlockRef, ChainError> {
        let mut state = self.write_state()?;
        let tip = state.blocks.last().ok_or(ChainError::Empty)?;
        let block = self.seal_successor(tip, payload, cancel)?;
        let block_ref = BlockRef::from(&block);
        state.blocks.push(block);
        Ok(block_ref)
    }

    fn append_optimistic(
        &self,
        payload: &str,
        cancel: &CancelToken,
        max_retries: u32,
    ) -> Result<BlockRef, ChainError> {
        for attempt in 0..=max_retries {
            let tip = self
                .read_state()?
                .blocks
                .last()
                .cloned()
                .ok_or(ChainError::Empty)?;

            let block = self.seal_successor(&tip, payload, cancel)?;

            let mut state = self.write_state()?;
            let current = state.blocks.last().ok_or(ChainError::Empty)?;
            if current.hash == tip.hash {
                let block_ref = BlockRef::from(&block);
                state.blocks.push(block);
                return Ok(block_ref);
            }
            debug!(attempt, "tip moved while sealing; resealing on new tip");
        }

        warn!(max_retries, "giving up on optimistic append");
        Err(ChainError::Contention {
            retries: max_retries,
        })
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl ChainWriter for Chain {
    fn append(&self, payload: &str) -> Result<BlockRef, ChainError> {
        self.append_with_cancel(payload, &CancelToken::new())
    }

    fn append_with_cancel(
        &self,
        payload: &str,
        cancel: &CancelToken,
    ) -> Result<BlockRef, ChainError> {
        let _enter = self.span.enter();
        let cancel = self.cancel.linked_with(cancel);

        let result = match self.config.seal_mode {
            SealMode::Locked => self.append_locked(payload, &cancel),
            SealMode::Optimistic { max_retries } => {
                self.append_optimistic(payload, &cancel, max_retries)
            }
        };

        match &result {
            Ok(block) => info!(index = block.index, hash = %block.hash, "block appended"),
            Err(error) => warn!(%error, "append failed"),
        }
        result
    }
}

impl ChainReader for Chain {
    fn snapshot(&self) -> Result<Vec<Block>, ChainError> {
        Ok(self.read_state()?.blocks.clone())
    }

    fn len(&self) -> Result<u64, ChainError> {
        Ok(self.read_state()?.blocks.len() as u64)
    }

    fn tip(&self) -> Result<Option<BlockRef>, ChainError> {
        Ok(self.read_state()?.blocks.last().map(BlockRef::from))
    }

    fn get(&self, index: u64) -> Result<Option<Block>, ChainError> {
        let state = self.read_state()?;
        Ok(usize::try_from(index)
            .ok()
            .and_then(|i| state.blocks.get(i))
            .cloned())
    }
}
