use serde::{Deserialize, Serialize};

use ftl_crypto::{block_digest, BlockHeader, SealedRecord};
use ftl_types::Timestamp;

/// One sealed, hash-linked record of the audit chain.
///
/// A block is immutable once appended: the chain only ever hands out
/// copies, so editing a returned block never affects the chain itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; the genesis block is index 0.
    pub index: u64,
    pub timestamp: Timestamp,
    /// Opaque serialized event (JSON audit records in practice).
    pub payload: String,
    /// Hex digest of the predecessor; empty for the genesis block.
    pub prev_hash: String,
    /// Hex digest of this block's own fields.
    pub hash: String,
    /// Nonce found by the proof-of-work search.
    pub nonce: u64,
}

impl Block {
    /// Build the genesis block: empty payload, no predecessor, nonce 0.
    ///
    /// The genesis hash is computed but not mined.
    pub fn genesis(timestamp: Timestamp) -> Self {
        let mut block = Self {
            index: 0,
            timestamp,
            payload: String::new(),
            prev_hash: String::new(),
            hash: String::new(),
            nonce: 0,
        };
        block.hash = block.compute_hash();
        block
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    /// The hashed fields of this block.
    pub fn header(&self) -> BlockHeader<'_> {
        BlockHeader {
            index: self.index,
            timestamp: self.timestamp,
            payload: &self.payload,
            prev_hash: &self.prev_hash,
            nonce: self.nonce,
        }
    }

    /// Recompute the digest from the block's fields.
    pub fn compute_hash(&self) -> String {
        block_digest(&self.header())
    }

    /// Returns `true` if the stored hash matches the block's fields.
    pub fn verify_hash(&self) -> bool {
        self.compute_hash() == self.hash
    }
}

impl SealedRecord for Block {
    fn header(&self) -> BlockHeader<'_> {
        Block::header(self)
    }

    fn stored_hash(&self) -> &str {
        &self.hash
    }
}

/// Lightweight reference to an appended block.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub index: u64,
    pub hash: String,
}

impl From<&Block> for BlockRef {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index,
            hash: block.hash.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_shape() {
        let genesis = Block::genesis(Timestamp::from_unix_ms(42));
        assert_eq!(genesis.index, 0);
        assert!(genesis.payload.is_empty());
        assert!(genesis.prev_hash.is_empty());
        assert_eq!(genesis.nonce, 0);
        assert!(genesis.is_genesis());
        assert!(genesis.verify_hash());
    }

    #[test]
    fn tampering_breaks_hash() {
        let mut genesis = Block::genesis(Timestamp::from_unix_ms(42));
        genesis.payload = "rewritten".into();
        assert!(!genesis.verify_hash());
    }

    #[test]
    fn serde_roundtrip() {
        let genesis = Block::genesis(Timestamp::from_unix_ms(7));
        let json = serde_json::to_string(&genesis).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(genesis, decoded);
        assert!(decoded.verify_hash());
    }

    #[test]
    fn block_ref_from_block() {
        let genesis = Block::genesis(Timestamp::zero());
        let r = BlockRef::from(&genesis);
        assert_eq!(r.index, 0);
        assert_eq!(r.hash, genesis.hash);
    }
}
