use crate::hasher::{block_digest, BlockHeader};
use crate::pow::Difficulty;

/// Trait for records that participate in a sealed hash chain.
pub trait SealedRecord {
    /// The record's hashed fields.
    fn header(&self) -> BlockHeader<'_>;
    /// The record's stored hash.
    fn stored_hash(&self) -> &str;
}

/// Hash chain integrity verifier.
///
/// Verifies that a sequence of sealed records forms a valid chain:
/// each record's prev_hash matches the previous record's hash, each hash is
/// correctly computed from the record's fields, and every record after the
/// genesis meets the proof-of-work difficulty.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain of records, stopping at the first problem.
    ///
    /// Checks:
    /// 1. Each record's index equals its position
    /// 2. Genesis has an empty prev_hash (and is exempt from proof of work)
    /// 3. Each subsequent prev_hash matches the previous stored hash
    /// 4. Each stored hash is the digest of the record's fields
    /// 5. Each non-genesis hash meets the difficulty
    pub fn verify_chain(
        records: &[impl SealedRecord],
        difficulty: Difficulty,
    ) -> Result<(), LinkError> {
        for position in 0..records.len() {
            Self::verify_record(records, position, difficulty)?;
        }
        Ok(())
    }

    /// Check the record at `position` against its predecessor in `records`.
    pub fn verify_record<R: SealedRecord>(
        records: &[R],
        position: usize,
        difficulty: Difficulty,
    ) -> Result<(), LinkError> {
        let record = records.get(position).ok_or(LinkError::OutOfRange {
            position,
            len: records.len(),
        })?;
        let header = record.header();
        if header.index != position as u64 {
            return Err(LinkError::IndexGap {
                position,
                found: header.index,
            });
        }

        if position == 0 {
            if !header.prev_hash.is_empty() {
                return Err(LinkError::GenesisHasPrevHash);
            }
        } else if header.prev_hash != records[position - 1].stored_hash() {
            return Err(LinkError::BrokenLink { index: position });
        }

        if Self::compute_hash(&header) != record.stored_hash() {
            return Err(LinkError::HashMismatch { index: position });
        }

        if position > 0 && !difficulty.is_met_by(record.stored_hash()) {
            return Err(LinkError::DifficultyNotMet {
                index: position,
                difficulty: difficulty.zeros(),
            });
        }

        Ok(())
    }

    /// Compute the expected hash for a record header.
    pub fn compute_hash(header: &BlockHeader<'_>) -> String {
        block_digest(header)
    }
}

/// Errors from chain verification.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("genesis block has a previous hash (should be empty)")]
    GenesisHasPrevHash,

    #[error("index gap at position {position}: block claims index {found}")]
    IndexGap { position: usize, found: u64 },

    #[error("broken link at index {index}: prev_hash does not match")]
    BrokenLink { index: usize },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: usize },

    #[error("hash at index {index} lacks {difficulty} leading zero digits")]
    DifficultyNotMet { index: usize, difficulty: usize },

    #[error("no record at position {position}; chain holds {len}")]
    OutOfRange { position: usize, len: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::{CancelToken, Sealer};
    use ftl_types::Timestamp;

    /// Test record for chain verification.
    struct TestRecord {
        index: u64,
        payload: String,
        prev: String,
        hash: String,
        nonce: u64,
    }

    impl SealedRecord for TestRecord {
        fn header(&self) -> BlockHeader<'_> {
            BlockHeader {
                index: self.index,
                timestamp: Timestamp::from_unix_ms(1_000 + self.index),
                payload: &self.payload,
                prev_hash: &self.prev,
                nonce: self.nonce,
            }
        }

        fn stored_hash(&self) -> &str {
            &self.hash
        }
    }

    fn build_chain(count: usize, difficulty: Difficulty) -> Vec<TestRecord> {
        let sealer = Sealer::new(difficulty);
        let mut chain: Vec<TestRecord> = Vec::new();

        for i in 0..count {
            let mut record = TestRecord {
                index: i as u64,
                payload: format!("record-{i}"),
                prev: chain.last().map(|r| r.hash.clone()).unwrap_or_default(),
                hash: String::new(),
                nonce: 0,
            };
            if i == 0 {
                record.hash = HashChainVerifier::compute_hash(&record.header());
            } else {
                let seal = sealer.seal(&record.header(), &CancelToken::new()).unwrap();
                record.nonce = seal.nonce;
                record.hash = seal.hash;
            }
            chain.push(record);
        }

        chain
    }

    fn two() -> Difficulty {
        Difficulty::new(2).unwrap()
    }

    #[test]
    fn empty_chain_is_valid() {
        let chain: Vec<TestRecord> = vec![];
        assert!(HashChainVerifier::verify_chain(&chain, two()).is_ok());
    }

    #[test]
    fn sealed_chain_is_valid() {
        let chain = build_chain(6, two());
        assert!(HashChainVerifier::verify_chain(&chain, two()).is_ok());
    }

    #[test]
    fn genesis_is_exempt_from_difficulty() {
        let chain = build_chain(1, two());
        assert!(HashChainVerifier::verify_chain(&chain, Difficulty::new(64).unwrap()).is_ok());
    }

    #[test]
    fn genesis_with_prev_hash_fails() {
        let mut chain = build_chain(1, two());
        chain[0].prev = "00ff".into();
        let err = HashChainVerifier::verify_chain(&chain, two()).unwrap_err();
        assert_eq!(err, LinkError::GenesisHasPrevHash);
    }

    #[test]
    fn broken_link_detected() {
        let mut chain = build_chain(3, two());
        chain[2].prev = "00deadbeef".into();
        let err = HashChainVerifier::verify_chain(&chain, two()).unwrap_err();
        assert_eq!(err, LinkError::BrokenLink { index: 2 });
    }

    #[test]
    fn tampered_payload_detected() {
        let mut chain = build_chain(3, two());
        chain[1].payload = "tampered".into();
        let err = HashChainVerifier::verify_chain(&chain, two()).unwrap_err();
        assert_eq!(err, LinkError::HashMismatch { index: 1 });
    }

    #[test]
    fn unsealed_block_detected() {
        let mut chain = build_chain(2, Difficulty::NONE);
        // Force a hash that is correct but does not meet a higher target.
        while chain[1].hash.starts_with("00") {
            chain[1].nonce += 1;
            chain[1].hash = HashChainVerifier::compute_hash(&chain[1].header());
        }
        let err = HashChainVerifier::verify_chain(&chain, two()).unwrap_err();
        assert_eq!(
            err,
            LinkError::DifficultyNotMet {
                index: 1,
                difficulty: 2
            }
        );
    }

    #[test]
    fn position_past_the_end_is_an_error() {
        let empty: Vec<TestRecord> = vec![];
        assert_eq!(
            HashChainVerifier::verify_record(&empty, 0, two()).unwrap_err(),
            LinkError::OutOfRange {
                position: 0,
                len: 0
            }
        );

        let chain = build_chain(2, two());
        assert!(HashChainVerifier::verify_record(&chain, 1, two()).is_ok());
        assert_eq!(
            HashChainVerifier::verify_record(&chain, 2, two()).unwrap_err(),
            LinkError::OutOfRange {
                position: 2,
                len: 2
            }
        );
    }

    #[test]
    fn index_gap_detected() {
        let mut chain = build_chain(3, two());
        chain.remove(1);
        let err = HashChainVerifier::verify_chain(&chain, two()).unwrap_err();
        assert_eq!(
            err,
            LinkError::IndexGap {
                position: 1,
                found: 2
            }
        );
    }
}
