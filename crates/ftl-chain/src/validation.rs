use ftl_crypto::{Difficulty, HashChainVerifier, LinkError};

use crate::error::ChainError;
use crate::traits::ChainReader;

/// Result of chain validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub block_count: u64,
    pub difficulty: Difficulty,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if all checks passed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// A specific integrity violation detected during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Position of the offending block in the snapshot.
    pub position: u64,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViolationKind {
    MissingGenesis,
    IndexGap,
    GenesisHasPrevHash,
    HashChainBreak,
    HashMismatch,
    DifficultyNotMet,
}

impl From<&LinkError> for ViolationKind {
    fn from(error: &LinkError) -> Self {
        match error {
            LinkError::GenesisHasPrevHash => Self::GenesisHasPrevHash,
            LinkError::IndexGap { .. } | LinkError::OutOfRange { .. } => Self::IndexGap,
            LinkError::BrokenLink { .. } => Self::HashChainBreak,
            LinkError::HashMismatch { .. } => Self::HashMismatch,
            LinkError::DifficultyNotMet { .. } => Self::DifficultyNotMet,
        }
    }
}

/// Chain integrity validator.
///
/// Unlike [`HashChainVerifier::verify_chain`], which stops at the first
/// problem, the validator checks every block and reports each one that
/// fails.
pub struct ChainValidator;

impl ChainValidator {
    pub fn validate<R: ChainReader + ?Sized>(
        reader: &R,
        difficulty: Difficulty,
    ) -> Result<ValidationReport, ChainError> {
        let blocks = reader.snapshot()?;
        let mut violations = Vec::new();

        if blocks.is_empty() {
            violations.push(Violation {
                position: 0,
                kind: ViolationKind::MissingGenesis,
                description: "chain has no genesis block".into(),
            });
        }

        for position in 0..blocks.len() {
            if let Err(error) = HashChainVerifier::verify_record(&blocks, position, difficulty) {
                violations.push(Violation {
                    position: position as u64,
                    kind: ViolationKind::from(&error),
                    description: error.to_string(),
                });
            }
        }

        Ok(ValidationReport {
            block_count: blocks.len() as u64,
            difficulty,
            violations,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ftl_types::{ManualClock, Timestamp};

    use crate::block::Block;
    use crate::config::ChainConfig;
    use crate::memory::Chain;
    use crate::traits::ChainWriter;

    use super::*;

    /// Reader over a fixed list of blocks, for feeding in broken chains.
    struct FixedReader(Vec<Block>);

    impl ChainReader for FixedReader {
        fn snapshot(&self) -> Result<Vec<Block>, ChainError> {
            Ok(self.0.clone())
        }
        fn len(&self) -> Result<u64, ChainError> {
            Ok(self.0.len() as u64)
        }
        fn tip(&self) -> Result<Option<crate::BlockRef>, ChainError> {
            Ok(self.0.last().map(crate::BlockRef::from))
        }
        fn get(&self, index: u64) -> Result<Option<Block>, ChainError> {
            Ok(self.0.get(index as usize).cloned())
        }
    }

    fn sealed_blocks(count: usize) -> Vec<Block> {
        let chain = Chain::with_config(
            ChainConfig::with_difficulty(Difficulty::new(2).unwrap()),
            Arc::new(ManualClock::new(Timestamp::from_unix_ms(1_000))),
        )
        .unwrap();
        for i in 1..count {
            chain.append(&format!("event-{i}")).unwrap();
        }
        chain.snapshot().unwrap()
    }

    #[test]
    fn valid_chain_passes() {
        let chain = Chain::new();
        chain.append("a").unwrap();
        chain.append("b").unwrap();

        let report = ChainValidator::validate(&chain, chain.difficulty()).unwrap();
        assert!(report.is_valid());
        assert_eq!(report.block_count, 3);
    }

    #[test]
    fn reports_every_broken_block() {
        let mut blocks = sealed_blocks(5);
        blocks[1].payload = "forged".into();
        blocks[3].prev_hash = "00ab".into();

        let report =
            ChainValidator::validate(&FixedReader(blocks), Difficulty::new(2).unwrap()).unwrap();
        assert!(!report.is_valid());
        let kinds: Vec<_> = report.violations.iter().map(|v| (v.position, v.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                (1, ViolationKind::HashMismatch),
                (3, ViolationKind::HashChainBreak),
            ]
        );
    }

    #[test]
    fn higher_difficulty_flags_weak_blocks() {
        let blocks = sealed_blocks(3);
        let report =
            ChainValidator::validate(&FixedReader(blocks), Difficulty::new(64).unwrap()).unwrap();
        assert_eq!(report.violations.len(), 2);
        assert!(report
            .violations
            .iter()
            .all(|v| v.kind == ViolationKind::DifficultyNotMet));
    }

    #[test]
    fn empty_chain_lacks_genesis() {
        let report = ChainValidator::validate(&FixedReader(vec![]), Difficulty::DEFAULT).unwrap();
        assert_eq!(report.violations[0].kind, ViolationKind::MissingGenesis);
    }
}
