use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::hasher::{block_digest, BlockHeader, DIGEST_HEX_LEN};

/// Required number of leading `'0'` hex digits in a sealed block hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    /// Default difficulty: three leading zero hex digits.
    pub const DEFAULT: Self = Self(3);
    /// No proof of work at all.
    pub const NONE: Self = Self(0);
    /// A hex SHA-256 digest cannot have more zeros than characters.
    pub const MAX: u8 = DIGEST_HEX_LEN as u8;

    pub fn new(zeros: u8) -> Result<Self, SealError> {
        if zeros > Self::MAX {
            return Err(SealError::InvalidDifficulty(zeros));
        }
        Ok(Self(zeros))
    }

    /// Number of leading zero hex digits required.
    pub fn zeros(&self) -> usize {
        self.0 as usize
    }

    /// Returns `true` if `hash` starts with the required number of `'0'`s.
    pub fn is_met_by(&self, hash: &str) -> bool {
        let zeros = self.zeros();
        hash.len() >= zeros && hash.as_bytes()[..zeros].iter().all(|b| *b == b'0')
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = SealError;

    fn try_from(zeros: u8) -> Result<Self, Self::Error> {
        Self::new(zeros)
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

impl fmt::Debug for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Difficulty({})", self.0)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cooperative cancellation flag shared between a sealer and its owner.
///
/// Clones share the same flag. Once cancelled a token stays cancelled.
/// A token built with [`CancelToken::linked_with`] also observes the flags of
/// both tokens it was linked from.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    own: Arc<AtomicBool>,
    linked: Vec<Arc<AtomicBool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh token that is cancelled whenever `self` or `other` is.
    pub fn linked_with(&self, other: &CancelToken) -> CancelToken {
        let mut linked = Vec::with_capacity(2 + self.linked.len() + other.linked.len());
        linked.push(Arc::clone(&self.own));
        linked.extend(self.linked.iter().cloned());
        linked.push(Arc::clone(&other.own));
        linked.extend(other.linked.iter().cloned());
        CancelToken {
            own: Arc::new(AtomicBool::new(false)),
            linked,
        }
    }

    pub fn cancel(&self) {
        self.own.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.own.load(Ordering::Relaxed)
            || self.linked.iter().any(|flag| flag.load(Ordering::Relaxed))
    }
}

/// A successful proof-of-work search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Seal {
    pub nonce: u64,
    pub hash: String,
    /// Number of digests computed, including the winning one.
    pub attempts: u64,
}

/// Errors from sealing.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum SealError {
    #[error("difficulty {0} exceeds the 64 hex digits of a digest")]
    InvalidDifficulty(u8),

    #[error("sealing cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("no seal found within {attempts} attempts")]
    AttemptsExhausted { attempts: u64 },

    #[error("nonce space exhausted")]
    NonceSpaceExhausted,
}

/// Brute-force nonce search under a difficulty target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sealer {
    difficulty: Difficulty,
    max_attempts: Option<u64>,
}

impl Sealer {
    /// A sealer with no attempt bound; only cancellation stops it early.
    pub fn new(difficulty: Difficulty) -> Self {
        Self {
            difficulty,
            max_attempts: None,
        }
    }

    /// Bound the search to at most `max_attempts` digests.
    pub fn with_max_attempts(mut self, max_attempts: Option<u64>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Search nonces upward from 0 until the digest meets the difficulty.
    ///
    /// The header's own nonce is ignored. The token is polled before every
    /// attempt, so a cancelled token stops the search promptly.
    pub fn seal(&self, header: &BlockHeader<'_>, cancel: &CancelToken) -> Result<Seal, SealError> {
        let mut nonce: u64 = 0;
        let mut attempts: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SealError::Cancelled { attempts });
            }
            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    return Err(SealError::AttemptsExhausted { attempts });
                }
            }

            let hash = block_digest(&header.with_nonce(nonce));
            attempts += 1;
            if self.difficulty.is_met_by(&hash) {
                return Ok(Seal {
                    nonce,
                    hash,
                    attempts,
                });
            }

            nonce = nonce.checked_add(1).ok_or(SealError::NonceSpaceExhausted)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftl_types::Timestamp;

    fn header() -> BlockHeader<'static> {
        BlockHeader {
            index: 1,
            timestamp: Timestamp::from_unix_ms(1_700_000_000_000),
            payload: "{\"op\":\"mint\",\"amount\":1000}",
            prev_hash: "000abc",
            nonce: 0,
        }
    }

    #[test]
    fn difficulty_prefix_check() {
        let d = Difficulty::new(3).unwrap();
        assert!(d.is_met_by("000f"));
        assert!(d.is_met_by("0000"));
        assert!(!d.is_met_by("00f0"));
        assert!(!d.is_met_by("00"));
        assert!(Difficulty::NONE.is_met_by(""));
    }

    #[test]
    fn difficulty_bounds() {
        assert!(Difficulty::new(64).is_ok());
        assert_eq!(
            Difficulty::new(65).unwrap_err(),
            SealError::InvalidDifficulty(65)
        );
        assert_eq!(Difficulty::default(), Difficulty::DEFAULT);
        assert_eq!(Difficulty::DEFAULT.zeros(), 3);
    }

    #[test]
    fn seal_meets_difficulty_and_reproduces() {
        let sealer = Sealer::new(Difficulty::DEFAULT);
        let seal = sealer.seal(&header(), &CancelToken::new()).unwrap();
        assert!(seal.hash.starts_with("000"));
        assert_eq!(seal.attempts, seal.nonce + 1);
        assert_eq!(block_digest(&header().with_nonce(seal.nonce)), seal.hash);
    }

    #[test]
    fn seal_is_deterministic() {
        let sealer = Sealer::new(Difficulty::new(2).unwrap());
        let a = sealer.seal(&header(), &CancelToken::new()).unwrap();
        let b = sealer.seal(&header(), &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_difficulty_takes_first_nonce() {
        let seal = Sealer::new(Difficulty::NONE)
            .seal(&header().with_nonce(99), &CancelToken::new())
            .unwrap();
        assert_eq!(seal.nonce, 0);
        assert_eq!(seal.attempts, 1);
    }

    #[test]
    fn cancelled_token_stops_search() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Sealer::new(Difficulty::MAX.try_into().unwrap())
            .seal(&header(), &cancel)
            .unwrap_err();
        assert_eq!(err, SealError::Cancelled { attempts: 0 });
    }

    #[test]
    fn cancel_from_another_thread() {
        let cancel = CancelToken::new();
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            Sealer::new(Difficulty::new(64).unwrap()).seal(&header(), &remote)
        });
        std::thread::sleep(std::time::Duration::from_millis(20));
        cancel.cancel();
        let result = handle.join().unwrap();
        assert!(matches!(result, Err(SealError::Cancelled { .. })));
    }

    #[test]
    fn linked_token_observes_both_sources() {
        let chain_wide = CancelToken::new();
        let per_call = CancelToken::new();
        let linked = chain_wide.linked_with(&per_call);
        assert!(!linked.is_cancelled());

        per_call.cancel();
        assert!(linked.is_cancelled());
        assert!(!chain_wide.is_cancelled());

        let other = CancelToken::new().linked_with(&chain_wide);
        chain_wide.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn cancelling_linked_token_leaves_sources_alone() {
        let a = CancelToken::new();
        let b = CancelToken::new();
        let linked = a.linked_with(&b);
        linked.cancel();
        assert!(linked.is_cancelled());
        assert!(!a.is_cancelled());
        assert!(!b.is_cancelled());
    }

    #[test]
    fn attempt_bound_is_enforced() {
        let err = Sealer::new(Difficulty::new(64).unwrap())
            .with_max_attempts(Some(10))
            .seal(&header(), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err, SealError::AttemptsExhausted { attempts: 10 });
    }

    #[test]
    fn difficulty_serde_rejects_out_of_range() {
        let ok: Difficulty = serde_json::from_str("4").unwrap();
        assert_eq!(ok.zeros(), 4);
        assert!(serde_json::from_str::<Difficulty>("65").is_err());
    }
}
