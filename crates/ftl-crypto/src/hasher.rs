use sha2::{Digest, Sha256};

use ftl_types::Timestamp;

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LEN: usize = 64;

const BLOCK_DOMAIN: &[u8] = b"ftl-block-v1:";

/// The hashed fields of a block, borrowed from wherever they live.
///
/// `hash` itself is not part of the header: it is the output of
/// [`block_digest`] over these fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader<'a> {
    pub index: u64,
    pub timestamp: Timestamp,
    pub payload: &'a str,
    pub prev_hash: &'a str,
    pub nonce: u64,
}

impl BlockHeader<'_> {
    /// Canonical byte encoding of the header.
    ///
    /// Integers are fixed-width big-endian; the two strings are prefixed with
    /// their byte length so that no two distinct headers share an encoding.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(
            BLOCK_DOMAIN.len() + 8 * 5 + self.payload.len() + self.prev_hash.len(),
        );
        bytes.extend_from_slice(BLOCK_DOMAIN);
        bytes.extend_from_slice(&self.index.to_be_bytes());
        bytes.extend_from_slice(&self.timestamp.to_be_bytes());
        bytes.extend_from_slice(&(self.payload.len() as u64).to_be_bytes());
        bytes.extend_from_slice(self.payload.as_bytes());
        bytes.extend_from_slice(&(self.prev_hash.len() as u64).to_be_bytes());
        bytes.extend_from_slice(self.prev_hash.as_bytes());
        bytes.extend_from_slice(&self.nonce.to_be_bytes());
        bytes
    }

    /// Copy of this header with a different nonce.
    pub fn with_nonce(&self, nonce: u64) -> Self {
        Self { nonce, ..*self }
    }
}

/// Lowercase hex SHA-256 digest of a block header.
pub fn block_digest(header: &BlockHeader<'_>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(header.canonical_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn header<'a>(payload: &'a str, prev_hash: &'a str) -> BlockHeader<'a> {
        BlockHeader {
            index: 1,
            timestamp: Timestamp::from_unix_ms(1_700_000_000_000),
            payload,
            prev_hash,
            nonce: 0,
        }
    }

    #[test]
    fn digest_is_deterministic_hex() {
        let h = header("{\"op\":\"mint\"}", "abc");
        let d1 = block_digest(&h);
        let d2 = block_digest(&h);
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), DIGEST_HEX_LEN);
        assert!(d1.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
    }

    #[test]
    fn every_field_changes_the_digest() {
        let base = header("payload", "prev");
        let d = block_digest(&base);
        assert_ne!(d, block_digest(&BlockHeader { index: 2, ..base }));
        assert_ne!(
            d,
            block_digest(&BlockHeader {
                timestamp: Timestamp::from_unix_ms(1),
                ..base
            })
        );
        assert_ne!(d, block_digest(&header("payloae", "prev")));
        assert_ne!(d, block_digest(&header("payload", "prew")));
        assert_ne!(d, block_digest(&base.with_nonce(1)));
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        // Moving bytes between payload and prev_hash must not collide.
        let a = block_digest(&header("ab", "c"));
        let b = block_digest(&header("a", "bc"));
        assert_ne!(a, b);
    }

    #[test]
    fn large_integers_encode_distinctly() {
        // Values past the Unicode scalar range must still hash distinctly.
        let base = header("p", "q");
        let big = block_digest(&base.with_nonce(0x11_0000));
        let bigger = block_digest(&base.with_nonce(0x11_0001));
        let huge = block_digest(&base.with_nonce(u64::MAX));
        assert_ne!(big, bigger);
        assert_ne!(bigger, huge);
    }

    #[test]
    fn canonical_bytes_layout() {
        let h = BlockHeader {
            index: 7,
            timestamp: Timestamp::from_unix_ms(9),
            payload: "xy",
            prev_hash: "",
            nonce: 3,
        };
        let bytes = h.canonical_bytes();
        let body = &bytes[BLOCK_DOMAIN.len()..];
        assert_eq!(&body[0..8], &7u64.to_be_bytes());
        assert_eq!(&body[8..16], &9u64.to_be_bytes());
        assert_eq!(&body[16..24], &2u64.to_be_bytes());
        assert_eq!(&body[24..26], b"xy");
        assert_eq!(&body[26..34], &0u64.to_be_bytes());
        assert_eq!(&body[34..42], &3u64.to_be_bytes());
        assert_eq!(body.len(), 42);
    }

    proptest! {
        #[test]
        fn distinct_nonces_give_distinct_digests(a in any::<u64>(), b in any::<u64>()) {
            prop_assume!(a != b);
            let base = header("payload", "prev");
            prop_assert_ne!(block_digest(&base.with_nonce(a)), block_digest(&base.with_nonce(b)));
        }
    }
}
