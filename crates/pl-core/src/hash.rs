//! Content hashing primitives.
//!
//! Two hashes with distinct jobs: a fast non-cryptographic 128-bit
//! fingerprint for chunk identity and dedup, and a SHA-256 digest for
//! integrity verification of transferred content. Both are streaming so
//! files larger than a read buffer hash identically to one-shot input.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::hash::Hasher;
use twox_hash::xxh3::{hash128, Hash128, HasherExt};

/// Fast non-cryptographic 128-bit content hash used for identity/dedup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentFingerprint(pub u128);

impl std::fmt::Display for ContentFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Cryptographic 256-bit hash used for integrity verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(pub [u8; 32]);

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Streaming xxh3-128 fingerprint hasher.
///
/// Feeding data incrementally produces the same value as hashing the
/// whole input at once. Content-only: no path, no timestamp.
#[derive(Default)]
pub struct Fingerprinter {
    inner: Hash128,
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.write(bytes);
    }

    pub fn finish(&self) -> ContentFingerprint {
        ContentFingerprint(self.inner.finish_ext())
    }
}

/// Streaming SHA-256 digest.
#[derive(Default)]
pub struct Digester {
    inner: Sha256,
}

impl Digester {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn finish(self) -> ContentDigest {
        ContentDigest(self.inner.finalize().into())
    }
}

/// One-shot fingerprint of a byte slice.
pub fn fingerprint(bytes: &[u8]) -> ContentFingerprint {
    ContentFingerprint(hash128(bytes))
}

/// One-shot SHA-256 digest of a byte slice.
pub fn digest256(bytes: &[u8]) -> ContentDigest {
    ContentDigest(Sha256::digest(bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_streaming_equals_one_shot() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let whole = fingerprint(&data);

        // Any chunked split must produce the identical value.
        for split in [1usize, 7, 64, 1024, 4096] {
            let mut hasher = Fingerprinter::new();
            for chunk in data.chunks(split) {
                hasher.update(chunk);
            }
            assert_eq!(hasher.finish(), whole, "split size {split}");
        }
    }

    #[test]
    fn test_digest_streaming_equals_one_shot() {
        let data = vec![0xabu8; 5000];
        let whole = digest256(&data);

        let mut digester = Digester::new();
        for chunk in data.chunks(333) {
            digester.update(chunk);
        }
        assert_eq!(digester.finish(), whole);
    }

    #[test]
    fn test_fingerprint_is_content_only() {
        assert_eq!(fingerprint(b"same bytes"), fingerprint(b"same bytes"));
        assert_ne!(fingerprint(b"same bytes"), fingerprint(b"other bytes"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(fingerprint(&[]), Fingerprinter::new().finish());
        assert_eq!(digest256(&[]), Digester::new().finish());
    }

    #[test]
    fn test_display_width() {
        assert_eq!(fingerprint(b"x").to_string().len(), 32);
        assert_eq!(digest256(b"x").to_string().len(), 64);
    }
}
