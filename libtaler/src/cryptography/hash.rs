//! SHA-512 hashing and the hash-code types built on it.

use crate::helpers::fixed_bytes;
use sha2::{Digest, Sha512};

fixed_bytes! {
    /// A full 512-bit SHA-512 digest.
    pub struct HashCode(64);
}

fixed_bytes! {
    /// The leading 256 bits of a SHA-512 digest.
    pub struct ShortHashCode(32);
}

pub fn hash(data: &[u8]) -> HashCode {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    HashCode::from_bytes(out)
}

/// SHA-512 truncated to its first 32 bytes.
pub fn hash_truncate32(data: &[u8]) -> ShortHashCode {
    let digest = Sha512::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    ShortHashCode::from_bytes(out)
}

/// SHA-512 of a string with its terminating NUL byte, the way C-side peers hash strings.
pub fn hash_string(s: &str) -> HashCode {
    let mut ctx = HashContext::new();
    ctx.update(s.as_bytes()).update(&[0u8]);
    ctx.finish()
}

/// Incremental SHA-512. Feeding the same bytes in any chunking gives the same result as [`hash`].
#[derive(Clone, Default)]
pub struct HashContext {
    hasher: Sha512,
}

impl HashContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.hasher.update(data);
        self
    }

    pub fn finish(self) -> HashCode {
        let digest = self.hasher.finalize();
        let mut out = [0u8; 64];
        out.copy_from_slice(&digest);
        HashCode::from_bytes(out)
    }
}
