//! The protocol key derivation function.
//!
//! Extraction is HMAC-SHA512 keyed with the salt, expansion is the RFC 5869 HMAC-SHA256 chain keyed with the
//! extracted PRK. An empty salt behaves like 64 zero bytes. [`kdf_mod`] builds a uniform integer below a modulus
//! on top of it by rejection sampling.

use hkdf::Hkdf;
use num_bigint::BigUint;
use sha2::{Sha256, Sha512};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KdfError {
    #[error("Requested KDF output of {0} bytes exceeds the maximum expansion length")]
    OutputTooLong(usize),
    #[error("KDF modulus must be non-zero")]
    ZeroModulus,
    #[error("Rejection sampling below the modulus did not terminate")]
    SamplingExhausted,
}

pub fn kdf(output_len: usize, ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<Vec<u8>, KdfError> {
    let (prk, _) = Hkdf::<Sha512>::extract(Some(salt), ikm);
    // A 64-byte PRK is always accepted by the SHA-256 expander.
    let expander = Hkdf::<Sha256>::from_prk(&prk).map_err(|_| KdfError::OutputTooLong(output_len))?;
    let mut out = vec![0u8; output_len];
    expander.expand(info, &mut out).map_err(|_| KdfError::OutputTooLong(output_len))?;
    Ok(out)
}

/// [`kdf`] into a fixed-size array.
pub fn kdf_array<const N: usize>(ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<[u8; N], KdfError> {
    let (prk, _) = Hkdf::<Sha512>::extract(Some(salt), ikm);
    let expander = Hkdf::<Sha256>::from_prk(&prk).map_err(|_| KdfError::OutputTooLong(N))?;
    let mut out = [0u8; N];
    expander.expand(info, &mut out).map_err(|_| KdfError::OutputTooLong(N))?;
    Ok(out)
}

/// Derive an integer uniformly distributed in `[0, n)`.
///
/// Candidates of `bitlen(n)` bits are drawn with a big-endian 16-bit counter appended to `info` until one is
/// below `n`.
pub fn kdf_mod(n: &BigUint, ikm: &[u8], salt: &[u8], info: &[u8]) -> Result<BigUint, KdfError> {
    let nbits = n.bits() as usize;
    if nbits == 0 {
        return Err(KdfError::ZeroModulus);
    }
    let buflen = (nbits - 1) / 8 + 1;
    let shift = 8 - (buflen * 8 - nbits);
    let mask = ((1u16 << shift) - 1) as u8;
    let mut ctx = Vec::with_capacity(info.len() + 2);
    for counter in 0..=u16::MAX {
        ctx.clear();
        ctx.extend_from_slice(info);
        ctx.extend_from_slice(&counter.to_be_bytes());
        let mut buf = kdf(buflen, ikm, salt, &ctx)?;
        buf[0] &= mask;
        let r = BigUint::from_bytes_be(&buf);
        if &r < n {
            return Ok(r);
        }
    }
    Err(KdfError::SamplingExhausted)
}
