//! Clause-Schnorr blind signatures over Ed25519.
//!
//! The exchange commits to two nonces `R0, R1`. The wallet blinds both, derives one challenge per nonce and sends
//! the blinded pair. The exchange picks a branch `b` and answers only that one; the wallet unblinds the answer into
//! an ordinary Schnorr signature `(R'_b, s)` that verifies as `s·G == R'_b + c_b·P`.

use crate::cryptography::hash::hash;
use crate::cryptography::kdf::{kdf, kdf_array, kdf_mod, KdfError};
use crate::cryptography::keys::{EddsaPrivateKey, KeyError};
use crate::helpers::{fixed_bytes, secret_bytes};
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::Scalar;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// The order of the prime-order subgroup, big-endian.
const GROUP_ORDER_BE: [u8; 32] = [
    0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x14, 0xde, 0xf9,
    0xde, 0xa2, 0xf7, 0x9c, 0xd6, 0x58, 0x12, 0x63, 0x1a, 0x5c, 0xf5, 0xd3, 0xed,
];

const FDH_INFO: &[u8] = b"Curve25519FDH";
const SECRETS_SALT: &[u8] = b"alphabeta";
const BSEED_SALT: &[u8] = b"b-seed";

secret_bytes! {
    /// The exchange's Clause-Schnorr signing scalar.
    pub struct CsPrivateKey(32);
}

fixed_bytes! {
    /// A Clause-Schnorr denomination public key, `P = x·G`.
    pub struct CsPublicKey(32);
}

secret_bytes! {
    /// One of the exchange's per-withdrawal nonce scalars `r_0`, `r_1`.
    pub struct CsRSecret(32);
}

fixed_bytes! {
    /// A public nonce point `R = r·G`.
    pub struct CsRPublic(32);
}

fixed_bytes! {
    /// The withdraw or refresh nonce that lets the exchange re-derive its `R` pair.
    pub struct CsNonce(32);
}

fixed_bytes! {
    /// A scalar modulo the group order in little-endian form. Used for challenges and signature `s` values.
    pub struct CsScalar(32);
}

secret_bytes! {
    /// The seed all blinding secrets of one CS planchet are derived from.
    pub struct CsBlindingSeed(32);
}

/// Which of the two nonces the exchange chose to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum CsBranch {
    Zero,
    One,
}

impl CsBranch {
    pub fn index(&self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

impl TryFrom<u32> for CsBranch {
    type Error = String;

    fn try_from(b: u32) -> Result<Self, Self::Error> {
        match b {
            0 => Ok(Self::Zero),
            1 => Ok(Self::One),
            other => Err(format!("CS branch must be 0 or 1, got {other}")),
        }
    }
}

impl From<CsBranch> for u32 {
    fn from(b: CsBranch) -> Self {
        b.index() as u32
    }
}

/// The exchange's answer for the chosen branch: `s_blind = r_b + c'_b·x`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsBlindSignature {
    pub b: CsBranch,
    pub s: CsScalar,
}

/// An unblinded Clause-Schnorr signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsSignature {
    pub r_pub: CsRPublic,
    pub s: CsScalar,
}

/// The four blinding scalars derived from a [`CsBlindingSeed`], each clamped.
pub struct CsBlindingSecrets {
    pub alpha: [Zeroizing<[u8; 32]>; 2],
    pub beta: [Zeroizing<[u8; 32]>; 2],
}

impl CsScalar {
    fn from_scalar(s: &Scalar) -> Self {
        Self::from_bytes(s.to_bytes())
    }

    fn to_scalar(self) -> Scalar {
        Scalar::from_bytes_mod_order(self.to_bytes())
    }
}

fn clamp(bytes: &mut [u8; 32]) {
    bytes[0] &= 248;
    bytes[31] &= 127;
    bytes[31] |= 64;
}

fn decompress(bytes: &[u8; 32]) -> Result<EdwardsPoint, KeyError> {
    CompressedEdwardsY(*bytes).decompress().ok_or(KeyError::InvalidPoint)
}

impl CsPrivateKey {
    pub fn public_key(&self) -> CsPublicKey {
        let x = Zeroizing::new(Scalar::from_bytes_mod_order(*self.as_bytes()));
        CsPublicKey::from_bytes((&*x * ED25519_BASEPOINT_TABLE).compress().to_bytes())
    }
}

impl CsRSecret {
    pub fn public_key(&self) -> CsRPublic {
        let r = Zeroizing::new(Scalar::from_bytes_mod_order(*self.as_bytes()));
        CsRPublic::from_bytes((&*r * ED25519_BASEPOINT_TABLE).compress().to_bytes())
    }
}

/// Derive the blinding seed of a planchet from its coin private key and the exchange's `R` pair.
pub fn derive_bseed(coin_priv: &EddsaPrivateKey, r_pub: &[CsRPublic; 2]) -> Result<CsBlindingSeed, KdfError> {
    let mut info = [0u8; 64];
    info[..32].copy_from_slice(r_pub[0].as_bytes());
    info[32..].copy_from_slice(r_pub[1].as_bytes());
    let seed = Zeroizing::new(kdf_array::<32>(coin_priv.as_bytes(), BSEED_SALT, &info)?);
    Ok(CsBlindingSeed::from_bytes(*seed))
}

/// Expand a blinding seed into `alpha_0, beta_0, alpha_1, beta_1`.
pub fn derive_blinding_secrets(bseed: &CsBlindingSeed) -> Result<CsBlindingSecrets, KdfError> {
    let out = Zeroizing::new(kdf(128, bseed.as_bytes(), SECRETS_SALT, &[])?);
    let take = |i: usize| {
        let mut s = Zeroizing::new([0u8; 32]);
        s.copy_from_slice(&out[i * 32..(i + 1) * 32]);
        clamp(&mut s);
        s
    };
    Ok(CsBlindingSecrets { alpha: [take(0), take(2)], beta: [take(1), take(3)] })
}

/// Blind both nonces: `R'_i = R_i + alpha_i·G + beta_i·P`.
pub fn calc_r_blind(
    cs_pub: &CsPublicKey,
    secrets: &CsBlindingSecrets,
    r_pub: &[CsRPublic; 2],
) -> Result<[CsRPublic; 2], KeyError> {
    let p = decompress(cs_pub.as_bytes())?;
    let blind = |i: usize| -> Result<CsRPublic, KeyError> {
        let r = decompress(r_pub[i].as_bytes())?;
        let alpha = Scalar::from_bytes_mod_order(*secrets.alpha[i]);
        let beta = Scalar::from_bytes_mod_order(*secrets.beta[i]);
        let r_blind = r + &alpha * ED25519_BASEPOINT_TABLE + beta * p;
        Ok(CsRPublic::from_bytes(r_blind.compress().to_bytes()))
    };
    Ok([blind(0)?, blind(1)?])
}

/// Hash `R || hm` onto a scalar below the group order, keyed by the denomination key.
pub fn cs_fdh(hm: &[u8], r_pub: &CsRPublic, cs_pub: &CsPublicKey) -> Result<CsScalar, KdfError> {
    let mut pre = Vec::with_capacity(32 + hm.len());
    pre.extend_from_slice(r_pub.as_bytes());
    pre.extend_from_slice(hm);
    let prehash = hash(&pre);
    let l = BigUint::from_bytes_be(&GROUP_ORDER_BE);
    let c = kdf_mod(&l, prehash.as_bytes(), cs_pub.as_bytes(), FDH_INFO)?;
    // c < L, so its little-endian form never exceeds 32 bytes.
    let mut out = [0u8; 32];
    for (dst, src) in out.iter_mut().zip(c.to_bytes_le()) {
        *dst = src;
    }
    Ok(CsScalar::from_bytes(out))
}

/// Produce the blinded challenge pair `c'_i = FDH(R'_i, hm) + beta_i` sent to the exchange.
pub fn cs_blind(
    bseed: &CsBlindingSeed,
    r_pub: &[CsRPublic; 2],
    cs_pub: &CsPublicKey,
    hm: &[u8],
) -> Result<[CsScalar; 2], CsError> {
    let secrets = derive_blinding_secrets(bseed)?;
    let r_blind = calc_r_blind(cs_pub, &secrets, r_pub)?;
    let mut out = [CsScalar::zeroed(); 2];
    for i in 0..2 {
        let c = cs_fdh(hm, &r_blind[i], cs_pub)?.to_scalar();
        let beta = Scalar::from_bytes_mod_order(*secrets.beta[i]);
        out[i] = CsScalar::from_scalar(&(c + beta));
    }
    Ok(out)
}

/// The exchange side of signing one branch: `s = r_b + c_b·x`.
pub fn cs_sign_blinded(r_secret: &CsRSecret, c_blind: &CsScalar, cs_priv: &CsPrivateKey) -> CsScalar {
    let r = Zeroizing::new(Scalar::from_bytes_mod_order(*r_secret.as_bytes()));
    let x = Zeroizing::new(Scalar::from_bytes_mod_order(*cs_priv.as_bytes()));
    CsScalar::from_scalar(&(*r + c_blind.to_scalar() * *x))
}

/// Turn the exchange's answer into a signature: `s = s_blind + alpha_b`, `R = R'_b`.
pub fn cs_unblind(
    bseed: &CsBlindingSeed,
    r_pub: &[CsRPublic; 2],
    cs_pub: &CsPublicKey,
    blind_sig: &CsBlindSignature,
) -> Result<CsSignature, CsError> {
    let secrets = derive_blinding_secrets(bseed)?;
    let r_blind = calc_r_blind(cs_pub, &secrets, r_pub)?;
    let b = blind_sig.b.index();
    let alpha = Scalar::from_bytes_mod_order(*secrets.alpha[b]);
    let s = blind_sig.s.to_scalar() + alpha;
    Ok(CsSignature { r_pub: r_blind[b], s: CsScalar::from_scalar(&s) })
}

/// Check `s·G == R + FDH(R, hm)·P`. Points that do not decode fail verification.
pub fn cs_verify(hm: &[u8], sig: &CsSignature, cs_pub: &CsPublicKey) -> Result<bool, KdfError> {
    let (Ok(r), Ok(p)) = (decompress(sig.r_pub.as_bytes()), decompress(cs_pub.as_bytes())) else {
        return Ok(false);
    };
    let c = cs_fdh(hm, &sig.r_pub, cs_pub)?.to_scalar();
    let lhs = &sig.s.to_scalar() * ED25519_BASEPOINT_TABLE;
    let rhs = r + c * p;
    Ok(lhs.compress() == rhs.compress())
}

/// Errors from the CS blinding steps.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CsError {
    #[error(transparent)]
    Kdf(#[from] KdfError),
    #[error(transparent)]
    Key(#[from] KeyError),
}
