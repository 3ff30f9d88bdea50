//! Denomination keys, coin envelopes and the signatures that travel between wallet and exchange.
//!
//! Every type here is tagged by cipher. On the wire the tag is the `"cipher"` field (`"RSA"` or `"CS"`); in hashed
//! data it is a `u32` (1 and 2 respectively). Combining values of different ciphers is always an error.

use crate::age_restriction::{AgeCommitmentHash, AgeMask, AgeRestrictionError};
use crate::cryptography::cs::{cs_verify, CsBranch, CsNonce, CsPublicKey, CsRPublic, CsScalar, CsSignature};
use crate::cryptography::hash::{HashCode, HashContext};
use crate::cryptography::keys::EddsaPublicKey;
use crate::cryptography::rsa::{rsa_verify, RsaPublicKey};
use crate::error::CryptoError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DenomKeyType {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "CS")]
    ClauseSchnorr,
}

impl DenomKeyType {
    /// The integer tag used when the cipher is hashed.
    pub fn tag(&self) -> u32 {
        match self {
            Self::Rsa => 1,
            Self::ClauseSchnorr => 2,
        }
    }
}

impl Display for DenomKeyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rsa => f.write_str("RSA"),
            Self::ClauseSchnorr => f.write_str("CS"),
        }
    }
}

/// A denomination public key. An `age_mask` of zero means the denomination does not support age restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cipher")]
pub enum DenominationPubKey {
    #[serde(rename = "RSA")]
    Rsa {
        rsa_public_key: RsaPublicKey,
        #[serde(default)]
        age_mask: u32,
    },
    #[serde(rename = "CS")]
    ClauseSchnorr {
        cs_public_key: CsPublicKey,
        #[serde(default)]
        age_mask: u32,
    },
}

impl DenominationPubKey {
    pub fn cipher(&self) -> DenomKeyType {
        match self {
            Self::Rsa { .. } => DenomKeyType::Rsa,
            Self::ClauseSchnorr { .. } => DenomKeyType::ClauseSchnorr,
        }
    }

    pub fn age_mask_bits(&self) -> u32 {
        match self {
            Self::Rsa { age_mask, .. } | Self::ClauseSchnorr { age_mask, .. } => *age_mask,
        }
    }

    /// The validated age mask, or `None` if the denomination does not support age restriction.
    pub fn age_mask(&self) -> Result<Option<AgeMask>, AgeRestrictionError> {
        match self.age_mask_bits() {
            0 => Ok(None),
            bits => AgeMask::new(bits).map(Some),
        }
    }

    pub fn rsa_key(&self) -> Result<&RsaPublicKey, CryptoError> {
        match self {
            Self::Rsa { rsa_public_key, .. } => Ok(rsa_public_key),
            _ => Err(CryptoError::CipherMismatch { expected: DenomKeyType::Rsa, actual: self.cipher() }),
        }
    }

    pub fn hash(&self) -> HashCode {
        hash_denom_pub(self)
    }
}

/// SHA-512 over `age_mask: u32 BE || cipher tag: u32 BE || key bytes`.
pub fn hash_denom_pub(denom_pub: &DenominationPubKey) -> HashCode {
    let mut ctx = HashContext::new();
    ctx.update(&denom_pub.age_mask_bits().to_be_bytes());
    ctx.update(&denom_pub.cipher().tag().to_be_bytes());
    match denom_pub {
        DenominationPubKey::Rsa { rsa_public_key, .. } => ctx.update(&rsa_public_key.encode()),
        DenominationPubKey::ClauseSchnorr { cs_public_key, .. } => ctx.update(cs_public_key.as_bytes()),
    };
    ctx.finish()
}

/// SHA-512 of the coin public key, followed by the age commitment hash if the coin carries one.
pub fn hash_coin_pub(coin_pub: &EddsaPublicKey, age_commitment_hash: Option<&AgeCommitmentHash>) -> HashCode {
    let mut ctx = HashContext::new();
    ctx.update(coin_pub.as_bytes());
    if let Some(ach) = age_commitment_hash {
        ctx.update(ach.as_bytes());
    }
    ctx.finish()
}

/// The blinded coin a wallet asks the exchange to sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cipher")]
pub enum CoinEnvelope {
    #[serde(rename = "RSA")]
    Rsa {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        rsa_blinded_planchet: Vec<u8>,
    },
    #[serde(rename = "CS")]
    ClauseSchnorr { cs_nonce: CsNonce, cs_blinded_c0: CsScalar, cs_blinded_c1: CsScalar },
}

impl CoinEnvelope {
    pub fn cipher(&self) -> DenomKeyType {
        match self {
            Self::Rsa { .. } => DenomKeyType::Rsa,
            Self::ClauseSchnorr { .. } => DenomKeyType::ClauseSchnorr,
        }
    }
}

/// Feed `cipher tag: u32 BE || envelope body` into a running hash. The refresh session hash is built from this.
pub fn hash_coin_ev_inner(envelope: &CoinEnvelope, ctx: &mut HashContext) {
    ctx.update(&envelope.cipher().tag().to_be_bytes());
    match envelope {
        CoinEnvelope::Rsa { rsa_blinded_planchet } => {
            ctx.update(rsa_blinded_planchet);
        }
        CoinEnvelope::ClauseSchnorr { cs_nonce, cs_blinded_c0, cs_blinded_c1 } => {
            ctx.update(cs_blinded_c0.as_bytes()).update(cs_blinded_c1.as_bytes()).update(cs_nonce.as_bytes());
        }
    }
}

/// The envelope hash the exchange signs over: `SHA-512(denom_pub_hash || tag || body)`.
pub fn hash_coin_ev(envelope: &CoinEnvelope, denom_pub_hash: &HashCode) -> HashCode {
    let mut ctx = HashContext::new();
    ctx.update(denom_pub_hash.as_bytes());
    hash_coin_ev_inner(envelope, &mut ctx);
    ctx.finish()
}

/// What the exchange returns for a [`CoinEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cipher")]
pub enum BlindedDenominationSignature {
    #[serde(rename = "RSA")]
    Rsa {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        blinded_rsa_signature: Vec<u8>,
    },
    #[serde(rename = "CS")]
    ClauseSchnorr { b: CsBranch, s: CsScalar },
}

impl BlindedDenominationSignature {
    pub fn cipher(&self) -> DenomKeyType {
        match self {
            Self::Rsa { .. } => DenomKeyType::Rsa,
            Self::ClauseSchnorr { .. } => DenomKeyType::ClauseSchnorr,
        }
    }
}

/// The exchange's signature on a coin, after unblinding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cipher")]
pub enum UnblindedSignature {
    #[serde(rename = "RSA")]
    Rsa {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        rsa_signature: Vec<u8>,
    },
    #[serde(rename = "CS")]
    ClauseSchnorr { cs_signature_r: CsRPublic, cs_signature_s: CsScalar },
}

impl UnblindedSignature {
    pub fn cipher(&self) -> DenomKeyType {
        match self {
            Self::Rsa { .. } => DenomKeyType::Rsa,
            Self::ClauseSchnorr { .. } => DenomKeyType::ClauseSchnorr,
        }
    }
}

impl From<CsSignature> for UnblindedSignature {
    fn from(sig: CsSignature) -> Self {
        Self::ClauseSchnorr { cs_signature_r: sig.r_pub, cs_signature_s: sig.s }
    }
}

/// The values an exchange contributes to a withdrawal before the wallet can blind. Only CS needs any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cipher")]
pub enum ExchangeWithdrawValues {
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "CS")]
    ClauseSchnorr { r_pub_0: CsRPublic, r_pub_1: CsRPublic },
}

/// Check the exchange's signature on a coin.
///
/// Returns `Ok(false)` for a signature that does not verify and an error when the signature and key ciphers
/// differ or the RSA key is malicious.
pub fn verify_denomination_signature(
    coin_pub: &EddsaPublicKey,
    age_commitment_hash: Option<&AgeCommitmentHash>,
    sig: &UnblindedSignature,
    denom_pub: &DenominationPubKey,
) -> Result<bool, CryptoError> {
    let hm = hash_coin_pub(coin_pub, age_commitment_hash);
    match (sig, denom_pub) {
        (UnblindedSignature::Rsa { rsa_signature }, DenominationPubKey::Rsa { rsa_public_key, .. }) => {
            Ok(rsa_verify(hm.as_bytes(), rsa_signature, rsa_public_key)?)
        }
        (
            UnblindedSignature::ClauseSchnorr { cs_signature_r, cs_signature_s },
            DenominationPubKey::ClauseSchnorr { cs_public_key, .. },
        ) => {
            let sig = CsSignature { r_pub: *cs_signature_r, s: *cs_signature_s };
            Ok(cs_verify(hm.as_bytes(), &sig, cs_public_key)?)
        }
        _ => Err(CryptoError::CipherMismatch { expected: denom_pub.cipher(), actual: sig.cipher() }),
    }
}
