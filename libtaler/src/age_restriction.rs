//! Age restriction commitments.
//!
//! A denomination that supports age restriction carries an [`AgeMask`]: bit 0 is always set and every further set
//! bit `n` marks an age group boundary at `n` years. A coin minted under such a denomination commits to one
//! Edx25519 public key per boundary. The holder keeps the private keys only for the groups at or below the age they
//! committed to, so they can later attest "I am at least `n`" for any boundary they hold a key for, and nothing
//! more.
//!
//! Because Edx25519 keys can be re-derived under a salt, a commitment survives a refresh: the new coins carry the
//! salted commitment, which proves the same age bound without being linkable to the old one.

use crate::cryptography::edx25519::{EdxPrivateKey, EdxPublicKey, EdxSignature};
use crate::cryptography::hash::{HashContext, ShortHashCode};
use crate::cryptography::kdf::{kdf_array, KdfError};
use crate::cryptography::keys::KeyError;
use crate::cryptography::purpose::{build_sig_ps, SignaturePurpose};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The age that unlocks every group of any mask. Used for coins that carry a commitment but no restriction.
pub const AGE_UNRESTRICTED: u32 = 32;

const SEEDED_KEY_INFO: &[u8] = b"age-commitment";
const SEEDED_FACTOR_INFO: &[u8] = b"age-factor";

/// Public base key for groups above the committed age in a seeded commitment. Nobody knows its discrete log, so
/// keys derived from it cannot be used to attest.
const PUBLISHED_BASE_KEY: EdxPublicKey = EdxPublicKey::from_bytes([
    0x64, 0x41, 0xb9, 0xbd, 0xbf, 0x14, 0x39, 0x8e, 0x46, 0xeb, 0x5c, 0x1d, 0x34, 0xd3, 0x9b, 0x2f, 0x9b, 0x7d, 0xc8,
    0x18, 0xeb, 0x9c, 0x09, 0xfb, 0x43, 0xad, 0x16, 0x64, 0xbc, 0x18, 0x49, 0xb5,
]);

/// The 32-byte hash of an age commitment's public keys.
pub type AgeCommitmentHash = ShortHashCode;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AgeRestrictionError {
    #[error("Age mask {0:#x} is invalid. Bit 0 must be set")]
    InvalidMask(u32),
    #[error("Invalid age group boundary {0}. Boundaries must lie in 1..32")]
    InvalidGroupBoundary(u32),
    #[error("Age group {group} must be attested, but the proof only holds {held} private keys")]
    MissingPrivateKey { group: usize, held: usize },
    #[error("Could not derive an age commitment key: {0}")]
    Key(#[from] KeyError),
}

impl From<KdfError> for AgeRestrictionError {
    fn from(e: KdfError) -> Self {
        Self::Key(KeyError::from(e))
    }
}

/// A validated age mask. Bit 0 is always set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct AgeMask(u32);

impl AgeMask {
    pub fn new(bits: u32) -> Result<Self, AgeRestrictionError> {
        if bits & 1 != 1 {
            return Err(AgeRestrictionError::InvalidMask(bits));
        }
        Ok(Self(bits))
    }

    /// Build a mask from a list of group boundaries, e.g. `[8, 10, 12, 14, 16, 18, 21]`.
    pub fn from_groups(groups: &[u32]) -> Result<Self, AgeRestrictionError> {
        let mut bits = 1u32;
        for &g in groups {
            if g == 0 || g >= 32 {
                return Err(AgeRestrictionError::InvalidGroupBoundary(g));
            }
            bits |= 1 << g;
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for AgeMask {
    type Error = AgeRestrictionError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        Self::new(bits)
    }
}

impl From<AgeMask> for u32 {
    fn from(mask: AgeMask) -> Self {
        mask.0
    }
}

/// The number of age groups, including the unrestricted group 0.
pub fn count_age_groups(mask: AgeMask) -> usize {
    mask.0.count_ones() as usize
}

/// The group boundaries (in years) the mask defines, in ascending order.
pub fn get_age_groups_from_mask(mask: AgeMask) -> Vec<u32> {
    (1..32).filter(|age| mask.0 & (1 << age) != 0).collect()
}

/// The index of the group `age` falls into: the number of boundaries at or below `age`.
///
/// Group 0 needs no attestation. Group `i > 0` is attested with the key at index `i - 1`.
pub fn get_age_group_index(mask: AgeMask, age: u32) -> usize {
    let mut index = 0;
    let mut m = mask.0;
    let mut a = age;
    while m > 0 && a > 0 {
        m >>= 1;
        index += (m & 1) as usize;
        a -= 1;
    }
    index
}

/// The public half of an age commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeCommitment {
    pub mask: AgeMask,
    pub public_keys: Vec<EdxPublicKey>,
}

impl AgeCommitment {
    pub fn hash(&self) -> AgeCommitmentHash {
        hash_commitment(self)
    }
}

/// The private keys for the groups at or below the committed age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeProof {
    pub private_keys: Vec<EdxPrivateKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeCommitmentProof {
    pub commitment: AgeCommitment,
    pub proof: AgeProof,
}

/// The first 32 bytes of SHA-512 over the concatenated public keys.
pub fn hash_commitment(commitment: &AgeCommitment) -> AgeCommitmentHash {
    let mut ctx = HashContext::new();
    for key in &commitment.public_keys {
        ctx.update(key.as_bytes());
    }
    let digest = ctx.finish();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest.as_bytes()[..32]);
    AgeCommitmentHash::from_bytes(out)
}

/// Commit to `age` under `mask` with freshly generated keys.
pub fn restriction_commit(mask: AgeMask, age: u32) -> AgeCommitmentProof {
    let num_pubs = count_age_groups(mask) - 1;
    let num_privs = get_age_group_index(mask, age);
    let mut public_keys = Vec::with_capacity(num_pubs);
    let mut private_keys = Vec::with_capacity(num_privs);
    for i in 0..num_pubs {
        let private = EdxPrivateKey::generate();
        public_keys.push(private.public_key());
        if i < num_privs {
            private_keys.push(private);
        }
    }
    trace!("Committed to age group {num_privs} of {num_pubs}");
    AgeCommitmentProof { commitment: AgeCommitment { mask, public_keys }, proof: AgeProof { private_keys } }
}

/// Commit to `age` under `mask` with keys derived from `seed`, so the commitment can be recomputed.
///
/// Keys for groups up to the committed age come from `KDF(32, seed, salt = i, "age-commitment")`. The keys of the
/// remaining groups are derived from a published base key whose private key is unknown.
pub fn restriction_commit_seeded(
    mask: AgeMask,
    age: u32,
    seed: &[u8],
) -> Result<AgeCommitmentProof, AgeRestrictionError> {
    let num_pubs = count_age_groups(mask) - 1;
    let num_privs = get_age_group_index(mask, age);
    let mut public_keys = Vec::with_capacity(num_pubs);
    let mut private_keys = Vec::with_capacity(num_privs);
    for i in 0..num_privs {
        let key_seed = kdf_array::<32>(seed, &(i as u32).to_be_bytes(), SEEDED_KEY_INFO)?;
        let private = EdxPrivateKey::from_seed(&key_seed);
        public_keys.push(private.public_key());
        private_keys.push(private);
    }
    for i in num_privs..num_pubs {
        let factor_seed = kdf_array::<32>(seed, &(i as u32).to_be_bytes(), SEEDED_FACTOR_INFO)?;
        public_keys.push(PUBLISHED_BASE_KEY.derive(&factor_seed)?);
    }
    Ok(AgeCommitmentProof { commitment: AgeCommitment { mask, public_keys }, proof: AgeProof { private_keys } })
}

/// Re-derive every public key and every held private key under `salt`.
pub fn commitment_derive(proof: &AgeCommitmentProof, salt: &[u8]) -> Result<AgeCommitmentProof, KeyError> {
    let public_keys = proof.commitment.public_keys.iter().map(|k| k.derive(salt)).collect::<Result<Vec<_>, _>>()?;
    let private_keys = proof.proof.private_keys.iter().map(|k| k.derive(salt)).collect::<Result<Vec<_>, _>>()?;
    Ok(AgeCommitmentProof {
        commitment: AgeCommitment { mask: proof.commitment.mask, public_keys },
        proof: AgeProof { private_keys },
    })
}

/// True iff deriving `original` under `salt` yields `derived`.
pub fn commit_compare(original: &AgeCommitment, derived: &AgeCommitment, salt: &[u8]) -> bool {
    if original.mask != derived.mask || original.public_keys.len() != derived.public_keys.len() {
        return false;
    }
    original.public_keys.iter().zip(&derived.public_keys).all(|(o, d)| matches!(o.derive(salt), Ok(k) if k == *d))
}

fn attestation_message(mask: AgeMask, age: u32) -> Vec<u8> {
    build_sig_ps(SignaturePurpose::WalletAgeAttestation).put_u32(mask.bits()).put_u32(age).build()
}

/// Sign the statement "the holder is at least `age`". Ages in group 0 need no attestation and yield an all-zero
/// signature.
pub fn commitment_attest(proof: &AgeCommitmentProof, age: u32) -> Result<EdxSignature, AgeRestrictionError> {
    let mask = proof.commitment.mask;
    let group = get_age_group_index(mask, age);
    if group == 0 {
        return Ok(EdxSignature::zeroed());
    }
    let private = proof
        .proof
        .private_keys
        .get(group - 1)
        .ok_or(AgeRestrictionError::MissingPrivateKey { group, held: proof.proof.private_keys.len() })?;
    Ok(private.sign(&attestation_message(mask, age)))
}

pub fn commitment_verify(commitment: &AgeCommitment, sig: &EdxSignature, age: u32) -> bool {
    let group = get_age_group_index(commitment.mask, age);
    if group == 0 {
        return true;
    }
    let Some(public) = commitment.public_keys.get(group - 1) else {
        warn!("Age commitment has no key for group {group}");
        return false;
    };
    public.verify(&attestation_message(commitment.mask, age), sig)
}
