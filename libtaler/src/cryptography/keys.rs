use crate::cryptography::encoding::EncodingError;
use crate::cryptography::kdf::KdfError;
use crate::helpers::{fixed_bytes, secret_bytes};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use x25519_dalek::StaticSecret;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("The bytes do not encode a valid curve point")]
    InvalidPoint,
    #[error("Invalid key encoding: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Scalar is not in canonical form")]
    NonCanonicalScalar,
    #[error("Key derivation failed: {0}")]
    Derivation(#[from] KdfError),
}

secret_bytes! {
    /// An Ed25519 signing key seed. Coin, reserve, merchant and purse keys are all of this type.
    pub struct EddsaPrivateKey(32);
}

fixed_bytes! {
    /// A compressed Ed25519 point.
    pub struct EddsaPublicKey(32);
}

fixed_bytes! {
    /// An Ed25519 signature, `R || s`.
    pub struct EddsaSignature(64);
}

secret_bytes! {
    /// An X25519 private scalar (clamped when used).
    pub struct EcdhePrivateKey(32);
}

fixed_bytes! {
    /// An X25519 public key (Montgomery u-coordinate).
    pub struct EcdhePublicKey(32);
}

impl EddsaPrivateKey {
    pub fn public_key(&self) -> EddsaPublicKey {
        let signing_key = SigningKey::from_bytes(self.as_bytes());
        EddsaPublicKey::from_bytes(signing_key.verifying_key().to_bytes())
    }
}

impl EcdhePrivateKey {
    pub fn public_key(&self) -> EcdhePublicKey {
        let secret = StaticSecret::from(*self.as_bytes());
        EcdhePublicKey::from_bytes(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EddsaKeyPair {
    #[serde(rename = "priv")]
    pub private: EddsaPrivateKey,
    #[serde(rename = "pub")]
    pub public: EddsaPublicKey,
}

impl EddsaKeyPair {
    pub fn random() -> Self {
        Self::from_private(EddsaPrivateKey::random())
    }

    pub fn from_private(private: EddsaPrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdheKeyPair {
    #[serde(rename = "priv")]
    pub private: EcdhePrivateKey,
    #[serde(rename = "pub")]
    pub public: EcdhePublicKey,
}

impl EcdheKeyPair {
    pub fn random() -> Self {
        Self::from_private(EcdhePrivateKey::random())
    }

    pub fn from_private(private: EcdhePrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }
}

pub fn eddsa_sign(msg: &[u8], key: &EddsaPrivateKey) -> EddsaSignature {
    let signing_key = SigningKey::from_bytes(key.as_bytes());
    EddsaSignature::from_bytes(signing_key.sign(msg).to_bytes())
}

/// Verify an Ed25519 signature. Malformed keys or signatures simply fail verification.
pub fn eddsa_verify(msg: &[u8], sig: &EddsaSignature, key: &EddsaPublicKey) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(key.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(sig.as_bytes());
    verifying_key.verify(msg, &sig).is_ok()
}
