//! Key exchange between an ephemeral X25519 key and a long-term Ed25519 key.
//!
//! Both directions produce the same 64-byte key material: SHA-512 of the X25519 shared secret. The EdDSA side
//! uses the clamped scalar half of its expanded key; the ECDHE side maps the Edwards public key to its
//! Montgomery form.

use crate::cryptography::hash::{hash, HashCode};
use crate::cryptography::keys::{EcdhePrivateKey, EcdhePublicKey, EddsaPrivateKey, EddsaPublicKey, KeyError};
use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha512};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// The holder of an EdDSA private key combines it with an ephemeral ECDHE public key.
pub fn key_exchange_eddsa_ecdhe(eddsa_priv: &EddsaPrivateKey, ecdhe_pub: &EcdhePublicKey) -> HashCode {
    let expanded = Sha512::digest(eddsa_priv.as_bytes());
    let mut a = Zeroizing::new([0u8; 32]);
    a.copy_from_slice(&expanded[..32]);
    let secret = StaticSecret::from(*a);
    let shared = secret.diffie_hellman(&PublicKey::from(ecdhe_pub.to_bytes()));
    hash(shared.as_bytes())
}

/// The holder of an ephemeral ECDHE private key combines it with an EdDSA public key.
pub fn key_exchange_ecdhe_eddsa(ecdhe_priv: &EcdhePrivateKey, eddsa_pub: &EddsaPublicKey) -> Result<HashCode, KeyError> {
    let point = CompressedEdwardsY(eddsa_pub.to_bytes()).decompress().ok_or(KeyError::InvalidPoint)?;
    let montgomery = point.to_montgomery();
    let secret = StaticSecret::from(*ecdhe_priv.as_bytes());
    let shared = secret.diffie_hellman(&PublicKey::from(montgomery.to_bytes()));
    Ok(hash(shared.as_bytes()))
}

/// Plain X25519 between two ECDHE keys, hashed with SHA-512.
pub fn key_exchange_ecdhe(ecdhe_priv: &EcdhePrivateKey, ecdhe_pub: &EcdhePublicKey) -> HashCode {
    let secret = StaticSecret::from(*ecdhe_priv.as_bytes());
    let shared = secret.diffie_hellman(&PublicKey::from(ecdhe_pub.to_bytes()));
    hash(shared.as_bytes())
}
