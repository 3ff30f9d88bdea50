//! Cryptographic primitives
//!
//! This module contains the building blocks the protocol modules are assembled from: the Crockford base32 text
//! encoding, SHA-512 hashing, the HKDF-based key derivation function, signature purpose framing, EdDSA and ECDHE
//! keys, RSA and Clause-Schnorr blind signatures and derivable Edx25519 keys.
//!
//! It is a fairly low-level module and as such the types defined here know nothing about coins, denominations or
//! refresh sessions.

pub mod cs;
pub mod ecdh;
pub mod edx25519;
pub mod encoding;
pub mod hash;
pub mod kdf;
pub mod keys;
pub mod purpose;
pub mod rsa;

pub use encoding::{decode_crock, encode_crock, EncodingError};
pub use hash::{hash, hash_string, hash_truncate32, HashCode, HashContext, ShortHashCode};
pub use kdf::{kdf, kdf_mod, KdfError};
pub use keys::{eddsa_sign, eddsa_verify, EddsaKeyPair, EddsaPrivateKey, EddsaPublicKey, EddsaSignature, KeyError};
