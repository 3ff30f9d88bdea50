//! Edx25519: Ed25519 keys that can be derived along a public path.
//!
//! A private key is the 64-byte expanded form `a || b`: `a` is the signing scalar and `b` the nonce prefix. Both
//! halves and the public key can be re-keyed by a 64-byte derivation factor computed from the public key and a
//! seed, so the holder of only the public key derives the same public key the private-key holder gets.
//! Signatures are plain Ed25519 signatures and verify with any Ed25519 verifier.

use crate::cryptography::kdf::{kdf_array, KdfError};
use crate::cryptography::keys::KeyError;
use crate::helpers::{fixed_bytes, secret_bytes};
use curve25519_dalek::constants::ED25519_BASEPOINT_TABLE;
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::Scalar;
use ed25519_dalek::{Verifier, VerifyingKey};
use sha2::{Digest, Sha512};
use zeroize::Zeroizing;

const DERIVATION_INFO: &[u8] = b"edx25519-derivation";

secret_bytes! {
    /// An expanded Edx25519 private key, `a || b`.
    pub struct EdxPrivateKey(64);
}

fixed_bytes! {
    /// A compressed Edx25519 public key `a·G`.
    pub struct EdxPublicKey(32);
}

fixed_bytes! {
    /// An Ed25519 signature made with an Edx25519 key.
    pub struct EdxSignature(64);
}

fn sha512(chunks: &[&[u8]]) -> [u8; 64] {
    let mut hasher = Sha512::new();
    for c in chunks {
        hasher.update(c);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&hasher.finalize());
    out
}

impl EdxPrivateKey {
    /// Expand a seed with SHA-512 and clamp the scalar half.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut expanded = Zeroizing::new(sha512(&[seed]));
        expanded[0] &= 248;
        expanded[31] &= 127;
        expanded[31] |= 64;
        Self::from_bytes(*expanded)
    }

    /// A fresh key from 32 random bytes.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut seed = Zeroizing::new([0u8; 32]);
        rand::rng().fill_bytes(&mut seed[..]);
        Self::from_seed(&seed[..])
    }

    fn scalar(&self) -> Zeroizing<Scalar> {
        let mut a = [0u8; 32];
        a.copy_from_slice(&self.as_bytes()[..32]);
        Zeroizing::new(Scalar::from_bytes_mod_order(a))
    }

    fn nonce_prefix(&self) -> &[u8] {
        &self.as_bytes()[32..]
    }

    pub fn public_key(&self) -> EdxPublicKey {
        EdxPublicKey::from_bytes((&*self.scalar() * ED25519_BASEPOINT_TABLE).compress().to_bytes())
    }

    /// Derive the private key matching [`EdxPublicKey::derive`] under the same seed.
    ///
    /// `a' = a·h mod L` and `b' = SHA-512(b || h)[0..32]`.
    pub fn derive(&self, seed: &[u8]) -> Result<EdxPrivateKey, KeyError> {
        let h = Zeroizing::new(derivation_factor(&self.public_key(), seed)?);
        let h_scalar = Scalar::from_bytes_mod_order_wide(&h);
        let a = Zeroizing::new(*self.scalar() * h_scalar);
        let b = Zeroizing::new(sha512(&[self.nonce_prefix(), &h[..]]));
        let mut out = Zeroizing::new([0u8; 64]);
        out[..32].copy_from_slice(a.as_bytes());
        out[32..].copy_from_slice(&b[..32]);
        Ok(EdxPrivateKey::from_bytes(*out))
    }

    /// Ed25519 signing with the expanded key: `r = H(b || m)`, `R = r·G`, `s = r + H(R || A || m)·a`.
    pub fn sign(&self, msg: &[u8]) -> EdxSignature {
        let a = self.scalar();
        let public = self.public_key();
        let r = Zeroizing::new(Scalar::from_bytes_mod_order_wide(&sha512(&[self.nonce_prefix(), msg])));
        let big_r = (&*r * ED25519_BASEPOINT_TABLE).compress();
        let k = Scalar::from_bytes_mod_order_wide(&sha512(&[&big_r.as_bytes()[..], &public.as_bytes()[..], msg]));
        let s = *r + k * *a;
        let mut sig = [0u8; 64];
        sig[..32].copy_from_slice(big_r.as_bytes());
        sig[32..].copy_from_slice(s.as_bytes());
        EdxSignature::from_bytes(sig)
    }
}

impl EdxPublicKey {
    /// `P' = (h mod L)·P`.
    pub fn derive(&self, seed: &[u8]) -> Result<EdxPublicKey, KeyError> {
        let point = CompressedEdwardsY(self.to_bytes()).decompress().ok_or(KeyError::InvalidPoint)?;
        let h = derivation_factor(self, seed)?;
        let derived = Scalar::from_bytes_mod_order_wide(&h) * point;
        Ok(EdxPublicKey::from_bytes(derived.compress().to_bytes()))
    }

    pub fn verify(&self, msg: &[u8], sig: &EdxSignature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(self.as_bytes()) else {
            return false;
        };
        key.verify(msg, &ed25519_dalek::Signature::from_bytes(sig.as_bytes())).is_ok()
    }
}

/// The 64-byte derivation factor `h = KDF(64, ikm=pub, salt=seed, info="edx25519-derivation")`.
pub fn derivation_factor(public: &EdxPublicKey, seed: &[u8]) -> Result<[u8; 64], KdfError> {
    kdf_array::<64>(public.as_bytes(), seed, DERIVATION_INFO)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cryptography::encoding::decode_crock;

    const PRIV1: &str = "P0JAQ53G66M7TSGQTCFVFMPCBC7WHBRYDZGQXM8VD88C72NJANR07V1DQRAE7KSH92HZ3B62PJVRYFTVFTQM43K5AQD8R4A7HWJ3P7G";
    const PUB1: &str = "4YZ6D5MGWTWCTKY4W931V4S5SW0XG7AD4A60J2Z9CSEB9WE05WB0";
    const SEED: &str = "SQ3YAVGNZ2GYER9VQAJB2M1Z903Y458HYXWBSF9S2A9YKF85R4DHYJX35YXXX82CBGFW2TRBCR1ZCWSQ7A87QW5SHC8WP9JH48P8KK8";
    const PRIV2: &str = "GQ7NCSVNKY0QS7GQVFP2TSG6P4YN1NCK303K5TYXXBKSZ61M3R4XFZ0KA42JND6GBZRXRSJY9EX3HMMY160VQ6Y6H2NZ8H0WVQRCG1R";
    const PUB2: &str = "F5X6379F0FSY87MN9210FAN84PR8KYDJQ5G5784H1N3FY12ZKAPG";

    #[test]
    fn derivation_known_answer() {
        let priv1 = EdxPrivateKey::from_crock(PRIV1).unwrap();
        let pub1 = priv1.public_key();
        assert_eq!(pub1.to_crock(), PUB1);

        let seed = decode_crock(SEED).unwrap();
        let priv2 = priv1.derive(&seed).unwrap();
        let pub2 = pub1.derive(&seed).unwrap();
        assert_eq!(priv2.to_crock(), PRIV2);
        assert_eq!(pub2.to_crock(), PUB2);
        assert_eq!(priv2.public_key(), pub2);
    }

    #[test]
    fn derived_keys_sign_and_verify() {
        let key = EdxPrivateKey::generate();
        let derived = key.derive(b"some salt").unwrap();
        let derived_pub = key.public_key().derive(b"some salt").unwrap();
        let sig = derived.sign(b"attest");
        assert!(derived_pub.verify(b"attest", &sig));
        assert!(!derived_pub.verify(b"attest!", &sig));
        assert!(!key.public_key().verify(b"attest", &sig));
    }

    #[test]
    fn signatures_are_deterministic() {
        let key = EdxPrivateKey::from_seed(b"seed");
        assert_eq!(key.sign(b"m"), key.sign(b"m"));
        assert_ne!(key.sign(b"m"), key.sign(b"n"));
    }

    #[test]
    fn from_seed_is_clamped() {
        let key = EdxPrivateKey::from_seed(&[42u8; 32]);
        let bytes = key.as_bytes();
        assert_eq!(bytes[0] & 7, 0);
        assert_eq!(bytes[31] & 0xc0, 0x40);
    }
}
