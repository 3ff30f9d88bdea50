#![allow(dead_code)]

use libtaler::amount::Amount;
use libtaler::cryptography::decode_crock;
use libtaler::cryptography::rsa::RsaPublicKey;
use libtaler::denomination::{BlindedDenominationSignature, CoinEnvelope, DenominationPubKey};
use num_bigint::BigUint;

/// A 1024-bit test denomination key. Far too small for real use, but enough to exercise the protocol.
pub const RSA_PUB: &str = "020000XHSSHPJXD54PYCCXCYK6KPPK6T673VKBDC8MH0KE2FJVQWZTTVYJJQNSV6534EPNGJ0MQQFE4G4TJEW1ZPZVZD3SBMZTQGVPPY1PYXM61KDKEJR38G21J5YF7250FDT5WCW0D864M65TER0RQ1QCXSD18RKTBJ9KF05JMCCV2SAS03HV9A0DRKAFAAY34YEED6HNSSB5RZ31FG2001";
pub const RSA_D: &str = "7c50bdc6d53f43344a59a02af4181c628ddd839fbecb9331d290ab0a3e87e30218d4e686d1cb30673c302df0f9b4a7a036e090bbd673f0872d2e3d74a23e5f56bb581e08150bfa9824025e04592de67ee1b3b1b94344fb79a95d4e792210301867fa19a88ed0eae9956cbe23d64c7ed93c4cbb1ff541128cb2673f81c5cd5851";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn eur(s: &str) -> Amount {
    Amount::parse(&format!("EUR:{s}")).unwrap()
}

pub fn rsa_public_key() -> RsaPublicKey {
    RsaPublicKey::decode(&decode_crock(RSA_PUB).unwrap()).unwrap()
}

pub fn rsa_denomination(age_mask: u32) -> DenominationPubKey {
    DenominationPubKey::Rsa { rsa_public_key: rsa_public_key(), age_mask }
}

/// Sign an envelope the way the exchange does.
pub fn exchange_sign(envelope: &CoinEnvelope) -> BlindedDenominationSignature {
    let CoinEnvelope::Rsa { rsa_blinded_planchet } = envelope else {
        panic!("the test exchange only signs RSA envelopes");
    };
    let key = rsa_public_key();
    let d = BigUint::from_bytes_be(&hex::decode(RSA_D).unwrap());
    let sig = BigUint::from_bytes_be(rsa_blinded_planchet).modpow(&d, key.modulus());
    BlindedDenominationSignature::Rsa { blinded_rsa_signature: sig.to_bytes_be() }
}
