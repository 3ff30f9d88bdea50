//! RSA blind signatures with a full-domain hash.
//!
//! The message is mapped into `Z_N` with [`kdf_mod`] salted by the encoded public key, and the blinding factor
//! is derived from the blinding key secret the same way. Both values must be coprime to `N`; a key for which
//! either check fails is treated as malicious. Outputs are minimal-length big-endian integers.
//!
//! The arithmetic uses `num-bigint`, which does not run in constant time.

use crate::cryptography::kdf::{kdf_mod, KdfError};
use crate::helpers::{from_crock, to_crock};
use log::*;
use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::One;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const FDH_INFO: &[u8] = b"RSA-FDA FTpsW!";
// The misspelling is part of the exchange's derivation and must be kept.
const BLINDING_SALT: &[u8] = b"Blinding KDF extrator HMAC key";
const BLINDING_INFO: &[u8] = b"Blinding KDF";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RsaError {
    #[error("Malformed RSA public key encoding")]
    MalformedPublicKey,
    #[error("Malicious RSA key: a derived value is not coprime to the modulus")]
    MaliciousKey,
    #[error("Blinding factor has no inverse modulo N")]
    NotInvertible,
    #[error("Key derivation failed: {0}")]
    Kdf(#[from] KdfError),
}

/// An RSA public key `(N, e)`.
///
/// The binary form is `modulus_len: u16 BE || exponent_len: u16 BE || N || e` with both integers big-endian and
/// minimal length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RsaPublicKey {
    n: BigUint,
    e: BigUint,
}

impl RsaPublicKey {
    pub fn new(n: BigUint, e: BigUint) -> Self {
        Self { n, e }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }

    pub fn exponent(&self) -> &BigUint {
        &self.e
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RsaError> {
        if bytes.len() < 4 {
            return Err(RsaError::MalformedPublicKey);
        }
        let modulus_len = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let exponent_len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if bytes.len() != 4 + modulus_len + exponent_len || modulus_len == 0 || exponent_len == 0 {
            return Err(RsaError::MalformedPublicKey);
        }
        let n = BigUint::from_bytes_be(&bytes[4..4 + modulus_len]);
        let e = BigUint::from_bytes_be(&bytes[4 + modulus_len..]);
        Ok(Self { n, e })
    }

    pub fn encode(&self) -> Vec<u8> {
        let n = self.n.to_bytes_be();
        let e = self.e.to_bytes_be();
        let mut out = Vec::with_capacity(4 + n.len() + e.len());
        out.extend_from_slice(&(n.len() as u16).to_be_bytes());
        out.extend_from_slice(&(e.len() as u16).to_be_bytes());
        out.extend_from_slice(&n);
        out.extend_from_slice(&e);
        out
    }
}

impl Serialize for RsaPublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        to_crock(&self.encode(), s)
    }
}

impl<'de> Deserialize<'de> for RsaPublicKey {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        let bytes = from_crock(de)?;
        RsaPublicKey::decode(&bytes).map_err(serde::de::Error::custom)
    }
}

fn gcd_validate(r: &BigUint, n: &BigUint) -> Result<(), RsaError> {
    if r.gcd(n).is_one() {
        Ok(())
    } else {
        warn!("RSA key failed the coprimality check, treating it as malicious");
        Err(RsaError::MaliciousKey)
    }
}

fn full_domain_hash(hm: &[u8], key: &RsaPublicKey) -> Result<BigUint, RsaError> {
    let fdh = kdf_mod(&key.n, hm, &key.encode(), FDH_INFO)?;
    gcd_validate(&fdh, &key.n)?;
    Ok(fdh)
}

fn blinding_factor(bks: &[u8], key: &RsaPublicKey) -> Result<BigUint, RsaError> {
    let r = kdf_mod(&key.n, bks, BLINDING_SALT, BLINDING_INFO)?;
    gcd_validate(&r, &key.n)?;
    Ok(r)
}

/// Blind the message hash `hm` under `key` with the blinding key secret `bks`.
pub fn rsa_blind(hm: &[u8], bks: &[u8], key: &RsaPublicKey) -> Result<Vec<u8>, RsaError> {
    let data = full_domain_hash(hm, key)?;
    let r = blinding_factor(bks, key)?;
    let blinded = (r.modpow(&key.e, &key.n) * data) % &key.n;
    Ok(blinded.to_bytes_be())
}

/// Remove the blinding from a signature over a blinded message.
pub fn rsa_unblind(blinded_sig: &[u8], key: &RsaPublicKey, bks: &[u8]) -> Result<Vec<u8>, RsaError> {
    let sig = BigUint::from_bytes_be(blinded_sig);
    let r = blinding_factor(bks, key)?;
    let r_inv = r.modinv(&key.n).ok_or(RsaError::NotInvertible)?;
    Ok(((sig * r_inv) % &key.n).to_bytes_be())
}

/// Check `sig^e mod N == FDH(hm)`. A malicious key is an error, not a failed verification.
pub fn rsa_verify(hm: &[u8], sig: &[u8], key: &RsaPublicKey) -> Result<bool, RsaError> {
    let data = full_domain_hash(hm, key)?;
    let s = BigUint::from_bytes_be(sig);
    Ok(s.modpow(&key.e, &key.n) == data)
}


#[cfg(test)]
mod test {
    use super::test_key::*;
    use super::*;
    use crate::cryptography::encoding::{decode_crock, encode_crock};
    use crate::cryptography::hash::hash;

    const HM: &str = "Z0486MZRNZA08AQKV54QJ2E03P5VAAR74S38H9JPEH2YZHXZ1635PRTSQDE9EMEKPMZ5VMW8CH0V82YFW49DH9CNH2JJW8ANPPVE28G";
    const BKS: &str = "000G40R40M30E209185GR38E1W8124GK2GAHC5RR34D1P70X3RFG";
    const BLINDED: &str = "HK81D90ZNMYQP7556YZ4WJGKBHT78Y4DMPCCG33PJJNDGAZT4GEP9ZX16JQXA4X6XWSP8K4Y6KTXAV6NTWFD6JTR0K55BP2T1HQZ3FJPM1D85CYJH6TFXVNYPSMJQQT8PATHQTES7A9H8WWBGP7C7B1F7CA31RGVT49BMMWZP1M5ETBW2NRYM52PJPS5TFHDZRYHCTNMWM0E6";
    const SIG: &str = "EG9CXSXS1YBFKTNZMVJNXD7X9ZDGV2132GMRPZBD91ZVBW6BSFB6Y9PDHZ7CP2H7EQPJ3FK2ADRT33B7FGVAFSZB76ZNQHX20R2QRWHA8Q117FM726PSWPP3CB4PXTE1JJ90K8KG451MEBRTQGQRF2PZE7NXXRDP8TQD5EY25FBSZB5ZTXBH5SAQJ2BXQGE03DXS3ZHVG6F70";
    const MALICIOUS_PUB: &str = "0100008GDAMZPXJ6Z9QB109W532XBW4Z0XZC7EH3HFXSKGDP66H07T0HGWHKVC8QSF1R81BEY135K9513QJ9YZPB56XDN3WR1QPEST9E6328Y0R";

    #[test]
    fn public_key_encoding_round_trips() {
        let key = public_key();
        assert_eq!(key.n.bits(), 1024);
        assert_eq!(key.e, BigUint::from(65537u32));
        assert_eq!(encode_crock(&key.encode()), PUB);
    }

    #[test]
    fn malformed_public_keys_are_rejected() {
        assert_eq!(RsaPublicKey::decode(&[0, 1]), Err(RsaError::MalformedPublicKey));
        assert_eq!(RsaPublicKey::decode(&[0, 1, 0, 1, 5]), Err(RsaError::MalformedPublicKey));
        assert_eq!(RsaPublicKey::decode(&[0, 1, 0, 1, 5, 3, 9]), Err(RsaError::MalformedPublicKey));
    }

    #[test]
    fn blind_known_answer() {
        let hm = decode_crock(HM).unwrap();
        assert_eq!(hm, hash(b"test coin").as_bytes());
        let bks = decode_crock(BKS).unwrap();
        let blinded = rsa_blind(&hm, &bks, &public_key()).unwrap();
        assert_eq!(encode_crock(&blinded), BLINDED);
    }

    #[test]
    fn blind_sign_unblind_verify() {
        let key = public_key();
        let hm = decode_crock(HM).unwrap();
        let bks = decode_crock(BKS).unwrap();
        let blinded = rsa_blind(&hm, &bks, &key).unwrap();
        let blind_sig = sign_blinded(&blinded);
        let sig = rsa_unblind(&blind_sig, &key, &bks).unwrap();
        assert_eq!(encode_crock(&sig), SIG);
        assert!(rsa_verify(&hm, &sig, &key).unwrap());
        assert!(!rsa_verify(hash(b"other coin").as_bytes(), &sig, &key).unwrap());
    }

    #[test]
    fn exchange_blind_signing_vector() {
        let hm = decode_crock(
            "TT1R28D79EJEJ9PC35AQS35CCG85DSXSZ508MV2HS2FN4ME6AHESZX5WP485R8A75KG53FN6F1YNW95008663TKAPWB81420VG17BY8",
        )
        .unwrap();
        let key = RsaPublicKey::decode(&decode_crock(concat!(
            "040000Y62RSDDKZXTE7GDVA302ZZR0DY224RSDT6WDWR1XGT8E3YG80XV6TMT3ZCNP8XC84W0N6MSZ0EF8S3YB1JJ2AXY9JQZW3MCA0CG38",
            "ER4YE2RY4Q2666DEZSNKT29V6CKZVCDHXSAKY8W6RPEKEQ5YSBYQK23MRK3CQTNNJXQFDKEMRHEC5Y6RDHAC5RJCV8JJ8BF18VPKZ2Q7B",
            "B14YN1HJ22H8EZGW0RDGG9YPEWA9183BHEQ651PP81J514TJ9K8DH23AJ50SZFNS429HQ390VRP5E4MQ7RK7ZJXXTSZAQSRTC0QF28P23",
            "PD37C17QFQB0BBC54MB8MDH7RW104STG6VN0J22P39JP4EXPVGK5D9AX5W869MDQ6SRD42ZYK5H20227Q8CCWSQ6C3132WP0F0H04002",
        ))
        .unwrap())
        .unwrap();
        let bks = decode_crock("7QD31RPJH0W306RJWBRG646Z2FTA1F89BKSXPDAG7YM0N5Z0B610").unwrap();
        let blinded_msg = concat!(
            "GA8PC6YH9VF5MW6P2DKTV0W0ZTQ24DZ9EAN5QH3SQXRH7SCZHFMM21ZY05F0BS7MFW8TSEP4SEB280BYP5ACHNQWGE10PCXDDMK7ECXJ",
            "DPHJ224JBCV4KYNWG6NBR3SC9HK8FXVFX55GFBJFNQHNZGEB8DB0KN9MSVYFDXN45KPMSNY03FVX0JZ0R3YG9XQ8XVGB5SYZCF0QSHWH",
            "61MT0Q10CZD2V114BT64D3GD86EJ5S9WBMYG51SDN5CSKEJ734YAJ4HCEWW0RDN8GXA9ZMA18SKVW8T3TTBCPJRF2Y77JGQ08GF35SYG",
            "A2HWFV1HGVS8RCTER6GB9SZHRG4T7919H9C1KFAP50G2KSV6X42D6KNJANNSGKQH649TJ00YJQXPHPNFBSS198RY2C243D4B4W",
        );
        let blind_sig = decode_crock(concat!(
            "5VW0MS5PRBA3W8TPATSTDA2YRFQM1Z7F2DWKQ8ATMZYYY768Q3STZ3HGNVYQ6JB5NKP80G5HGE58616FPA70SX9PTW7EN8EJ23E26FA",
            "SBWZBP8E2RWQQ5E0F72B2PWRP5ZCA2J3AB3F6P86XK4PZYT64RF94MDGHY0GSDSSBH5YSFB3VM0KVXA52H2Y2G9S85AVCSD3BTMHQRF5",
            "BJJ8JE00T4GK70PSTVCGMRKRNA7DGW7GD2F35W55AXF7R2YJC8PAGNSJYWKC3PC75A5N8H69K299AK5PM3CDDHNS4BMRNGF7K49CR4ZBF",
            "RXDAWMB3X6T05Q4NKSG0F1KP5JA0XBMF2YJK7KEPRD1EWCHJE44T9YXBTK4W9CV77X7Z9P407ZC6YB3M2ARANZXHJKSM3XC33M",
        ))
        .unwrap();
        let expected_sig = concat!(
            "PFT6WQJGCM9DE6264DJS6RMG4XDMCDBJKZGSXAF3BEXWZ979Q13NETKK05S1YV91CX3Y034FSS86SSHZTTE8097RRESQP52EKFGTWJXK",
            "HZJEQJ49YHMBNQDHW4CFBJECNJSV2PMHWVGXV7HB84R6P0S3ES559HWQX01Q9MYDEGRNHKW87QR2BNSG951D5NQGAKEJ2SSJBE18S6WY",
            "AC24FAP8TT8ANECH5371J0DJY0YR0VWAFWVJDV8XQSFXWMJ80N3A80SPSHPYJY3WZZXW63WQ46WHYY56ZSNE5G1RZ5CR0XYV2ECKPM8R",
            "0FS58EV16WTRAM1ABBFVNAT3CAEFAZCWP3XHPVBQY5NZVTD5QS2Q8SKJQ2XB30E11CWDN9KTV5CBK4DN72EVG73F3W3BATAKHG",
        );

        assert_eq!(encode_crock(&rsa_blind(&hm, &bks, &key).unwrap()), blinded_msg);
        let sig = rsa_unblind(&blind_sig, &key, &bks).unwrap();
        assert_eq!(encode_crock(&sig), expected_sig);
        assert!(rsa_verify(&hm, &sig, &key).unwrap());
    }

    #[test]
    fn wrong_blinding_key_does_not_unblind() {
        let key = public_key();
        let hm = hash(b"coin");
        let bks = [7u8; 32];
        let blinded = rsa_blind(hm.as_bytes(), &bks, &key).unwrap();
        let blind_sig = sign_blinded(&blinded);
        let sig = rsa_unblind(&blind_sig, &key, &[8u8; 32]).unwrap();
        assert!(!rsa_verify(hm.as_bytes(), &sig, &key).unwrap());
    }

    #[test]
    fn malicious_key_is_detected() {
        let key = RsaPublicKey::decode(&decode_crock(MALICIOUS_PUB).unwrap()).unwrap();
        let hm = decode_crock(HM).unwrap();
        let bks = decode_crock(BKS).unwrap();
        assert_eq!(rsa_blind(&hm, &bks, &key), Err(RsaError::MaliciousKey));
        assert_eq!(rsa_verify(&hm, &[1, 2, 3], &key), Err(RsaError::MaliciousKey));
    }

    #[test]
    fn public_key_json() {
        let key = public_key();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{PUB}\""));
        let back: RsaPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
