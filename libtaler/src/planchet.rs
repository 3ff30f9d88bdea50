//! Deterministic coin derivation and planchet construction.
//!
//! A wallet never stores coin keys it could not re-derive. Every coin private key and blinding key secret comes
//! out of the KDF, keyed by a secret seed and salted with the coin's index. Each flow (withdraw, tip, refresh) uses
//! its own `info` string so the same seed can never produce the same coin in two flows.

use crate::age_restriction::{
    restriction_commit, restriction_commit_seeded, AgeCommitmentHash, AgeCommitmentProof, AGE_UNRESTRICTED,
};
use crate::amount::Amount;
use crate::cryptography::cs::{
    cs_blind, cs_unblind, derive_bseed, CsBlindSignature, CsBlindingSeed, CsNonce, CsRPublic,
};
use crate::cryptography::hash::HashCode;
use crate::cryptography::kdf::{kdf_array, KdfError};
use crate::cryptography::keys::{
    eddsa_sign, EcdheKeyPair, EcdhePrivateKey, EddsaPrivateKey, EddsaPublicKey, EddsaSignature,
};
use crate::cryptography::purpose::{build_sig_ps, SignaturePurpose};
use crate::cryptography::rsa::{rsa_blind, rsa_unblind};
use crate::denomination::{
    hash_coin_ev, hash_coin_pub, BlindedDenominationSignature, CoinEnvelope, DenomKeyType, DenominationPubKey,
    ExchangeWithdrawValues, UnblindedSignature,
};
use crate::error::CryptoError;
use crate::helpers::secret_bytes;
use log::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroizing;

const WITHDRAW_INFO: &[u8] = b"taler-withdrawal-coin-derivation";
const TIP_INFO: &[u8] = b"taler-tip-coin-derivation";
const REFRESH_INFO: &[u8] = b"taler-coin-derivation";
const TRANSFER_INFO: &[u8] = b"taler-transfer-pub-derivation";
const REFRESH_COIN_SALT: &[u8] = b"coin";
const REFRESH_BKS_SALT: &[u8] = b"bks";

secret_bytes! {
    /// The blinding key secret of a planchet. For CS planchets this holds the blinding seed.
    pub struct BlindingKeySecret(32);
}

/// A secret seed of any length, the root of a family of derived coins.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretSeed(Zeroizing<Vec<u8>>);

impl SecretSeed {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn random(len: usize) -> Self {
        use rand::RngCore;
        let mut bytes = Zeroizing::new(vec![0u8; len]);
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SecretSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretSeed")
    }
}

impl Serialize for SecretSeed {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        crate::helpers::to_crock(&self.0, s)
    }
}

impl<'de> Deserialize<'de> for SecretSeed {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        crate::helpers::from_crock(de).map(Self::new)
    }
}

/// A freshly derived coin key pair with its blinding key secret.
#[derive(Debug, Clone)]
pub struct FreshCoin {
    pub coin_priv: EddsaPrivateKey,
    pub coin_pub: EddsaPublicKey,
    pub bks: BlindingKeySecret,
}

impl FreshCoin {
    fn from_parts(coin_priv: [u8; 32], bks: [u8; 32]) -> Self {
        let coin_priv = EddsaPrivateKey::from_bytes(coin_priv);
        let coin_pub = coin_priv.public_key();
        Self { coin_priv, coin_pub, bks: BlindingKeySecret::from_bytes(bks) }
    }

    fn split(out: &[u8; 64]) -> Self {
        let mut coin_priv = [0u8; 32];
        let mut bks = [0u8; 32];
        coin_priv.copy_from_slice(&out[..32]);
        bks.copy_from_slice(&out[32..]);
        Self::from_parts(coin_priv, bks)
    }
}

/// Coin `coin_index` of a withdrawal: `KDF(64, seed, salt = index, "taler-withdrawal-coin-derivation")` split
/// into the coin private key and the blinding key secret.
pub fn setup_withdraw_planchet(secret_seed: &[u8], coin_index: u32) -> Result<FreshCoin, KdfError> {
    let out = Zeroizing::new(kdf_array::<64>(secret_seed, &coin_index.to_be_bytes(), WITHDRAW_INFO)?);
    Ok(FreshCoin::split(&out))
}

/// Like [`setup_withdraw_planchet`], under the tip derivation context.
pub fn setup_tip_planchet(secret_seed: &[u8], coin_index: u32) -> Result<FreshCoin, KdfError> {
    let out = Zeroizing::new(kdf_array::<64>(secret_seed, &coin_index.to_be_bytes(), TIP_INFO)?);
    Ok(FreshCoin::split(&out))
}

/// Coin `coin_index` of a refresh candidate. A per-coin master secret is derived from the transfer secret first,
/// and the coin key and blinding key secret are then derived from it with the salts `"coin"` and `"bks"`.
pub fn setup_refresh_planchet(transfer_secret: &HashCode, coin_index: u32) -> Result<FreshCoin, KdfError> {
    let master =
        Zeroizing::new(kdf_array::<32>(transfer_secret.as_bytes(), &coin_index.to_be_bytes(), REFRESH_INFO)?);
    let coin_priv = Zeroizing::new(kdf_array::<32>(&master[..], REFRESH_COIN_SALT, &[])?);
    let bks = Zeroizing::new(kdf_array::<32>(&master[..], REFRESH_BKS_SALT, &[])?);
    Ok(FreshCoin::from_parts(*coin_priv, *bks))
}

/// The `index`-th transfer key pair of a refresh session.
pub fn setup_refresh_transfer_pub(secret_seed: &[u8], index: u32) -> Result<EcdheKeyPair, KdfError> {
    let private = kdf_array::<32>(secret_seed, &index.to_be_bytes(), TRANSFER_INFO)?;
    Ok(EcdheKeyPair::from_private(EcdhePrivateKey::from_bytes(private)))
}

/// The nonce and `R` pair an exchange hands out before a CS withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsWithdrawValues {
    pub nonce: CsNonce,
    pub r_pub_0: CsRPublic,
    pub r_pub_1: CsRPublic,
}

impl CsWithdrawValues {
    pub fn r_pub(&self) -> [CsRPublic; 2] {
        [self.r_pub_0, self.r_pub_1]
    }
}

/// The exchange values a planchet was blinded with.
pub fn exchange_values(cs_values: Option<&CsWithdrawValues>) -> ExchangeWithdrawValues {
    match cs_values {
        None => ExchangeWithdrawValues::Rsa,
        Some(v) => ExchangeWithdrawValues::ClauseSchnorr { r_pub_0: v.r_pub_0, r_pub_1: v.r_pub_1 },
    }
}

/// Blind a fresh coin for `denom_pub`.
///
/// For RSA the coin's own blinding key secret is used. For CS the blinding seed is derived from the coin private
/// key and the exchange's `R` pair, and that seed becomes the planchet's blinding key.
pub fn blind_planchet(
    denom_pub: &DenominationPubKey,
    coin: &FreshCoin,
    age_commitment_hash: Option<&AgeCommitmentHash>,
    cs_values: Option<&CsWithdrawValues>,
) -> Result<(CoinEnvelope, BlindingKeySecret), CryptoError> {
    let hm = hash_coin_pub(&coin.coin_pub, age_commitment_hash);
    match denom_pub {
        DenominationPubKey::Rsa { rsa_public_key, .. } => {
            let blinded = rsa_blind(hm.as_bytes(), coin.bks.as_bytes(), rsa_public_key)?;
            Ok((CoinEnvelope::Rsa { rsa_blinded_planchet: blinded }, coin.bks.clone()))
        }
        DenominationPubKey::ClauseSchnorr { cs_public_key, .. } => {
            let values = cs_values
                .ok_or_else(|| CryptoError::invalid_input("a CS planchet needs the exchange's nonce and R values"))?;
            let r_pub = values.r_pub();
            let bseed = derive_bseed(&coin.coin_priv, &r_pub)?;
            let [c0, c1] = cs_blind(&bseed, &r_pub, cs_public_key, hm.as_bytes())?;
            let envelope = CoinEnvelope::ClauseSchnorr { cs_nonce: values.nonce, cs_blinded_c0: c0, cs_blinded_c1: c1 };
            Ok((envelope, BlindingKeySecret::from_bytes(*bseed.as_bytes())))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanchetCreationRequest {
    pub secret_seed: SecretSeed,
    pub coin_index: u32,
    pub value: Amount,
    #[serde(default)]
    pub fee_withdraw: Option<Amount>,
    pub denom_pub: DenominationPubKey,
    pub reserve_pub: EddsaPublicKey,
    pub reserve_priv: EddsaPrivateKey,
    #[serde(default)]
    pub restrict_age: Option<u32>,
    #[serde(default)]
    pub cs_values: Option<CsWithdrawValues>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalPlanchet {
    pub coin_pub: EddsaPublicKey,
    pub coin_priv: EddsaPrivateKey,
    pub reserve_pub: EddsaPublicKey,
    pub denom_pub_hash: HashCode,
    pub denom_pub: DenominationPubKey,
    pub blinding_key: BlindingKeySecret,
    pub withdraw_sig: EddsaSignature,
    pub coin_ev: CoinEnvelope,
    pub coin_value: Amount,
    pub coin_ev_hash: HashCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_commitment_proof: Option<AgeCommitmentProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cs_values: Option<CsWithdrawValues>,
}

impl WithdrawalPlanchet {
    pub fn unblind_info(&self) -> PlanchetUnblindInfo {
        PlanchetUnblindInfo {
            denom_pub: self.denom_pub.clone(),
            blinding_key: self.blinding_key.clone(),
            cs_values: self.cs_values.clone(),
        }
    }

    pub fn age_commitment_hash(&self) -> Option<AgeCommitmentHash> {
        self.age_commitment_proof.as_ref().map(|p| p.commitment.hash())
    }
}

/// Derive, blind and sign the withdrawal request for coin `coin_index` of a reserve.
///
/// On an age-restricted denomination the coin commits to `restrict_age`, or to [`AGE_UNRESTRICTED`] if no
/// restriction was asked for.
pub fn create_planchet(req: &PlanchetCreationRequest) -> Result<WithdrawalPlanchet, CryptoError> {
    let fee = req
        .fee_withdraw
        .as_ref()
        .ok_or_else(|| CryptoError::invalid_input("the denomination has no withdraw fee"))?;
    let amount_with_fee = req.value.add(fee)?.checked().ok_or(CryptoError::Saturated("coin value plus withdraw fee"))?;
    let coin = setup_withdraw_planchet(req.secret_seed.as_bytes(), req.coin_index)?;

    let age_commitment_proof = match req.denom_pub.age_mask()? {
        Some(mask) => {
            let age = req.restrict_age.filter(|a| *a > 0).unwrap_or(AGE_UNRESTRICTED);
            info!("Creating age-restricted planchet (age {age})");
            Some(restriction_commit(mask, age))
        }
        None => None,
    };
    let ach = age_commitment_proof.as_ref().map(|p| p.commitment.hash());

    let (coin_ev, blinding_key) = blind_planchet(&req.denom_pub, &coin, ach.as_ref(), req.cs_values.as_ref())?;
    let denom_pub_hash = req.denom_pub.hash();
    let coin_ev_hash = hash_coin_ev(&coin_ev, &denom_pub_hash);
    let withdraw_request = build_sig_ps(SignaturePurpose::WalletReserveWithdraw)
        .put_amount(&amount_with_fee)
        .put(denom_pub_hash)
        .put(coin_ev_hash)
        .build();
    let withdraw_sig = eddsa_sign(&withdraw_request, &req.reserve_priv);
    debug!("Derived withdrawal planchet #{} ({})", req.coin_index, req.denom_pub.cipher());

    Ok(WithdrawalPlanchet {
        coin_pub: coin.coin_pub,
        coin_priv: coin.coin_priv,
        reserve_pub: req.reserve_pub,
        denom_pub_hash,
        denom_pub: req.denom_pub.clone(),
        blinding_key,
        withdraw_sig,
        coin_ev,
        coin_value: req.value.clone(),
        coin_ev_hash,
        age_commitment_proof,
        cs_values: req.cs_values.clone(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveTipRequest {
    pub secret_seed: SecretSeed,
    pub denom_pub: DenominationPubKey,
    pub planchet_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedTipPlanchet {
    pub blinding_key: BlindingKeySecret,
    pub coin_ev: CoinEnvelope,
    pub coin_ev_hash: HashCode,
    pub coin_priv: EddsaPrivateKey,
    pub coin_pub: EddsaPublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_commitment_proof: Option<AgeCommitmentProof>,
}

/// Derive the planchet for a tip. Only RSA denominations are supported.
///
/// A tip coin on an age-restricted denomination carries an unrestricted commitment seeded from its blinding key
/// secret, so picking the tip up again yields the same planchet.
pub fn create_tip_planchet(req: &DeriveTipRequest) -> Result<DerivedTipPlanchet, CryptoError> {
    if req.denom_pub.cipher() != DenomKeyType::Rsa {
        return Err(CryptoError::UnsupportedCipher(req.denom_pub.cipher()));
    }
    let coin = setup_tip_planchet(req.secret_seed.as_bytes(), req.planchet_index)?;
    let age_commitment_proof = match req.denom_pub.age_mask()? {
        Some(mask) => Some(restriction_commit_seeded(mask, AGE_UNRESTRICTED, coin.bks.as_bytes())?),
        None => None,
    };
    let ach = age_commitment_proof.as_ref().map(|p| p.commitment.hash());
    let (coin_ev, blinding_key) = blind_planchet(&req.denom_pub, &coin, ach.as_ref(), None)?;
    let coin_ev_hash = hash_coin_ev(&coin_ev, &req.denom_pub.hash());
    debug!("Derived tip planchet #{}", req.planchet_index);
    Ok(DerivedTipPlanchet {
        blinding_key,
        coin_ev,
        coin_ev_hash,
        coin_priv: coin.coin_priv,
        coin_pub: coin.coin_pub,
        age_commitment_proof,
    })
}

/// What a wallet keeps about a planchet in order to unblind the exchange's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanchetUnblindInfo {
    pub denom_pub: DenominationPubKey,
    pub blinding_key: BlindingKeySecret,
    #[serde(default)]
    pub cs_values: Option<CsWithdrawValues>,
}

pub fn unblind_denomination_signature(
    info: &PlanchetUnblindInfo,
    blind_sig: &BlindedDenominationSignature,
) -> Result<UnblindedSignature, CryptoError> {
    match (blind_sig, &info.denom_pub) {
        (
            BlindedDenominationSignature::Rsa { blinded_rsa_signature },
            DenominationPubKey::Rsa { rsa_public_key, .. },
        ) => {
            let rsa_signature = rsa_unblind(blinded_rsa_signature, rsa_public_key, info.blinding_key.as_bytes())?;
            Ok(UnblindedSignature::Rsa { rsa_signature })
        }
        (
            BlindedDenominationSignature::ClauseSchnorr { b, s },
            DenominationPubKey::ClauseSchnorr { cs_public_key, .. },
        ) => {
            let values = info
                .cs_values
                .as_ref()
                .ok_or_else(|| CryptoError::invalid_input("unblinding a CS signature needs the R values"))?;
            let bseed = CsBlindingSeed::from_bytes(*info.blinding_key.as_bytes());
            let sig = cs_unblind(&bseed, &values.r_pub(), cs_public_key, &CsBlindSignature { b: *b, s: *s })?;
            Ok(sig.into())
        }
        _ => Err(CryptoError::CipherMismatch { expected: info.denom_pub.cipher(), actual: blind_sig.cipher() }),
    }
}
