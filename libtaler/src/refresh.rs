//! The refresh (melt) session.
//!
//! Melting a coin turns its remaining value into fresh coins that cannot be linked to it. The wallet prepares κ
//! candidate sets of planchets, each derived from its own transfer key, and commits to all of them with a single
//! session hash that the melted coin signs. The exchange then picks one candidate to be revealed and checks it
//! against the commitment; the other candidates stay private.
//!
//! The session hash covers, in this order:
//! 1. the κ transfer public keys,
//! 2. the hash of the denomination of every new coin (repeated `count` times per denomination),
//! 3. the melted coin's public key,
//! 4. the melted value including all fees,
//! 5. for each candidate, the cipher tag and body of every envelope.

use crate::age_restriction::{commitment_derive, AgeCommitmentProof, AGE_UNRESTRICTED};
use crate::amount::Amount;
use crate::cryptography::ecdh::key_exchange_ecdhe_eddsa;
use crate::cryptography::hash::{HashCode, HashContext};
use crate::cryptography::keys::{
    eddsa_sign, EcdhePrivateKey, EcdhePublicKey, EddsaPrivateKey, EddsaPublicKey, EddsaSignature,
};
use crate::cryptography::purpose::{amount_to_buffer, build_sig_ps, SignaturePurpose};
use crate::denomination::{hash_coin_ev, hash_coin_ev_inner, CoinEnvelope, DenomKeyType, DenominationPubKey};
use crate::error::CryptoError;
use crate::planchet::{
    blind_planchet, setup_refresh_planchet, setup_refresh_transfer_pub, BlindingKeySecret, SecretSeed,
};
use log::*;
use serde::{Deserialize, Serialize};

/// One target denomination of a melt and how many coins of it to mint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshNewDenomInfo {
    pub count: u32,
    pub value: Amount,
    #[serde(default)]
    pub fee_withdraw: Option<Amount>,
    pub denom_pub: DenominationPubKey,
}

/// Cut-and-choose parameter used when a request does not name one.
pub const DEFAULT_KAPPA: u32 = 3;

fn default_max_age() -> u32 {
    AGE_UNRESTRICTED
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveRefreshSessionRequest {
    pub session_secret_seed: SecretSeed,
    /// Number of candidate sets. [`DEFAULT_KAPPA`] when absent.
    #[serde(default)]
    pub kappa: Option<u32>,
    pub melt_coin_pub: EddsaPublicKey,
    pub melt_coin_priv: EddsaPrivateKey,
    pub melt_coin_denom_pub_hash: HashCode,
    #[serde(default = "default_max_age")]
    pub melt_coin_max_age: u32,
    #[serde(default)]
    pub melt_coin_age_commitment_proof: Option<AgeCommitmentProof>,
    pub new_coin_denoms: Vec<RefreshNewDenomInfo>,
    pub fee_refresh: Amount,
}

impl DeriveRefreshSessionRequest {
    pub fn kappa(&self) -> u32 {
        self.kappa.unwrap_or(DEFAULT_KAPPA)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPlanchetInfo {
    pub coin_pub: EddsaPublicKey,
    pub coin_priv: EddsaPrivateKey,
    pub coin_ev: CoinEnvelope,
    pub coin_ev_hash: HashCode,
    pub blinding_key: BlindingKeySecret,
    pub max_age: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_commitment_proof: Option<AgeCommitmentProof>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshSession {
    pub melt_coin_pub: EddsaPublicKey,
    pub confirm_sig: EddsaSignature,
    pub planchets_for_gammas: Vec<Vec<RefreshPlanchetInfo>>,
    pub transfer_pubs: Vec<EcdhePublicKey>,
    pub transfer_privs: Vec<EcdhePrivateKey>,
    pub hash: HashCode,
    pub melt_value_with_fee: Amount,
}

/// The material disclosed for the candidate the exchange asked to see.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedCandidate {
    pub index: u32,
    pub transfer_priv: EcdhePrivateKey,
    pub transfer_pub: EcdhePublicKey,
    pub planchets: Vec<RefreshPlanchetInfo>,
    /// The transfer public keys of the other κ-1 candidates, in session order.
    pub other_transfer_pubs: Vec<EcdhePublicKey>,
}

impl RefreshSession {
    pub fn kappa(&self) -> usize {
        self.transfer_pubs.len()
    }

    /// Disclose candidate `index`. Nothing private about the other candidates is included.
    pub fn reveal(&self, index: usize) -> Result<RevealedCandidate, CryptoError> {
        let kappa = self.kappa();
        if index >= kappa {
            return Err(CryptoError::invalid_input(format!("reveal index {index} is out of range for kappa {kappa}")));
        }
        let other_transfer_pubs =
            self.transfer_pubs.iter().enumerate().filter(|(i, _)| *i != index).map(|(_, k)| *k).collect();
        Ok(RevealedCandidate {
            index: index as u32,
            transfer_priv: self.transfer_privs[index].clone(),
            transfer_pub: self.transfer_pubs[index],
            planchets: self.planchets_for_gammas[index].clone(),
            other_transfer_pubs,
        })
    }

    /// The envelopes of every candidate, in session order.
    pub fn envelopes(&self) -> Vec<Vec<CoinEnvelope>> {
        self.planchets_for_gammas.iter().map(|c| c.iter().map(|p| p.coin_ev.clone()).collect()).collect()
    }
}

/// `Σ (value + fee_withdraw) · count + melt_fee`. Any saturation aborts.
pub fn melt_value_with_fee(new_coin_denoms: &[RefreshNewDenomInfo], melt_fee: &Amount) -> Result<Amount, CryptoError> {
    let first = new_coin_denoms.first().ok_or_else(|| CryptoError::invalid_input("no new coins requested"))?;
    let mut total = Amount::zero(first.value.currency())?;
    for denom in new_coin_denoms {
        let fee = denom
            .fee_withdraw
            .as_ref()
            .ok_or_else(|| CryptoError::invalid_input("a new coin denomination has no withdraw fee"))?;
        let per_coin = denom.value.add(fee)?.checked().ok_or(CryptoError::Saturated("coin value plus withdraw fee"))?;
        let subtotal = per_coin.mult(denom.count as u64).checked().ok_or(CryptoError::Saturated("new coin subtotal"))?;
        total = total.add(&subtotal)?.checked().ok_or(CryptoError::Saturated("melt value"))?;
    }
    total.add(melt_fee)?.checked().ok_or(CryptoError::Saturated("melt value with fee"))
}

fn expanded_denom_hashes(new_coin_denoms: &[RefreshNewDenomInfo]) -> Vec<HashCode> {
    new_coin_denoms
        .iter()
        .flat_map(|d| {
            let h = d.denom_pub.hash();
            std::iter::repeat(h).take(d.count as usize)
        })
        .collect()
}

/// Rebuild the session hash from what the exchange sees of a session.
///
/// `denom_pub_hashes` holds one entry per new coin; `envelopes` one list per candidate.
pub fn recompute_session_hash(
    transfer_pubs: &[EcdhePublicKey],
    denom_pub_hashes: &[HashCode],
    melt_coin_pub: &EddsaPublicKey,
    value_with_fee: &Amount,
    envelopes: &[Vec<CoinEnvelope>],
) -> HashCode {
    let mut ctx = HashContext::new();
    for pub_key in transfer_pubs {
        ctx.update(pub_key.as_bytes());
    }
    for h in denom_pub_hashes {
        ctx.update(h.as_bytes());
    }
    ctx.update(melt_coin_pub.as_bytes());
    ctx.update(&amount_to_buffer(value_with_fee));
    for candidate in envelopes {
        for envelope in candidate {
            hash_coin_ev_inner(envelope, &mut ctx);
        }
    }
    ctx.finish()
}

/// Derive the planchets of the candidate belonging to `transfer_priv`.
///
/// The transfer secret shared with the melted coin seeds every planchet and, if the melted coin carries an age
/// commitment, salts the commitment each new coin inherits.
pub fn derive_candidate_planchets(
    transfer_priv: &EcdhePrivateKey,
    req: &DeriveRefreshSessionRequest,
) -> Result<Vec<RefreshPlanchetInfo>, CryptoError> {
    let transfer_secret = key_exchange_ecdhe_eddsa(transfer_priv, &req.melt_coin_pub)?;
    let mut planchets = Vec::new();
    for denom in &req.new_coin_denoms {
        let denom_pub_hash = denom.denom_pub.hash();
        for _ in 0..denom.count {
            let coin_index = planchets.len() as u32;
            let coin = setup_refresh_planchet(&transfer_secret, coin_index)?;
            let age_commitment_proof = req
                .melt_coin_age_commitment_proof
                .as_ref()
                .map(|proof| commitment_derive(proof, transfer_secret.as_bytes()))
                .transpose()?;
            let ach = age_commitment_proof.as_ref().map(|p| p.commitment.hash());
            let (coin_ev, blinding_key) = blind_planchet(&denom.denom_pub, &coin, ach.as_ref(), None)?;
            let coin_ev_hash = hash_coin_ev(&coin_ev, &denom_pub_hash);
            planchets.push(RefreshPlanchetInfo {
                coin_pub: coin.coin_pub,
                coin_priv: coin.coin_priv,
                coin_ev,
                coin_ev_hash,
                blinding_key,
                max_age: req.melt_coin_max_age,
                age_commitment_proof,
            });
        }
    }
    Ok(planchets)
}

fn validate_request(req: &DeriveRefreshSessionRequest) -> Result<(), CryptoError> {
    if req.kappa() == 0 {
        return Err(CryptoError::invalid_input("kappa must be at least 1"));
    }
    if req.new_coin_denoms.is_empty() {
        return Err(CryptoError::invalid_input("no new coins requested"));
    }
    for denom in &req.new_coin_denoms {
        if denom.fee_withdraw.is_none() {
            return Err(CryptoError::invalid_input("a new coin denomination has no withdraw fee"));
        }
        if denom.denom_pub.cipher() != DenomKeyType::Rsa {
            return Err(CryptoError::UnsupportedCipher(denom.denom_pub.cipher()));
        }
    }
    Ok(())
}

/// Build a complete refresh session. Either every candidate is derived or the whole session fails.
pub fn derive_refresh_session(req: &DeriveRefreshSessionRequest) -> Result<RefreshSession, CryptoError> {
    validate_request(req)?;
    let value_with_fee = melt_value_with_fee(&req.new_coin_denoms, &req.fee_refresh)?;

    let kappa = req.kappa();
    let mut transfer_pubs = Vec::with_capacity(kappa as usize);
    let mut transfer_privs = Vec::with_capacity(kappa as usize);
    for i in 0..kappa {
        let keys = setup_refresh_transfer_pub(req.session_secret_seed.as_bytes(), i)?;
        transfer_pubs.push(keys.public);
        transfer_privs.push(keys.private);
    }

    let mut planchets_for_gammas = Vec::with_capacity(kappa as usize);
    for (i, transfer_priv) in transfer_privs.iter().enumerate() {
        trace!("Deriving refresh candidate {i} of {kappa}");
        planchets_for_gammas.push(derive_candidate_planchets(transfer_priv, req)?);
    }

    let envelopes: Vec<Vec<CoinEnvelope>> =
        planchets_for_gammas.iter().map(|c| c.iter().map(|p| p.coin_ev.clone()).collect()).collect();
    let hash = recompute_session_hash(
        &transfer_pubs,
        &expanded_denom_hashes(&req.new_coin_denoms),
        &req.melt_coin_pub,
        &value_with_fee,
        &envelopes,
    );

    let h_age_commitment = req
        .melt_coin_age_commitment_proof
        .as_ref()
        .map(|p| p.commitment.hash().to_bytes())
        .unwrap_or([0u8; 32]);
    let confirm_data = build_sig_ps(SignaturePurpose::WalletCoinMelt)
        .put(hash)
        .put(req.melt_coin_denom_pub_hash)
        .put(h_age_commitment)
        .put_amount(&value_with_fee)
        .put_amount(&req.fee_refresh)
        .build();
    let confirm_sig = eddsa_sign(&confirm_data, &req.melt_coin_priv);
    debug!(
        "Derived refresh session with kappa={} and {} new coins per candidate",
        kappa,
        planchets_for_gammas.first().map(Vec::len).unwrap_or_default()
    );

    Ok(RefreshSession {
        melt_coin_pub: req.melt_coin_pub,
        confirm_sig,
        planchets_for_gammas,
        transfer_pubs,
        transfer_privs,
        hash,
        melt_value_with_fee: value_with_fee,
    })
}
