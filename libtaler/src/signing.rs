//! Wallet-side protocol signatures.
//!
//! Each helper frames its fields in the exact order the exchange (or merchant) rebuilds them and signs or verifies
//! the result with EdDSA. Hashes are 64 bytes, short hashes 32, amounts 24 and timestamps 8 (microseconds, BE).

use crate::age_restriction::{commitment_attest, AgeCommitmentHash, AgeCommitmentProof};
use crate::amount::Amount;
use crate::cryptography::edx25519::{EdxPublicKey, EdxSignature};
use crate::cryptography::hash::{hash_string, hash_truncate32, HashCode};
use crate::cryptography::keys::{
    eddsa_sign, eddsa_verify, EcdheKeyPair, EcdhePrivateKey, EcdhePublicKey, EddsaKeyPair, EddsaPrivateKey,
    EddsaPublicKey, EddsaSignature,
};
use crate::cryptography::purpose::{build_sig_ps, SignaturePurpose};
use crate::denomination::{
    hash_coin_ev, CoinEnvelope, DenomKeyType, DenominationPubKey, ExchangeWithdrawValues, UnblindedSignature,
};
use crate::error::CryptoError;
use crate::helpers::{Duration, Timestamp};
use crate::planchet::BlindingKeySecret;
use log::*;
use serde::{Deserialize, Serialize};

const NO_EXTENSIONS: [u8; 64] = [0u8; 64];
const NO_AGE_COMMITMENT: [u8; 32] = [0u8; 32];

pub fn create_eddsa_keypair() -> EddsaKeyPair {
    EddsaKeyPair::random()
}

pub fn create_ecdhe_keypair() -> EcdheKeyPair {
    EcdheKeyPair::random()
}

pub fn eddsa_get_public(private: &EddsaPrivateKey) -> EddsaPublicKey {
    private.public_key()
}

pub fn ecdhe_get_public(private: &EcdhePrivateKey) -> EcdhePublicKey {
    private.public_key()
}

fn checked(valid: bool, what: &str) -> bool {
    if !valid {
        warn!("Invalid {what} signature");
    }
    valid
}

//----------------------------------------   Deposit   ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInfo {
    pub exchange_base_url: String,
    pub contract_terms_hash: HashCode,
    pub coin_pub: EddsaPublicKey,
    pub coin_priv: EddsaPrivateKey,
    pub spend_amount: Amount,
    pub fee_deposit: Amount,
    pub wire_info_hash: HashCode,
    pub denom_pub_hash: HashCode,
    pub denom_sig: UnblindedSignature,
    pub timestamp: Timestamp,
    pub refund_deadline: Timestamp,
    pub merchant_pub: EddsaPublicKey,
    #[serde(default)]
    pub required_minimum_age: Option<u32>,
    #[serde(default)]
    pub age_commitment_proof: Option<AgeCommitmentProof>,
}

/// What the wallet sends to the merchant for every coin it pays with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinDepositPermission {
    pub coin_pub: EddsaPublicKey,
    pub coin_sig: EddsaSignature,
    pub contribution: String,
    pub h_denom: HashCode,
    pub exchange_url: String,
    pub ub_sig: UnblindedSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_age_sig: Option<EdxSignature>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_commitment: Option<Vec<EdxPublicKey>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h_age_commitment: Option<AgeCommitmentHash>,
}

/// Sign a coin's contribution to a payment.
///
/// When the merchant requires a minimum age, the permission carries an attestation and the commitment's public
/// keys. Otherwise an age-restricted coin only discloses its commitment hash.
pub fn sign_deposit_permission(info: &DepositInfo) -> Result<CoinDepositPermission, CryptoError> {
    let ach = info.age_commitment_proof.as_ref().map(|p| p.commitment.hash());
    let data = build_sig_ps(SignaturePurpose::WalletCoinDeposit)
        .put(info.contract_terms_hash)
        .put(ach.map(|h| h.to_bytes()).unwrap_or(NO_AGE_COMMITMENT))
        .put(NO_EXTENSIONS)
        .put(info.wire_info_hash)
        .put(info.denom_pub_hash)
        .put_timestamp(&info.timestamp)
        .put_timestamp(&info.refund_deadline)
        .put_amount(&info.spend_amount)
        .put_amount(&info.fee_deposit)
        .put(info.merchant_pub)
        .build();
    let coin_sig = eddsa_sign(&data, &info.coin_priv);

    let mut permission = CoinDepositPermission {
        coin_pub: info.coin_pub,
        coin_sig,
        contribution: info.spend_amount.to_string(),
        h_denom: info.denom_pub_hash,
        exchange_url: info.exchange_base_url.clone(),
        ub_sig: info.denom_sig.clone(),
        minimum_age_sig: None,
        age_commitment: None,
        h_age_commitment: None,
    };
    match (info.required_minimum_age, &info.age_commitment_proof) {
        (Some(min_age), Some(proof)) => {
            permission.minimum_age_sig = Some(commitment_attest(proof, min_age)?);
            permission.age_commitment = Some(proof.commitment.public_keys.clone());
        }
        (None, Some(_)) => permission.h_age_commitment = ach,
        (_, None) => {}
    }
    Ok(permission)
}

//----------------------------------------   Recoup   ----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecoupRequest {
    pub blinding_key: BlindingKeySecret,
    pub coin_pub: EddsaPublicKey,
    pub coin_priv: EddsaPrivateKey,
    pub denom_pub: DenominationPubKey,
    pub denom_pub_hash: HashCode,
    pub denom_sig: UnblindedSignature,
}

/// The body of a recoup or recoup-refresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoupRequest {
    pub coin_blind_key_secret: BlindingKeySecret,
    pub coin_sig: EddsaSignature,
    pub denom_pub_hash: HashCode,
    pub denom_sig: UnblindedSignature,
    pub ewv: ExchangeWithdrawValues,
}

fn recoup(req: &CreateRecoupRequest, purpose: SignaturePurpose) -> Result<RecoupRequest, CryptoError> {
    // A CS recoup would need the exchange's withdraw values, which are not kept with the coin.
    if req.denom_pub.cipher() != DenomKeyType::Rsa {
        return Err(CryptoError::UnsupportedCipher(req.denom_pub.cipher()));
    }
    let data = build_sig_ps(purpose).put(req.denom_pub_hash).put(req.blinding_key.as_bytes()).build();
    Ok(RecoupRequest {
        coin_blind_key_secret: req.blinding_key.clone(),
        coin_sig: eddsa_sign(&data, &req.coin_priv),
        denom_pub_hash: req.denom_pub_hash,
        denom_sig: req.denom_sig.clone(),
        ewv: ExchangeWithdrawValues::Rsa,
    })
}

/// Ask the exchange to refund a withdrawn coin of a revoked denomination to its reserve.
pub fn create_recoup_request(req: &CreateRecoupRequest) -> Result<RecoupRequest, CryptoError> {
    recoup(req, SignaturePurpose::WalletCoinRecoup)
}

/// Ask the exchange to refund a refreshed coin of a revoked denomination to the coin it was melted from.
pub fn create_recoup_refresh_request(req: &CreateRecoupRequest) -> Result<RecoupRequest, CryptoError> {
    recoup(req, SignaturePurpose::WalletCoinRecoupRefresh)
}

//----------------------------------------   Link and merchant   -----------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignCoinLinkRequest {
    pub old_coin_priv: EddsaPrivateKey,
    pub new_denom_hash: HashCode,
    pub transfer_pub: EcdhePublicKey,
    pub coin_ev: CoinEnvelope,
}

pub fn sign_coin_link(req: &SignCoinLinkRequest) -> EddsaSignature {
    let coin_ev_hash = hash_coin_ev(&req.coin_ev, &req.new_denom_hash);
    let data = build_sig_ps(SignaturePurpose::WalletCoinLink)
        .put(req.new_denom_hash)
        .put(req.transfer_pub)
        .put(NO_AGE_COMMITMENT)
        .put(coin_ev_hash)
        .build();
    eddsa_sign(&data, &req.old_coin_priv)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignTrackTransactionRequest {
    pub contract_terms_hash: HashCode,
    pub wire_hash: HashCode,
    pub coin_pub: EddsaPublicKey,
    pub merchant_pub: EddsaPublicKey,
    pub merchant_priv: EddsaPrivateKey,
}

pub fn sign_track_transaction(req: &SignTrackTransactionRequest) -> EddsaSignature {
    let data = build_sig_ps(SignaturePurpose::MerchantTrackTransaction)
        .put(req.contract_terms_hash)
        .put(req.wire_hash)
        .put(req.merchant_pub)
        .put(req.coin_pub)
        .build();
    eddsa_sign(&data, &req.merchant_priv)
}

pub fn is_valid_payment_signature(
    contract_hash: &HashCode,
    sig: &EddsaSignature,
    merchant_pub: &EddsaPublicKey,
) -> bool {
    let data = build_sig_ps(SignaturePurpose::MerchantPaymentOk).put(contract_hash).build();
    checked(eddsa_verify(&data, sig, merchant_pub), "payment")
}

pub fn is_valid_contract_terms_signature(
    contract_terms_hash: &HashCode,
    sig: &EddsaSignature,
    merchant_pub: &EddsaPublicKey,
) -> bool {
    let data = build_sig_ps(SignaturePurpose::MerchantContract).put(contract_terms_hash).build();
    checked(eddsa_verify(&data, sig, merchant_pub), "contract terms")
}

//----------------------------------------   Exchange master signatures   --------------------------------------

/// Check the exchange's signature on one of its bank accounts. The payto URI is hashed with a trailing NUL.
pub fn is_valid_wire_account(payto_uri: &str, sig: &EddsaSignature, master_pub: &EddsaPublicKey) -> bool {
    let payto_hash = hash_truncate32(format!("{payto_uri}\0").as_bytes());
    let data = build_sig_ps(SignaturePurpose::MasterWireDetails).put(payto_hash).build();
    checked(eddsa_verify(&data, sig, master_pub), "wire account")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFee {
    pub start_stamp: Timestamp,
    pub end_stamp: Timestamp,
    pub wire_fee: Amount,
    pub closing_fee: Amount,
    pub sig: EddsaSignature,
}

pub fn is_valid_wire_fee(wire_type: &str, fee: &WireFee, master_pub: &EddsaPublicKey) -> bool {
    let data = build_sig_ps(SignaturePurpose::MasterWireFees)
        .put(hash_string(wire_type))
        .put_timestamp(&fee.start_stamp)
        .put_timestamp(&fee.end_stamp)
        .put_amount(&fee.wire_fee)
        .put_amount(&fee.closing_fee)
        .build();
    checked(eddsa_verify(&data, &fee.sig, master_pub), "wire fee")
}

/// The exchange's fees for reserves and purses, with the validity window they apply to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalFees {
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub history_fee: Amount,
    pub account_fee: Amount,
    pub purse_fee: Amount,
    pub history_expiration: Duration,
    pub purse_timeout: Duration,
    pub purse_account_limit: u32,
    pub master_sig: EddsaSignature,
}

pub fn is_valid_global_fees(fees: &GlobalFees, master_pub: &EddsaPublicKey) -> bool {
    let data = build_sig_ps(SignaturePurpose::MasterGlobalFees)
        .put_timestamp(&fees.start_date)
        .put_timestamp(&fees.end_date)
        .put_duration(&fees.purse_timeout)
        .put_duration(&fees.history_expiration)
        .put_amount(&fees.history_fee)
        .put_amount(&fees.account_fee)
        .put_amount(&fees.purse_fee)
        .put_u32(fees.purse_account_limit)
        .build();
    checked(eddsa_verify(&data, &fees.master_sig, master_pub), "global fees")
}

/// The signed part of a denomination announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenominationValidity {
    pub denom_pub_hash: HashCode,
    pub value: Amount,
    pub fee_withdraw: Amount,
    pub fee_deposit: Amount,
    pub fee_refresh: Amount,
    pub fee_refund: Amount,
    pub stamp_start: Timestamp,
    pub stamp_expire_withdraw: Timestamp,
    pub stamp_expire_deposit: Timestamp,
    pub stamp_expire_legal: Timestamp,
    pub master_sig: EddsaSignature,
}

pub fn is_valid_denom(denom: &DenominationValidity, master_pub: &EddsaPublicKey) -> bool {
    let data = build_sig_ps(SignaturePurpose::MasterDenominationKeyValidity)
        .put(master_pub)
        .put_timestamp(&denom.stamp_start)
        .put_timestamp(&denom.stamp_expire_withdraw)
        .put_timestamp(&denom.stamp_expire_deposit)
        .put_timestamp(&denom.stamp_expire_legal)
        .put_amount(&denom.value)
        .put_amount(&denom.fee_withdraw)
        .put_amount(&denom.fee_deposit)
        .put_amount(&denom.fee_refresh)
        .put_amount(&denom.fee_refund)
        .put(denom.denom_pub_hash)
        .build();
    checked(eddsa_verify(&data, &denom.master_sig, master_pub), "denomination")
}

//----------------------------------------   Purses   ----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPurseCreationRequest {
    pub purse_priv: EddsaPrivateKey,
    pub purse_expiration: Timestamp,
    pub purse_amount: Amount,
    pub h_contract_terms: HashCode,
    pub merge_pub: EddsaPublicKey,
    #[serde(default)]
    pub min_age: u32,
}

pub fn sign_purse_creation(req: &SignPurseCreationRequest) -> EddsaSignature {
    let data = build_sig_ps(SignaturePurpose::WalletPurseCreate)
        .put_timestamp(&req.purse_expiration)
        .put_amount(&req.purse_amount)
        .put(req.h_contract_terms)
        .put(req.merge_pub)
        .put_u32(req.min_age)
        .build();
    eddsa_sign(&data, &req.purse_priv)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurseCoin {
    pub coin_pub: EddsaPublicKey,
    pub coin_priv: EddsaPrivateKey,
    pub contribution: Amount,
    pub denom_pub_hash: HashCode,
    pub denom_sig: UnblindedSignature,
    #[serde(default)]
    pub age_commitment_proof: Option<AgeCommitmentProof>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPurseDepositsRequest {
    pub purse_pub: EddsaPublicKey,
    pub exchange_base_url: String,
    pub coins: Vec<PurseCoin>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurseDeposit {
    pub amount: String,
    pub coin_pub: EddsaPublicKey,
    pub coin_sig: EddsaSignature,
    pub denom_pub_hash: HashCode,
    pub ub_sig: UnblindedSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_commitment: Option<Vec<EdxPublicKey>>,
}

/// Sign each coin's deposit into a purse. The exchange URL is bound into every signature.
pub fn sign_purse_deposits(req: &SignPurseDepositsRequest) -> Vec<PurseDeposit> {
    let h_exchange_base_url = hash_string(&req.exchange_base_url);
    req.coins
        .iter()
        .map(|coin| {
            let ach = coin.age_commitment_proof.as_ref().map(|p| p.commitment.hash().to_bytes());
            let data = build_sig_ps(SignaturePurpose::WalletPurseDeposit)
                .put_amount(&coin.contribution)
                .put(coin.denom_pub_hash)
                .put(ach.unwrap_or(NO_AGE_COMMITMENT))
                .put(req.purse_pub)
                .put(h_exchange_base_url)
                .build();
            PurseDeposit {
                amount: coin.contribution.to_string(),
                coin_pub: coin.coin_pub,
                coin_sig: eddsa_sign(&data, &coin.coin_priv),
                denom_pub_hash: coin.denom_pub_hash,
                ub_sig: coin.denom_sig.clone(),
                age_commitment: coin.age_commitment_proof.as_ref().map(|p| p.commitment.public_keys.clone()),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPurseMergeRequest {
    pub merge_timestamp: Timestamp,
    pub purse_pub: EddsaPublicKey,
    pub reserve_payto: String,
    pub merge_priv: EddsaPrivateKey,
    pub purse_expiration: Timestamp,
    pub purse_amount: Amount,
    pub purse_fee: Amount,
    pub contract_terms_hash: HashCode,
    pub reserve_priv: EddsaPrivateKey,
    #[serde(default)]
    pub min_age: u32,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignPurseMergeResponse {
    pub merge_sig: EddsaSignature,
    pub account_sig: EddsaSignature,
}

fn purse_merge_data(merge_timestamp: &Timestamp, purse_pub: &EddsaPublicKey, reserve_payto: &str) -> Vec<u8> {
    build_sig_ps(SignaturePurpose::WalletPurseMerge)
        .put_timestamp(merge_timestamp)
        .put(purse_pub)
        .put(hash_truncate32(format!("{reserve_payto}\0").as_bytes()))
        .build()
}

#[allow(clippy::too_many_arguments)]
fn account_merge_data(
    purse_expiration: &Timestamp,
    purse_amount: &Amount,
    purse_fee: &Amount,
    contract_terms_hash: &HashCode,
    purse_pub: &EddsaPublicKey,
    merge_timestamp: &Timestamp,
    min_age: u32,
    flags: u32,
) -> Vec<u8> {
    build_sig_ps(SignaturePurpose::WalletAccountMerge)
        .put_timestamp(purse_expiration)
        .put_amount(purse_amount)
        .put_amount(purse_fee)
        .put(contract_terms_hash)
        .put(purse_pub)
        .put_timestamp(merge_timestamp)
        .put_u32(min_age)
        .put_u32(flags)
        .build()
}

/// Merge a purse into a reserve: the merge key agrees to the target reserve and the reserve agrees to the terms.
pub fn sign_purse_merge(req: &SignPurseMergeRequest) -> SignPurseMergeResponse {
    let merge_data = purse_merge_data(&req.merge_timestamp, &req.purse_pub, &req.reserve_payto);
    let account_data = account_merge_data(
        &req.purse_expiration,
        &req.purse_amount,
        &req.purse_fee,
        &req.contract_terms_hash,
        &req.purse_pub,
        &req.merge_timestamp,
        req.min_age,
        req.flags,
    );
    SignPurseMergeResponse {
        merge_sig: eddsa_sign(&merge_data, &req.merge_priv),
        account_sig: eddsa_sign(&account_data, &req.reserve_priv),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignReservePurseCreateRequest {
    pub merge_timestamp: Timestamp,
    pub purse_pub: EddsaPublicKey,
    pub purse_priv: EddsaPrivateKey,
    pub reserve_payto: String,
    pub merge_priv: EddsaPrivateKey,
    pub purse_expiration: Timestamp,
    pub purse_amount: Amount,
    pub purse_fee: Amount,
    pub contract_terms_hash: HashCode,
    pub reserve_priv: EddsaPrivateKey,
    #[serde(default)]
    pub min_age: u32,
    #[serde(default)]
    pub flags: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignReservePurseCreateResponse {
    pub merge_sig: EddsaSignature,
    pub account_sig: EddsaSignature,
    pub purse_sig: EddsaSignature,
}

/// Create a purse that is merged into the caller's own reserve right away (a pull payment). The reserve pays the
/// purse fee, so all three of the purse, merge and account signatures come from one request.
pub fn sign_reserve_purse_create(req: &SignReservePurseCreateRequest) -> SignReservePurseCreateResponse {
    let merge = sign_purse_merge(&SignPurseMergeRequest {
        merge_timestamp: req.merge_timestamp,
        purse_pub: req.purse_pub,
        reserve_payto: req.reserve_payto.clone(),
        merge_priv: req.merge_priv.clone(),
        purse_expiration: req.purse_expiration,
        purse_amount: req.purse_amount.clone(),
        purse_fee: req.purse_fee.clone(),
        contract_terms_hash: req.contract_terms_hash,
        reserve_priv: req.reserve_priv.clone(),
        min_age: req.min_age,
        flags: req.flags,
    });
    let purse_sig = sign_purse_creation(&SignPurseCreationRequest {
        purse_priv: req.purse_priv.clone(),
        purse_expiration: req.purse_expiration,
        purse_amount: req.purse_amount.clone(),
        h_contract_terms: req.contract_terms_hash,
        merge_pub: req.merge_priv.public_key(),
        min_age: req.min_age,
    });
    debug!("Signed reserve purse creation for purse {}", req.purse_pub.to_crock());
    SignReservePurseCreateResponse { merge_sig: merge.merge_sig, account_sig: merge.account_sig, purse_sig }
}

//----------------------------------------   Backup sync   -----------------------------------------------------

/// Sign a backup upload. A first upload has no previous hash and signs 64 zero bytes in its place.
pub fn make_sync_signature(
    account_priv: &EddsaPrivateKey,
    old_hash: Option<&HashCode>,
    new_hash: &HashCode,
) -> EddsaSignature {
    let old = old_hash.copied().unwrap_or_else(HashCode::zeroed);
    let data = build_sig_ps(SignaturePurpose::SyncBackupUpload).put(old).put(new_hash).build();
    eddsa_sign(&data, account_priv)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::age_restriction::{commitment_verify, restriction_commit, AgeMask};
    use crate::cryptography::cs::CsPublicKey;
    use crate::cryptography::hash::hash;
    use crate::cryptography::rsa::test_key;

    fn eur(s: &str) -> Amount {
        Amount::parse(&format!("EUR:{s}")).unwrap()
    }

    fn deposit_info(coin: &EddsaKeyPair, merchant: &EddsaKeyPair) -> DepositInfo {
        DepositInfo {
            exchange_base_url: "https://exchange.example.com/".into(),
            contract_terms_hash: hash(b"contract"),
            coin_pub: coin.public,
            coin_priv: coin.private.clone(),
            spend_amount: eur("4.5"),
            fee_deposit: eur("0.01"),
            wire_info_hash: hash(b"wire"),
            denom_pub_hash: hash(b"denom"),
            denom_sig: UnblindedSignature::Rsa { rsa_signature: vec![1, 2, 3] },
            timestamp: Timestamp::new(1_700_000_000),
            refund_deadline: Timestamp::Never,
            merchant_pub: merchant.public,
            required_minimum_age: None,
            age_commitment_proof: None,
        }
    }

    fn deposit_message(info: &DepositInfo, h_age: [u8; 32]) -> Vec<u8> {
        let mut expected = Vec::new();
        expected.extend_from_slice(info.contract_terms_hash.as_bytes());
        expected.extend_from_slice(&h_age);
        expected.extend_from_slice(&[0u8; 64]);
        expected.extend_from_slice(info.wire_info_hash.as_bytes());
        expected.extend_from_slice(info.denom_pub_hash.as_bytes());
        expected.extend_from_slice(&1_700_000_000_000_000u64.to_be_bytes());
        expected.extend_from_slice(&u64::MAX.to_be_bytes());
        expected.extend_from_slice(&crate::cryptography::purpose::amount_to_buffer(&info.spend_amount));
        expected.extend_from_slice(&crate::cryptography::purpose::amount_to_buffer(&info.fee_deposit));
        expected.extend_from_slice(info.merchant_pub.as_bytes());
        build_sig_ps(SignaturePurpose::WalletCoinDeposit).put(expected).build()
    }

    #[test]
    fn deposit_permission_without_age() {
        let coin = EddsaKeyPair::random();
        let merchant = EddsaKeyPair::random();
        let info = deposit_info(&coin, &merchant);
        let permission = sign_deposit_permission(&info).unwrap();
        assert_eq!(permission.contribution, "EUR:4.5");
        assert_eq!(permission.exchange_url, info.exchange_base_url);
        assert!(permission.h_age_commitment.is_none());
        assert!(permission.minimum_age_sig.is_none());
        let msg = deposit_message(&info, [0u8; 32]);
        assert_eq!(msg.len(), 8 + 64 + 32 + 64 + 64 + 64 + 8 + 8 + 24 + 24 + 32);
        assert!(eddsa_verify(&msg, &permission.coin_sig, &coin.public));
    }

    #[test]
    fn deposit_permission_with_age() {
        let coin = EddsaKeyPair::random();
        let merchant = EddsaKeyPair::random();
        let mut info = deposit_info(&coin, &merchant);
        let proof = restriction_commit(AgeMask::from_groups(&[8, 10, 12, 14, 16, 18, 21]).unwrap(), 18);
        info.age_commitment_proof = Some(proof.clone());

        let permission = sign_deposit_permission(&info).unwrap();
        assert_eq!(permission.h_age_commitment, Some(proof.commitment.hash()));
        assert!(permission.age_commitment.is_none());
        let msg = deposit_message(&info, proof.commitment.hash().to_bytes());
        assert!(eddsa_verify(&msg, &permission.coin_sig, &coin.public));

        info.required_minimum_age = Some(16);
        let permission = sign_deposit_permission(&info).unwrap();
        assert!(permission.h_age_commitment.is_none());
        assert_eq!(permission.age_commitment.as_ref(), Some(&proof.commitment.public_keys));
        assert!(commitment_verify(&proof.commitment, permission.minimum_age_sig.as_ref().unwrap(), 16));

        info.required_minimum_age = Some(21);
        assert!(matches!(sign_deposit_permission(&info), Err(CryptoError::AgeRestriction(_))));
    }

    #[test]
    fn recoup_requests() {
        let coin = EddsaKeyPair::random();
        let denom_pub = DenominationPubKey::Rsa { rsa_public_key: test_key::public_key(), age_mask: 0 };
        let req = CreateRecoupRequest {
            blinding_key: BlindingKeySecret::from_bytes([7u8; 32]),
            coin_pub: coin.public,
            coin_priv: coin.private.clone(),
            denom_pub_hash: denom_pub.hash(),
            denom_pub,
            denom_sig: UnblindedSignature::Rsa { rsa_signature: vec![9] },
        };
        let recoup = create_recoup_request(&req).unwrap();
        let msg = build_sig_ps(SignaturePurpose::WalletCoinRecoup).put(req.denom_pub_hash).put([7u8; 32]).build();
        assert!(eddsa_verify(&msg, &recoup.coin_sig, &coin.public));
        assert_eq!(recoup.ewv, ExchangeWithdrawValues::Rsa);

        let refresh = create_recoup_refresh_request(&req).unwrap();
        assert!(!eddsa_verify(&msg, &refresh.coin_sig, &coin.public));
        let msg =
            build_sig_ps(SignaturePurpose::WalletCoinRecoupRefresh).put(req.denom_pub_hash).put([7u8; 32]).build();
        assert!(eddsa_verify(&msg, &refresh.coin_sig, &coin.public));

        let cs = CreateRecoupRequest {
            denom_pub: DenominationPubKey::ClauseSchnorr { cs_public_key: CsPublicKey::zeroed(), age_mask: 0 },
            ..req
        };
        assert!(matches!(create_recoup_request(&cs), Err(CryptoError::UnsupportedCipher(_))));
    }

    #[test]
    fn coin_link_signature() {
        let old_coin = EddsaKeyPair::random();
        let transfer = EcdheKeyPair::random();
        let req = SignCoinLinkRequest {
            old_coin_priv: old_coin.private.clone(),
            new_denom_hash: hash(b"new denom"),
            transfer_pub: transfer.public,
            coin_ev: CoinEnvelope::Rsa { rsa_blinded_planchet: vec![5u8; 16] },
        };
        let sig = sign_coin_link(&req);
        let msg = build_sig_ps(SignaturePurpose::WalletCoinLink)
            .put(req.new_denom_hash)
            .put(transfer.public)
            .put([0u8; 32])
            .put(hash_coin_ev(&req.coin_ev, &req.new_denom_hash))
            .build();
        assert!(eddsa_verify(&msg, &sig, &old_coin.public));
    }

    #[test]
    fn merchant_signatures() {
        let merchant = EddsaKeyPair::random();
        let contract_hash = hash(b"terms");
        let sig = eddsa_sign(&build_sig_ps(SignaturePurpose::MerchantPaymentOk).put(contract_hash).build(), &merchant.private);
        assert!(is_valid_payment_signature(&contract_hash, &sig, &merchant.public));
        assert!(!is_valid_contract_terms_signature(&contract_hash, &sig, &merchant.public));

        let sig = eddsa_sign(&build_sig_ps(SignaturePurpose::MerchantContract).put(contract_hash).build(), &merchant.private);
        assert!(is_valid_contract_terms_signature(&contract_hash, &sig, &merchant.public));
        assert!(!is_valid_contract_terms_signature(&hash(b"other terms"), &sig, &merchant.public));

        let coin = EddsaKeyPair::random();
        let req = SignTrackTransactionRequest {
            contract_terms_hash: contract_hash,
            wire_hash: hash(b"wire"),
            coin_pub: coin.public,
            merchant_pub: merchant.public,
            merchant_priv: merchant.private.clone(),
        };
        let msg = build_sig_ps(SignaturePurpose::MerchantTrackTransaction)
            .put(contract_hash)
            .put(req.wire_hash)
            .put(merchant.public)
            .put(coin.public)
            .build();
        assert!(eddsa_verify(&msg, &sign_track_transaction(&req), &merchant.public));
    }

    #[test]
    fn exchange_master_signatures() {
        let master = EddsaKeyPair::random();
        let payto = "payto://iban/DE89370400440532013000";
        let msg = build_sig_ps(SignaturePurpose::MasterWireDetails)
            .put(hash_truncate32(b"payto://iban/DE89370400440532013000\0"))
            .build();
        let sig = eddsa_sign(&msg, &master.private);
        assert!(is_valid_wire_account(payto, &sig, &master.public));
        assert!(!is_valid_wire_account("payto://iban/other", &sig, &master.public));

        let mut fee = WireFee {
            start_stamp: Timestamp::new(1_700_000_000),
            end_stamp: Timestamp::new(1_730_000_000),
            wire_fee: eur("0.1"),
            closing_fee: eur("0.2"),
            sig: EddsaSignature::zeroed(),
        };
        let msg = build_sig_ps(SignaturePurpose::MasterWireFees)
            .put(hash(b"iban\0"))
            .put_timestamp(&fee.start_stamp)
            .put_timestamp(&fee.end_stamp)
            .put_amount(&fee.wire_fee)
            .put_amount(&fee.closing_fee)
            .build();
        fee.sig = eddsa_sign(&msg, &master.private);
        assert!(is_valid_wire_fee("iban", &fee, &master.public));
        assert!(!is_valid_wire_fee("x-taler-bank", &fee, &master.public));
    }

    #[test]
    fn denomination_validity() {
        let master = EddsaKeyPair::random();
        let mut denom = DenominationValidity {
            denom_pub_hash: hash(b"denom"),
            value: eur("5"),
            fee_withdraw: eur("0.01"),
            fee_deposit: eur("0.02"),
            fee_refresh: eur("0.03"),
            fee_refund: eur("0.04"),
            stamp_start: Timestamp::new(1),
            stamp_expire_withdraw: Timestamp::new(2),
            stamp_expire_deposit: Timestamp::new(3),
            stamp_expire_legal: Timestamp::Never,
            master_sig: EddsaSignature::zeroed(),
        };
        assert!(!is_valid_denom(&denom, &master.public));
        let msg = build_sig_ps(SignaturePurpose::MasterDenominationKeyValidity)
            .put(master.public)
            .put(1_000_000u64.to_be_bytes())
            .put(2_000_000u64.to_be_bytes())
            .put(3_000_000u64.to_be_bytes())
            .put(u64::MAX.to_be_bytes())
            .put_amount(&denom.value)
            .put_amount(&denom.fee_withdraw)
            .put_amount(&denom.fee_deposit)
            .put_amount(&denom.fee_refresh)
            .put_amount(&denom.fee_refund)
            .put(denom.denom_pub_hash)
            .build();
        denom.master_sig = eddsa_sign(&msg, &master.private);
        assert!(is_valid_denom(&denom, &master.public));
    }

    #[test]
    fn purse_signatures() {
        let purse = EddsaKeyPair::random();
        let merge = EddsaKeyPair::random();
        let req = SignPurseCreationRequest {
            purse_priv: purse.private.clone(),
            purse_expiration: Timestamp::new(1_800_000_000),
            purse_amount: eur("12"),
            h_contract_terms: hash(b"terms"),
            merge_pub: merge.public,
            min_age: 16,
        };
        let msg = build_sig_ps(SignaturePurpose::WalletPurseCreate)
            .put(1_800_000_000_000_000u64.to_be_bytes())
            .put_amount(&eur("12"))
            .put(req.h_contract_terms)
            .put(merge.public)
            .put(16u32.to_be_bytes())
            .build();
        assert!(eddsa_verify(&msg, &sign_purse_creation(&req), &purse.public));

        let coin = EddsaKeyPair::random();
        let proof = restriction_commit(AgeMask::from_groups(&[8, 12]).unwrap(), 10);
        let deposits = sign_purse_deposits(&SignPurseDepositsRequest {
            purse_pub: purse.public,
            exchange_base_url: "https://exchange.example.com/".into(),
            coins: vec![PurseCoin {
                coin_pub: coin.public,
                coin_priv: coin.private.clone(),
                contribution: eur("2"),
                denom_pub_hash: hash(b"denom"),
                denom_sig: UnblindedSignature::Rsa { rsa_signature: vec![1] },
                age_commitment_proof: Some(proof.clone()),
            }],
        });
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].amount, "EUR:2");
        assert_eq!(deposits[0].age_commitment.as_ref(), Some(&proof.commitment.public_keys));
        let msg = build_sig_ps(SignaturePurpose::WalletPurseDeposit)
            .put_amount(&eur("2"))
            .put(hash(b"denom"))
            .put(proof.commitment.hash())
            .put(purse.public)
            .put(hash(b"https://exchange.example.com/\0"))
            .build();
        assert!(eddsa_verify(&msg, &deposits[0].coin_sig, &coin.public));
    }

    #[test]
    fn purse_merge_signatures() {
        let purse = EddsaKeyPair::random();
        let merge = EddsaKeyPair::random();
        let reserve = EddsaKeyPair::random();
        let req = SignPurseMergeRequest {
            merge_timestamp: Timestamp::new(10),
            purse_pub: purse.public,
            reserve_payto: "payto://taler-reserve/exchange.example.com/ABC".into(),
            merge_priv: merge.private.clone(),
            purse_expiration: Timestamp::new(20),
            purse_amount: eur("3"),
            purse_fee: eur("0"),
            contract_terms_hash: hash(b"terms"),
            reserve_priv: reserve.private.clone(),
            min_age: 0,
            flags: 0,
        };
        let res = sign_purse_merge(&req);
        let merge_msg = build_sig_ps(SignaturePurpose::WalletPurseMerge)
            .put(10_000_000u64.to_be_bytes())
            .put(purse.public)
            .put(hash_truncate32(b"payto://taler-reserve/exchange.example.com/ABC\0"))
            .build();
        assert!(eddsa_verify(&merge_msg, &res.merge_sig, &merge.public));
        let account_msg = build_sig_ps(SignaturePurpose::WalletAccountMerge)
            .put(20_000_000u64.to_be_bytes())
            .put_amount(&eur("3"))
            .put_amount(&eur("0"))
            .put(req.contract_terms_hash)
            .put(purse.public)
            .put(10_000_000u64.to_be_bytes())
            .put([0u8; 8])
            .build();
        assert!(eddsa_verify(&account_msg, &res.account_sig, &reserve.public));
    }

    #[test]
    fn reserve_purse_create_signs_purse_merge_and_account() {
        let purse = EddsaKeyPair::random();
        let merge = EddsaKeyPair::random();
        let reserve = EddsaKeyPair::random();
        let req = SignReservePurseCreateRequest {
            merge_timestamp: Timestamp::new(10),
            purse_pub: purse.public,
            purse_priv: purse.private.clone(),
            reserve_payto: "payto://taler-reserve/exchange.example.com/ABC".into(),
            merge_priv: merge.private.clone(),
            purse_expiration: Timestamp::new(20),
            purse_amount: eur("3"),
            purse_fee: eur("0.5"),
            contract_terms_hash: hash(b"terms"),
            reserve_priv: reserve.private.clone(),
            min_age: 0,
            flags: 1,
        };
        let res = sign_reserve_purse_create(&req);

        let purse_msg = build_sig_ps(SignaturePurpose::WalletPurseCreate)
            .put(20_000_000u64.to_be_bytes())
            .put_amount(&eur("3"))
            .put(req.contract_terms_hash)
            .put(merge.public)
            .put([0u8; 4])
            .build();
        assert!(eddsa_verify(&purse_msg, &res.purse_sig, &purse.public));
        let merge_msg = build_sig_ps(SignaturePurpose::WalletPurseMerge)
            .put(10_000_000u64.to_be_bytes())
            .put(purse.public)
            .put(hash_truncate32(b"payto://taler-reserve/exchange.example.com/ABC\0"))
            .build();
        assert!(eddsa_verify(&merge_msg, &res.merge_sig, &merge.public));
        let account_msg = build_sig_ps(SignaturePurpose::WalletAccountMerge)
            .put(20_000_000u64.to_be_bytes())
            .put_amount(&eur("3"))
            .put_amount(&eur("0.5"))
            .put(req.contract_terms_hash)
            .put(purse.public)
            .put(10_000_000u64.to_be_bytes())
            .put(0u32.to_be_bytes())
            .put(1u32.to_be_bytes())
            .build();
        assert!(eddsa_verify(&account_msg, &res.account_sig, &reserve.public));
    }

    #[test]
    fn global_fees() {
        let master = EddsaKeyPair::random();
        let mut fees = GlobalFees {
            start_date: Timestamp::new(1),
            end_date: Timestamp::new(2),
            history_fee: eur("0.1"),
            account_fee: eur("0.2"),
            purse_fee: eur("0.3"),
            history_expiration: Duration::from_secs(3600),
            purse_timeout: Duration::from_secs(60),
            purse_account_limit: 5,
            master_sig: EddsaSignature::zeroed(),
        };
        assert!(!is_valid_global_fees(&fees, &master.public));
        let msg = build_sig_ps(SignaturePurpose::MasterGlobalFees)
            .put(1_000_000u64.to_be_bytes())
            .put(2_000_000u64.to_be_bytes())
            .put(60_000_000u64.to_be_bytes())
            .put(3_600_000_000u64.to_be_bytes())
            .put_amount(&eur("0.1"))
            .put_amount(&eur("0.2"))
            .put_amount(&eur("0.3"))
            .put(5u32.to_be_bytes())
            .build();
        fees.master_sig = eddsa_sign(&msg, &master.private);
        assert!(is_valid_global_fees(&fees, &master.public));
        fees.purse_account_limit = 6;
        assert!(!is_valid_global_fees(&fees, &master.public));

        let json = serde_json::json!({
            "start_date": { "t_s": 1 },
            "end_date": { "t_s": 2 },
            "history_fee": "EUR:0.1",
            "account_fee": "EUR:0.2",
            "purse_fee": "EUR:0.3",
            "history_expiration": { "d_us": 3_600_000_000u64 },
            "purse_timeout": { "d_us": 60_000_000u64 },
            "purse_account_limit": 5,
            "master_sig": fees.master_sig.to_crock(),
        });
        let parsed: GlobalFees = serde_json::from_value(json).unwrap();
        assert!(is_valid_global_fees(&parsed, &master.public));
    }

    #[test]
    fn sync_signature() {
        let account = EddsaKeyPair::random();
        let new_hash = hash(b"backup v2");
        let sig = make_sync_signature(&account.private, None, &new_hash);
        let msg = build_sig_ps(SignaturePurpose::SyncBackupUpload).put([0u8; 64]).put(new_hash).build();
        assert!(eddsa_verify(&msg, &sig, &account.public));

        let old_hash = hash(b"backup v1");
        let sig = make_sync_signature(&account.private, Some(&old_hash), &new_hash);
        let msg = build_sig_ps(SignaturePurpose::SyncBackupUpload).put(old_hash).put(new_hash).build();
        assert!(eddsa_verify(&msg, &sig, &account.public));
    }

    #[test]
    fn key_helpers() {
        let pair = create_eddsa_keypair();
        assert_eq!(eddsa_get_public(&pair.private), pair.public);
        let pair = create_ecdhe_keypair();
        assert_eq!(ecdhe_get_public(&pair.private), pair.public);
    }
}
