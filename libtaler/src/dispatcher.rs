//! The closed set of crypto operations a wallet can ask for, and a bounded worker pool that runs them.
//!
//! [`dispatch`] is a plain synchronous function from [`CryptoRequest`] to [`CryptoResponse`]. [`CryptoDispatcher`]
//! moves each request onto tokio's blocking pool, at most `max_concurrent_tasks` at a time, so that RSA
//! exponentiation and large refresh sessions never stall the async executor.

use crate::age_restriction::AgeCommitmentHash;
use crate::config::{ConfigError, DispatcherConfig};
use crate::contract::{
    decrypt_contract_for_deposit, decrypt_contract_for_merge, encrypt_contract_for_deposit, encrypt_contract_for_merge,
    DecryptContractForDepositResponse, DecryptContractRequest, DecryptContractResponse,
    EncryptContractForDepositRequest, EncryptContractRequest, EncryptContractResponse,
};
use crate::cryptography::cs::{
    cs_blind, cs_unblind, cs_verify, CsBlindSignature, CsBlindingSeed, CsPublicKey, CsRPublic, CsScalar, CsSignature,
};
use crate::cryptography::ecdh::{key_exchange_ecdhe_eddsa, key_exchange_eddsa_ecdhe};
use crate::cryptography::hash::{hash_string, HashCode};
use crate::cryptography::keys::{
    eddsa_sign, eddsa_verify, EcdheKeyPair, EcdhePrivateKey, EcdhePublicKey, EddsaKeyPair, EddsaPrivateKey,
    EddsaPublicKey, EddsaSignature,
};
use crate::cryptography::rsa::{rsa_blind, rsa_unblind, rsa_verify, RsaPublicKey};
use crate::denomination::{verify_denomination_signature, BlindedDenominationSignature, DenominationPubKey, UnblindedSignature};
use crate::error::CryptoError;
use crate::planchet::{
    create_planchet, create_tip_planchet, setup_refresh_transfer_pub, unblind_denomination_signature,
    BlindingKeySecret, DeriveTipRequest, DerivedTipPlanchet, PlanchetCreationRequest, PlanchetUnblindInfo,
    SecretSeed, WithdrawalPlanchet,
};
use crate::refresh::{derive_refresh_session, DeriveRefreshSessionRequest, RefreshSession};
use crate::signing::{
    create_ecdhe_keypair, create_eddsa_keypair, create_recoup_refresh_request, create_recoup_request,
    ecdhe_get_public, eddsa_get_public, is_valid_contract_terms_signature, is_valid_denom,
    is_valid_global_fees, is_valid_payment_signature, is_valid_wire_account, is_valid_wire_fee, make_sync_signature,
    sign_coin_link, sign_deposit_permission, sign_purse_creation, sign_purse_deposits, sign_purse_merge,
    sign_reserve_purse_create, sign_track_transaction, CoinDepositPermission, CreateRecoupRequest,
    DenominationValidity, DepositInfo, GlobalFees, PurseDeposit, RecoupRequest, SignCoinLinkRequest,
    SignPurseCreationRequest, SignPurseDepositsRequest, SignPurseMergeRequest, SignPurseMergeResponse,
    SignReservePurseCreateRequest, SignReservePurseCreateResponse, SignTrackTransactionRequest, WireFee,
};
use log::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Every operation the crypto core offers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", content = "args", rename_all = "camelCase")]
pub enum CryptoRequest {
    CreatePlanchet(PlanchetCreationRequest),
    CreateTipPlanchet(DeriveTipRequest),
    DeriveRefreshSession(DeriveRefreshSessionRequest),
    #[serde(rename_all = "camelCase")]
    SetupRefreshTransferPub { secret_seed: SecretSeed, index: u32 },
    #[serde(rename_all = "camelCase")]
    UnblindDenominationSignature { planchet: PlanchetUnblindInfo, blinded_sig: BlindedDenominationSignature },
    #[serde(rename_all = "camelCase")]
    VerifyDenominationSignature {
        coin_pub: EddsaPublicKey,
        #[serde(default)]
        age_commitment_hash: Option<AgeCommitmentHash>,
        sig: UnblindedSignature,
        denom_pub: DenominationPubKey,
    },
    #[serde(rename_all = "camelCase")]
    RsaBlind {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        hm: Vec<u8>,
        bks: BlindingKeySecret,
        public_key: RsaPublicKey,
    },
    #[serde(rename_all = "camelCase")]
    RsaUnblind {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        blinded_sig: Vec<u8>,
        bks: BlindingKeySecret,
        public_key: RsaPublicKey,
    },
    #[serde(rename_all = "camelCase")]
    RsaVerify {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        hm: Vec<u8>,
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        sig: Vec<u8>,
        public_key: RsaPublicKey,
    },
    #[serde(rename_all = "camelCase")]
    CsBlind {
        bseed: CsBlindingSeed,
        r_pub: [CsRPublic; 2],
        cs_pub: CsPublicKey,
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        hm: Vec<u8>,
    },
    #[serde(rename_all = "camelCase")]
    CsUnblind { bseed: CsBlindingSeed, r_pub: [CsRPublic; 2], cs_pub: CsPublicKey, blind_sig: CsBlindSignature },
    #[serde(rename_all = "camelCase")]
    CsVerify {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        hm: Vec<u8>,
        sig: CsSignature,
        cs_pub: CsPublicKey,
    },
    #[serde(rename_all = "camelCase")]
    EddsaSign {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        msg: Vec<u8>,
        private_key: EddsaPrivateKey,
    },
    #[serde(rename_all = "camelCase")]
    EddsaVerify {
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
        msg: Vec<u8>,
        sig: EddsaSignature,
        public_key: EddsaPublicKey,
    },
    CreateEddsaKeypair,
    CreateEcdheKeypair,
    #[serde(rename_all = "camelCase")]
    EddsaGetPublic { private_key: EddsaPrivateKey },
    #[serde(rename_all = "camelCase")]
    EcdheGetPublic { private_key: EcdhePrivateKey },
    #[serde(rename_all = "camelCase")]
    KeyExchangeEcdheEddsa { ecdhe_priv: EcdhePrivateKey, eddsa_pub: EddsaPublicKey },
    #[serde(rename_all = "camelCase")]
    KeyExchangeEddsaEcdhe { eddsa_priv: EddsaPrivateKey, ecdhe_pub: EcdhePublicKey },
    HashString { value: String },
    SignDepositPermission(DepositInfo),
    CreateRecoupRequest(CreateRecoupRequest),
    CreateRecoupRefreshRequest(CreateRecoupRequest),
    SignCoinLink(SignCoinLinkRequest),
    SignTrackTransaction(SignTrackTransactionRequest),
    #[serde(rename_all = "camelCase")]
    IsValidPaymentSignature { contract_hash: HashCode, sig: EddsaSignature, merchant_pub: EddsaPublicKey },
    #[serde(rename_all = "camelCase")]
    IsValidContractTermsSignature { contract_terms_hash: HashCode, sig: EddsaSignature, merchant_pub: EddsaPublicKey },
    #[serde(rename_all = "camelCase")]
    IsValidWireAccount { payto_uri: String, sig: EddsaSignature, master_pub: EddsaPublicKey },
    #[serde(rename_all = "camelCase")]
    IsValidWireFee { wire_type: String, fee: WireFee, master_pub: EddsaPublicKey },
    #[serde(rename_all = "camelCase")]
    IsValidDenom { denom: DenominationValidity, master_pub: EddsaPublicKey },
    #[serde(rename_all = "camelCase")]
    IsValidGlobalFees { fees: GlobalFees, master_pub: EddsaPublicKey },
    SignPurseCreation(SignPurseCreationRequest),
    SignPurseDeposits(SignPurseDepositsRequest),
    SignPurseMerge(SignPurseMergeRequest),
    SignReservePurseCreate(SignReservePurseCreateRequest),
    EncryptContractForMerge(EncryptContractRequest),
    DecryptContractForMerge(DecryptContractRequest),
    EncryptContractForDeposit(EncryptContractForDepositRequest),
    DecryptContractForDeposit(DecryptContractRequest),
    #[serde(rename_all = "camelCase")]
    MakeSyncSignature {
        account_priv: EddsaPrivateKey,
        #[serde(default)]
        old_hash: Option<HashCode>,
        new_hash: HashCode,
    },
}

impl CryptoRequest {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreatePlanchet(_) => "createPlanchet",
            Self::CreateTipPlanchet(_) => "createTipPlanchet",
            Self::DeriveRefreshSession(_) => "deriveRefreshSession",
            Self::SetupRefreshTransferPub { .. } => "setupRefreshTransferPub",
            Self::UnblindDenominationSignature { .. } => "unblindDenominationSignature",
            Self::VerifyDenominationSignature { .. } => "verifyDenominationSignature",
            Self::RsaBlind { .. } => "rsaBlind",
            Self::RsaUnblind { .. } => "rsaUnblind",
            Self::RsaVerify { .. } => "rsaVerify",
            Self::CsBlind { .. } => "csBlind",
            Self::CsUnblind { .. } => "csUnblind",
            Self::CsVerify { .. } => "csVerify",
            Self::EddsaSign { .. } => "eddsaSign",
            Self::EddsaVerify { .. } => "eddsaVerify",
            Self::CreateEddsaKeypair => "createEddsaKeypair",
            Self::CreateEcdheKeypair => "createEcdheKeypair",
            Self::EddsaGetPublic { .. } => "eddsaGetPublic",
            Self::EcdheGetPublic { .. } => "ecdheGetPublic",
            Self::KeyExchangeEcdheEddsa { .. } => "keyExchangeEcdheEddsa",
            Self::KeyExchangeEddsaEcdhe { .. } => "keyExchangeEddsaEcdhe",
            Self::HashString { .. } => "hashString",
            Self::SignDepositPermission(_) => "signDepositPermission",
            Self::CreateRecoupRequest(_) => "createRecoupRequest",
            Self::CreateRecoupRefreshRequest(_) => "createRecoupRefreshRequest",
            Self::SignCoinLink(_) => "signCoinLink",
            Self::SignTrackTransaction(_) => "signTrackTransaction",
            Self::IsValidPaymentSignature { .. } => "isValidPaymentSignature",
            Self::IsValidContractTermsSignature { .. } => "isValidContractTermsSignature",
            Self::IsValidWireAccount { .. } => "isValidWireAccount",
            Self::IsValidWireFee { .. } => "isValidWireFee",
            Self::IsValidDenom { .. } => "isValidDenom",
            Self::IsValidGlobalFees { .. } => "isValidGlobalFees",
            Self::SignPurseCreation(_) => "signPurseCreation",
            Self::SignPurseDeposits(_) => "signPurseDeposits",
            Self::SignPurseMerge(_) => "signPurseMerge",
            Self::SignReservePurseCreate(_) => "signReservePurseCreate",
            Self::EncryptContractForMerge(_) => "encryptContractForMerge",
            Self::DecryptContractForMerge(_) => "decryptContractForMerge",
            Self::EncryptContractForDeposit(_) => "encryptContractForDeposit",
            Self::DecryptContractForDeposit(_) => "decryptContractForDeposit",
            Self::MakeSyncSignature { .. } => "makeSyncSignature",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "result", content = "value", rename_all = "camelCase")]
pub enum CryptoResponse {
    Planchet(Box<WithdrawalPlanchet>),
    TipPlanchet(Box<DerivedTipPlanchet>),
    RefreshSession(Box<RefreshSession>),
    EcdheKeyPair(EcdheKeyPair),
    EddsaKeyPair(EddsaKeyPair),
    EddsaPublicKey(EddsaPublicKey),
    EcdhePublicKey(EcdhePublicKey),
    UnblindedSignature(UnblindedSignature),
    Bytes(
        #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")] Vec<u8>,
    ),
    CsBlindedChallenges([CsScalar; 2]),
    CsSignature(CsSignature),
    Signature(EddsaSignature),
    Hash(HashCode),
    Valid(bool),
    DepositPermission(Box<CoinDepositPermission>),
    Recoup(RecoupRequest),
    PurseDeposits(Vec<PurseDeposit>),
    PurseMerge(SignPurseMergeResponse),
    ReservePurseCreate(SignReservePurseCreateResponse),
    EncryptedContract(Box<EncryptContractResponse>),
    DecryptedContract(Box<DecryptContractResponse>),
    DecryptedDepositContract(DecryptContractForDepositResponse),
}

/// Run one request to completion on the current thread.
pub fn dispatch(request: CryptoRequest) -> Result<CryptoResponse, CryptoError> {
    use CryptoRequest as Req;
    use CryptoResponse as Res;
    let response = match request {
        Req::CreatePlanchet(req) => Res::Planchet(Box::new(create_planchet(&req)?)),
        Req::CreateTipPlanchet(req) => Res::TipPlanchet(Box::new(create_tip_planchet(&req)?)),
        Req::DeriveRefreshSession(req) => Res::RefreshSession(Box::new(derive_refresh_session(&req)?)),
        Req::SetupRefreshTransferPub { secret_seed, index } => {
            Res::EcdheKeyPair(setup_refresh_transfer_pub(secret_seed.as_bytes(), index)?)
        }
        Req::UnblindDenominationSignature { planchet, blinded_sig } => {
            Res::UnblindedSignature(unblind_denomination_signature(&planchet, &blinded_sig)?)
        }
        Req::VerifyDenominationSignature { coin_pub, age_commitment_hash, sig, denom_pub } => {
            Res::Valid(verify_denomination_signature(&coin_pub, age_commitment_hash.as_ref(), &sig, &denom_pub)?)
        }
        Req::RsaBlind { hm, bks, public_key } => Res::Bytes(rsa_blind(&hm, bks.as_bytes(), &public_key)?),
        Req::RsaUnblind { blinded_sig, bks, public_key } => {
            Res::Bytes(rsa_unblind(&blinded_sig, &public_key, bks.as_bytes())?)
        }
        Req::RsaVerify { hm, sig, public_key } => Res::Valid(rsa_verify(&hm, &sig, &public_key)?),
        Req::CsBlind { bseed, r_pub, cs_pub, hm } => Res::CsBlindedChallenges(cs_blind(&bseed, &r_pub, &cs_pub, &hm)?),
        Req::CsUnblind { bseed, r_pub, cs_pub, blind_sig } => {
            Res::CsSignature(cs_unblind(&bseed, &r_pub, &cs_pub, &blind_sig)?)
        }
        Req::CsVerify { hm, sig, cs_pub } => Res::Valid(cs_verify(&hm, &sig, &cs_pub)?),
        Req::EddsaSign { msg, private_key } => Res::Signature(eddsa_sign(&msg, &private_key)),
        Req::EddsaVerify { msg, sig, public_key } => Res::Valid(eddsa_verify(&msg, &sig, &public_key)),
        Req::CreateEddsaKeypair => Res::EddsaKeyPair(create_eddsa_keypair()),
        Req::CreateEcdheKeypair => Res::EcdheKeyPair(create_ecdhe_keypair()),
        Req::EddsaGetPublic { private_key } => Res::EddsaPublicKey(eddsa_get_public(&private_key)),
        Req::EcdheGetPublic { private_key } => Res::EcdhePublicKey(ecdhe_get_public(&private_key)),
        Req::KeyExchangeEcdheEddsa { ecdhe_priv, eddsa_pub } => {
            Res::Hash(key_exchange_ecdhe_eddsa(&ecdhe_priv, &eddsa_pub)?)
        }
        Req::KeyExchangeEddsaEcdhe { eddsa_priv, ecdhe_pub } => {
            Res::Hash(key_exchange_eddsa_ecdhe(&eddsa_priv, &ecdhe_pub))
        }
        Req::HashString { value } => Res::Hash(hash_string(&value)),
        Req::SignDepositPermission(info) => Res::DepositPermission(Box::new(sign_deposit_permission(&info)?)),
        Req::CreateRecoupRequest(req) => Res::Recoup(create_recoup_request(&req)?),
        Req::CreateRecoupRefreshRequest(req) => Res::Recoup(create_recoup_refresh_request(&req)?),
        Req::SignCoinLink(req) => Res::Signature(sign_coin_link(&req)),
        Req::SignTrackTransaction(req) => Res::Signature(sign_track_transaction(&req)),
        Req::IsValidPaymentSignature { contract_hash, sig, merchant_pub } => {
            Res::Valid(is_valid_payment_signature(&contract_hash, &sig, &merchant_pub))
        }
        Req::IsValidContractTermsSignature { contract_terms_hash, sig, merchant_pub } => {
            Res::Valid(is_valid_contract_terms_signature(&contract_terms_hash, &sig, &merchant_pub))
        }
        Req::IsValidWireAccount { payto_uri, sig, master_pub } => {
            Res::Valid(is_valid_wire_account(&payto_uri, &sig, &master_pub))
        }
        Req::IsValidWireFee { wire_type, fee, master_pub } => Res::Valid(is_valid_wire_fee(&wire_type, &fee, &master_pub)),
        Req::IsValidDenom { denom, master_pub } => Res::Valid(is_valid_denom(&denom, &master_pub)),
        Req::IsValidGlobalFees { fees, master_pub } => Res::Valid(is_valid_global_fees(&fees, &master_pub)),
        Req::SignPurseCreation(req) => Res::Signature(sign_purse_creation(&req)),
        Req::SignPurseDeposits(req) => Res::PurseDeposits(sign_purse_deposits(&req)),
        Req::SignPurseMerge(req) => Res::PurseMerge(sign_purse_merge(&req)),
        Req::SignReservePurseCreate(req) => Res::ReservePurseCreate(sign_reserve_purse_create(&req)),
        Req::EncryptContractForMerge(req) => Res::EncryptedContract(Box::new(encrypt_contract_for_merge(&req)?)),
        Req::DecryptContractForMerge(req) => Res::DecryptedContract(Box::new(decrypt_contract_for_merge(&req)?)),
        Req::EncryptContractForDeposit(req) => {
            Res::EncryptedContract(Box::new(encrypt_contract_for_deposit(&req)?))
        }
        Req::DecryptContractForDeposit(req) => Res::DecryptedDepositContract(decrypt_contract_for_deposit(&req)?),
        Req::MakeSyncSignature { account_priv, old_hash, new_hash } => {
            Res::Signature(make_sync_signature(&account_priv, old_hash.as_ref(), &new_hash))
        }
    };
    Ok(response)
}

/// Runs [`CryptoRequest`]s on tokio's blocking pool, bounded by a semaphore.
///
/// Cloning the dispatcher is cheap and clones share the same bound.
#[derive(Debug, Clone)]
pub struct CryptoDispatcher {
    config: DispatcherConfig,
    permits: Arc<Semaphore>,
}

impl CryptoDispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        debug!("Crypto dispatcher started with {} workers", config.max_concurrent_tasks);
        Ok(Self { config, permits })
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// The default cut-and-choose parameter for new refresh sessions.
    pub fn refresh_kappa(&self) -> u32 {
        self.config.refresh_kappa
    }

    /// Fill in settings the caller left to the dispatcher's configuration.
    fn with_defaults(&self, mut request: CryptoRequest) -> CryptoRequest {
        if let CryptoRequest::DeriveRefreshSession(req) = &mut request {
            req.kappa.get_or_insert(self.config.refresh_kappa);
        }
        request
    }

    /// Run a single request. A panicking or cancelled worker is reported as [`CryptoError::WorkerFailure`].
    pub async fn call(&self, request: CryptoRequest) -> Result<CryptoResponse, CryptoError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| CryptoError::WorkerFailure(format!("worker pool closed: {e}")))?;
        let request = self.with_defaults(request);
        let name = request.name();
        trace!("Running {name}");
        let task = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            dispatch(request)
        });
        task.await.map_err(|e| {
            warn!("Crypto worker for {name} failed: {e}");
            CryptoError::WorkerFailure(format!("{name}: {e}"))
        })?
    }

    /// Run independent requests concurrently. Results come back in the order of `requests`.
    pub async fn call_all(&self, requests: Vec<CryptoRequest>) -> Vec<Result<CryptoResponse, CryptoError>> {
        let handles = requests
            .into_iter()
            .map(|request| {
                let this = self.clone();
                tokio::spawn(async move { this.call(request).await })
            })
            .collect::<Vec<_>>();
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle.await.unwrap_or_else(|e| Err(CryptoError::WorkerFailure(e.to_string())));
            results.push(result);
        }
        results
    }
}
