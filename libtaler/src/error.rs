use crate::age_restriction::AgeRestrictionError;
use crate::amount::AmountError;
use crate::contract::ContractError;
use crate::cryptography::cs::CsError;
use crate::cryptography::encoding::EncodingError;
use crate::cryptography::kdf::KdfError;
use crate::cryptography::keys::KeyError;
use crate::cryptography::rsa::RsaError;
use crate::denomination::DenomKeyType;
use thiserror::Error;

/// The error type for every operation that can be sent to the crypto dispatcher.
///
/// Lower-level modules have their own error enums; they all convert into this one so that callers only need to
/// match on a single type at the protocol boundary.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("Amount error: {0}")]
    Amount(#[from] AmountError),
    #[error("Key derivation error: {0}")]
    Kdf(#[from] KdfError),
    #[error("RSA error: {0}")]
    Rsa(#[from] RsaError),
    #[error("Key error: {0}")]
    Key(#[from] KeyError),
    #[error("Age restriction error: {0}")]
    AgeRestriction(#[from] AgeRestrictionError),
    #[error("Contract encryption error: {0}")]
    Contract(#[from] ContractError),
    #[error("Cipher mismatch. Expected {expected:?}, but got {actual:?}")]
    CipherMismatch { expected: DenomKeyType, actual: DenomKeyType },
    #[error("The {0:?} cipher is not supported by this operation")]
    UnsupportedCipher(DenomKeyType),
    #[error("Amount arithmetic saturated while computing {0}")]
    Saturated(&'static str),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Crypto worker failed: {0}")]
    WorkerFailure(String),
}

impl From<CsError> for CryptoError {
    fn from(e: CsError) -> Self {
        match e {
            CsError::Kdf(e) => Self::Kdf(e),
            CsError::Key(e) => Self::Key(e),
        }
    }
}

impl CryptoError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput(reason.into())
    }
}
