//! Encrypted contract terms for peer-to-peer payments.
//!
//! A purse carries its contract terms encrypted to a one-off contract key. The symmetric key is derived from the
//! ECDH secret between the contract key and the purse key, with the nonce as KDF salt and a direction label as
//! info. The ciphertext is `nonce (24) || NaCl secretbox`, and the plaintext is
//!
//! ```text
//! format tag: u32 BE || uncompressed length: u32 BE || [merge private key (32)] || zlib(terms JSON || NUL)
//! ```
//!
//! where the merge key is only present in a payment offer. The purse key signs the hash of the ciphertext together
//! with the contract public key so the exchange can check who stored it.

use crate::cryptography::ecdh::key_exchange_ecdhe_eddsa;
use crate::cryptography::hash::{hash, HashCode};
use crate::cryptography::kdf::kdf_array;
use crate::cryptography::keys::{
    eddsa_sign, eddsa_verify, EcdheKeyPair, EcdhePrivateKey, EcdhePublicKey, EddsaPrivateKey, EddsaPublicKey,
    EddsaSignature,
};
use crate::cryptography::purpose::{build_sig_ps, SignaturePurpose};
use crate::error::CryptoError;
use crypto_secretbox::aead::{Aead, KeyInit};
use crypto_secretbox::{Nonce, XSalsa20Poly1305};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use thiserror::Error;
use zeroize::Zeroizing;

pub const NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 8;
const MERGE_SALT: &[u8] = b"p2p-merge-contract";
const DEPOSIT_SALT: &[u8] = b"p2p-deposit-contract";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("Encrypted contract is too short ({0} bytes)")]
    TooShort(usize),
    #[error("Encrypted contract could not be decrypted")]
    Decryption,
    #[error("Contract encryption failed")]
    Encryption,
    #[error("Expected a contract of format {expected:?}, but got format tag {actual}")]
    WrongFormat { expected: ContractFormat, actual: u32 },
    #[error("Contract terms do not have the announced length. Expected {expected}, but got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Contract terms could not be compressed or decompressed: {0}")]
    Compression(String),
    #[error("Contract terms are not valid JSON: {0}")]
    Json(String),
}

/// What the encrypted contract is used for. The discriminant is the format tag on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ContractFormat {
    /// A push payment: the payer offers money and hands out the merge key.
    PaymentOffer = 0,
    /// A pull payment: the payee asks for money.
    PaymentRequest = 1,
}

/// An encrypted contract as the exchange stores it next to a purse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedContract {
    pub contract_pub: EcdhePublicKey,
    #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
    pub econtract: Vec<u8>,
    pub econtract_sig: EddsaSignature,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptContractRequest {
    pub contract_terms: Value,
    pub purse_pub: EddsaPublicKey,
    pub purse_priv: EddsaPrivateKey,
    pub merge_priv: EddsaPrivateKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptContractForDepositRequest {
    pub contract_terms: Value,
    pub purse_pub: EddsaPublicKey,
    pub purse_priv: EddsaPrivateKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptContractResponse {
    pub econtract: EncryptedContract,
    pub contract_priv: EcdhePrivateKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptContractRequest {
    #[serde(serialize_with = "crate::helpers::to_crock", deserialize_with = "crate::helpers::from_crock")]
    pub ciphertext: Vec<u8>,
    pub purse_pub: EddsaPublicKey,
    pub contract_priv: EcdhePrivateKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptContractResponse {
    pub contract_terms: Value,
    pub merge_priv: EddsaPrivateKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptContractForDepositResponse {
    pub contract_terms: Value,
}

fn random_nonce() -> [u8; NONCE_LEN] {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}

fn box_key(key_seed: &HashCode, nonce: &[u8; NONCE_LEN], salt: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    Ok(Zeroizing::new(kdf_array::<32>(key_seed.as_bytes(), nonce, salt)?))
}

/// Encrypt `plaintext` under a key derived from `key_seed` and `nonce`. Returns `nonce || secretbox`.
pub fn encrypt_with_derived_key(
    nonce: [u8; NONCE_LEN],
    key_seed: &HashCode,
    plaintext: &[u8],
    salt: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let key = box_key(key_seed, &nonce, salt)?;
    let cipher = XSalsa20Poly1305::new_from_slice(&key[..]).map_err(|_| ContractError::Encryption)?;
    let sealed = cipher.encrypt(Nonce::from_slice(&nonce), plaintext).map_err(|_| ContractError::Encryption)?;
    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Reverse of [`encrypt_with_derived_key`]. A wrong key or a modified ciphertext fails authentication.
pub fn decrypt_with_derived_key(
    ciphertext: &[u8],
    key_seed: &HashCode,
    salt: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if ciphertext.len() < NONCE_LEN {
        return Err(ContractError::TooShort(ciphertext.len()).into());
    }
    let (nonce, sealed) = ciphertext.split_at(NONCE_LEN);
    let mut nonce_arr = [0u8; NONCE_LEN];
    nonce_arr.copy_from_slice(nonce);
    let key = box_key(key_seed, &nonce_arr, salt)?;
    let cipher = XSalsa20Poly1305::new_from_slice(&key[..]).map_err(|_| ContractError::Decryption)?;
    let plaintext = cipher.decrypt(Nonce::from_slice(nonce), sealed).map_err(|_| ContractError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

/// Serialize contract terms with sorted keys and no whitespace, NUL terminated.
fn terms_to_bytes(terms: &Value) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = serde_json::to_vec(terms).map_err(|e| ContractError::Json(e.to_string()))?;
    bytes.push(0);
    Ok(bytes)
}

fn compress(data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|e| ContractError::Compression(e.to_string()))?;
    encoder.finish().map_err(|e| ContractError::Compression(e.to_string()).into())
}

fn decompress_terms(data: &[u8], expected_len: usize) -> Result<Value, CryptoError> {
    let mut out = Vec::new();
    // Never inflate past the announced length.
    ZlibDecoder::new(data)
        .take(expected_len as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| ContractError::Compression(e.to_string()))?;
    if out.len() != expected_len {
        return Err(ContractError::LengthMismatch { expected: expected_len, actual: out.len() }.into());
    }
    let json = match out.split_last() {
        Some((&0, json)) => json,
        _ => &out[..],
    };
    serde_json::from_slice(json).map_err(|e| ContractError::Json(e.to_string()).into())
}

fn contract_plaintext(
    format: ContractFormat,
    terms: &Value,
    merge_priv: Option<&EddsaPrivateKey>,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let terms = terms_to_bytes(terms)?;
    let compressed = compress(&terms)?;
    let mut plaintext = Zeroizing::new(Vec::with_capacity(HEADER_LEN + 32 + compressed.len()));
    plaintext.extend_from_slice(&(format as u32).to_be_bytes());
    plaintext.extend_from_slice(&(terms.len() as u32).to_be_bytes());
    if let Some(key) = merge_priv {
        plaintext.extend_from_slice(key.as_bytes());
    }
    plaintext.extend_from_slice(&compressed);
    Ok(plaintext)
}

/// Split a decrypted plaintext into the bytes after the header, checking the format tag.
fn open_plaintext(plaintext: &[u8], format: ContractFormat) -> Result<(usize, &[u8]), CryptoError> {
    if plaintext.len() < HEADER_LEN {
        return Err(ContractError::TooShort(plaintext.len()).into());
    }
    let tag = u32::from_be_bytes([plaintext[0], plaintext[1], plaintext[2], plaintext[3]]);
    if tag != format as u32 {
        return Err(ContractError::WrongFormat { expected: format, actual: tag }.into());
    }
    let len = u32::from_be_bytes([plaintext[4], plaintext[5], plaintext[6], plaintext[7]]) as usize;
    Ok((len, &plaintext[HEADER_LEN..]))
}

fn econtract_data(econtract: &[u8], contract_pub: &EcdhePublicKey) -> Vec<u8> {
    build_sig_ps(SignaturePurpose::WalletPurseEcontract).put(hash(econtract)).put(contract_pub).build()
}

fn seal_contract(
    purse_pub: &EddsaPublicKey,
    purse_priv: &EddsaPrivateKey,
    contract: EcdheKeyPair,
    nonce: [u8; NONCE_LEN],
    plaintext: &[u8],
    salt: &[u8],
) -> Result<EncryptContractResponse, CryptoError> {
    let key_seed = key_exchange_ecdhe_eddsa(&contract.private, purse_pub)?;
    let econtract = encrypt_with_derived_key(nonce, &key_seed, plaintext, salt)?;
    let econtract_sig = eddsa_sign(&econtract_data(&econtract, &contract.public), purse_priv);
    debug!("Encrypted {} bytes of contract data for purse {}", plaintext.len(), purse_pub.to_crock());
    Ok(EncryptContractResponse {
        econtract: EncryptedContract { contract_pub: contract.public, econtract, econtract_sig },
        contract_priv: contract.private,
    })
}

/// [`encrypt_contract_for_merge`] with a caller-chosen contract key and nonce.
pub fn encrypt_contract_for_merge_with(
    req: &EncryptContractRequest,
    contract: EcdheKeyPair,
    nonce: [u8; NONCE_LEN],
) -> Result<EncryptContractResponse, CryptoError> {
    let plaintext = contract_plaintext(ContractFormat::PaymentOffer, &req.contract_terms, Some(&req.merge_priv))?;
    seal_contract(&req.purse_pub, &req.purse_priv, contract, nonce, &plaintext, MERGE_SALT)
}

/// Encrypt the terms of a payment offer, together with the merge key, under a fresh contract key.
pub fn encrypt_contract_for_merge(req: &EncryptContractRequest) -> Result<EncryptContractResponse, CryptoError> {
    encrypt_contract_for_merge_with(req, EcdheKeyPair::random(), random_nonce())
}

pub fn decrypt_contract_for_merge(req: &DecryptContractRequest) -> Result<DecryptContractResponse, CryptoError> {
    let key_seed = key_exchange_ecdhe_eddsa(&req.contract_priv, &req.purse_pub)?;
    let plaintext = decrypt_with_derived_key(&req.ciphertext, &key_seed, MERGE_SALT)?;
    let (len, body) = open_plaintext(&plaintext, ContractFormat::PaymentOffer)?;
    if body.len() < EddsaPrivateKey::LEN {
        return Err(ContractError::TooShort(plaintext.len()).into());
    }
    let (merge_priv, compressed) = body.split_at(EddsaPrivateKey::LEN);
    let merge_priv = EddsaPrivateKey::try_from_slice(merge_priv)?;
    let contract_terms = decompress_terms(compressed, len)?;
    Ok(DecryptContractResponse { contract_terms, merge_priv })
}

/// [`encrypt_contract_for_deposit`] with a caller-chosen contract key and nonce.
pub fn encrypt_contract_for_deposit_with(
    req: &EncryptContractForDepositRequest,
    contract: EcdheKeyPair,
    nonce: [u8; NONCE_LEN],
) -> Result<EncryptContractResponse, CryptoError> {
    let plaintext = contract_plaintext(ContractFormat::PaymentRequest, &req.contract_terms, None)?;
    seal_contract(&req.purse_pub, &req.purse_priv, contract, nonce, &plaintext, DEPOSIT_SALT)
}

/// Encrypt the terms of a payment request under a fresh contract key.
pub fn encrypt_contract_for_deposit(
    req: &EncryptContractForDepositRequest,
) -> Result<EncryptContractResponse, CryptoError> {
    encrypt_contract_for_deposit_with(req, EcdheKeyPair::random(), random_nonce())
}

pub fn decrypt_contract_for_deposit(
    req: &DecryptContractRequest,
) -> Result<DecryptContractForDepositResponse, CryptoError> {
    let key_seed = key_exchange_ecdhe_eddsa(&req.contract_priv, &req.purse_pub)?;
    let plaintext = decrypt_with_derived_key(&req.ciphertext, &key_seed, DEPOSIT_SALT)?;
    let (len, compressed) = open_plaintext(&plaintext, ContractFormat::PaymentRequest)?;
    let contract_terms = decompress_terms(compressed, len)?;
    Ok(DecryptContractForDepositResponse { contract_terms })
}

/// Check the purse key's signature over a stored contract.
pub fn is_valid_econtract_signature(econtract: &EncryptedContract, purse_pub: &EddsaPublicKey) -> bool {
    let data = econtract_data(&econtract.econtract, &econtract.contract_pub);
    let valid = eddsa_verify(&data, &econtract.econtract_sig, purse_pub);
    if !valid {
        warn!("Invalid encrypted contract signature");
    }
    valid
}
