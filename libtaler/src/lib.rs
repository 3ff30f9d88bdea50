//! Wallet-side protocol cryptography for a Chaumian e-cash system.
//!
//! The crate is organised bottom-up. [`cryptography`] holds the primitives (Crockford base32, SHA-512, the protocol
//! KDF, signature purpose framing, EdDSA/ECDHE, RSA and Clause-Schnorr blind signatures and Edx25519). On top of
//! those sit the protocol modules: [`amount`] arithmetic, [`denomination`] keys and envelopes, [`planchet`]
//! derivation, [`age_restriction`] commitments, the [`refresh`] cut-and-choose session, the [`signing`] helpers
//! and [`contract`] encryption for peer-to-peer payments. The [`dispatcher`] exposes all of it as a closed set of
//! request/response messages that can be run on a bounded pool of blocking workers.

pub mod age_restriction;
pub mod amount;
pub mod config;
pub mod contract;
pub mod cryptography;
pub mod denomination;
pub mod dispatcher;
pub mod error;
pub mod helpers;
pub mod planchet;
pub mod refresh;
pub mod signing;

pub use amount::{Amount, AmountError, SaturatingAmount};
pub use error::CryptoError;
