//! Signature purposes and the framing of signed data.
//!
//! Every EdDSA signature in the protocol covers a buffer of the form
//! `[total_len: u32 BE][purpose: u32 BE][payload ...]` where `total_len` counts the 8-byte header too.

use crate::amount::Amount;
use crate::helpers::{Duration, Timestamp};

/// Width of the zero-padded currency field in a framed amount.
pub const CURRENCY_FIELD_LEN: usize = 12;
/// Width of a framed amount: value (8) + fraction (4) + currency (12).
pub const AMOUNT_BUFFER_LEN: usize = 8 + 4 + CURRENCY_FIELD_LEN;

/// The registry of signature purpose codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SignaturePurpose {
    MasterGlobalFees = 1022,
    MasterDenominationKeyValidity = 1025,
    MasterWireFees = 1028,
    MasterWireDetails = 1030,
    ExchangeConfirmRecoup = 1039,
    ExchangeConfirmRecoupRefresh = 1041,
    MerchantContract = 1101,
    MerchantTrackTransaction = 1103,
    MerchantPaymentOk = 1104,
    WalletReserveWithdraw = 1200,
    WalletCoinDeposit = 1201,
    WalletCoinMelt = 1202,
    WalletCoinRecoup = 1203,
    WalletCoinLink = 1204,
    WalletCoinRecoupRefresh = 1206,
    WalletAgeAttestation = 1207,
    WalletPurseCreate = 1210,
    WalletPurseDeposit = 1211,
    WalletPurseMerge = 1213,
    WalletAccountMerge = 1214,
    WalletPurseEcontract = 1216,
    SyncBackupUpload = 1450,
    Test = 4242,
}

impl SignaturePurpose {
    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// Accumulates the payload of a signed message and frames it with its purpose header.
#[derive(Debug, Clone)]
pub struct SignaturePurposeBuilder {
    purpose: SignaturePurpose,
    payload: Vec<u8>,
}

impl SignaturePurposeBuilder {
    pub fn new(purpose: SignaturePurpose) -> Self {
        Self { purpose, payload: Vec::with_capacity(256) }
    }

    pub fn put(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.payload.extend_from_slice(bytes.as_ref());
        self
    }

    pub fn put_u32(self, v: u32) -> Self {
        self.put(v.to_be_bytes())
    }

    pub fn put_u64(self, v: u64) -> Self {
        self.put(v.to_be_bytes())
    }

    pub fn put_amount(self, amount: &Amount) -> Self {
        self.put(amount_to_buffer(amount))
    }

    pub fn put_timestamp(self, ts: &Timestamp) -> Self {
        self.put(ts.to_be_micros())
    }

    pub fn put_duration(self, d: &Duration) -> Self {
        self.put(d.to_be_micros())
    }

    pub fn build(self) -> Vec<u8> {
        let total_len = (8 + self.payload.len()) as u32;
        let mut out = Vec::with_capacity(total_len as usize);
        out.extend_from_slice(&total_len.to_be_bytes());
        out.extend_from_slice(&self.purpose.code().to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

/// Shorthand for [`SignaturePurposeBuilder::new`].
pub fn build_sig_ps(purpose: SignaturePurpose) -> SignaturePurposeBuilder {
    SignaturePurposeBuilder::new(purpose)
}

/// Frame an amount as `value: u64 BE || fraction: u32 BE || currency (12 bytes, zero padded)`.
///
/// A currency code longer than the field is cut off after 12 bytes.
pub fn amount_to_buffer(amount: &Amount) -> [u8; AMOUNT_BUFFER_LEN] {
    let mut buf = [0u8; AMOUNT_BUFFER_LEN];
    buf[..8].copy_from_slice(&amount.value().to_be_bytes());
    buf[8..12].copy_from_slice(&amount.fraction().to_be_bytes());
    let cur = amount.currency().as_bytes();
    let n = cur.len().min(CURRENCY_FIELD_LEN);
    buf[12..12 + n].copy_from_slice(&cur[..n]);
    buf
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn header_layout() {
        let buf = build_sig_ps(SignaturePurpose::Test).put([1u8, 2, 3]).put_u32(7).build();
        assert_eq!(buf.len(), 8 + 3 + 4);
        assert_eq!(&buf[..4], &15u32.to_be_bytes());
        assert_eq!(&buf[4..8], &4242u32.to_be_bytes());
        assert_eq!(&buf[8..], &[1, 2, 3, 0, 0, 0, 7]);
    }

    #[test]
    fn empty_payload() {
        let buf = build_sig_ps(SignaturePurpose::MerchantPaymentOk).build();
        assert_eq!(buf, [0, 0, 0, 8, 0, 0, 0x04, 0x50]);
    }

    #[test]
    fn purpose_codes() {
        assert_eq!(SignaturePurpose::WalletReserveWithdraw.code(), 1200);
        assert_eq!(SignaturePurpose::WalletCoinMelt.code(), 1202);
        assert_eq!(SignaturePurpose::WalletAgeAttestation.code(), 1207);
        assert_eq!(SignaturePurpose::MasterDenominationKeyValidity.code(), 1025);
        assert_eq!(SignaturePurpose::SyncBackupUpload.code(), 1450);
        assert_eq!(SignaturePurpose::WalletPurseEcontract.code(), 1216);
        assert_eq!(SignaturePurpose::MasterGlobalFees.code(), 1022);
    }

    #[test]
    fn amount_framing() {
        let amount: Amount = "EUR:1.5".parse().unwrap();
        let buf = amount_to_buffer(&amount);
        assert_eq!(&buf[..8], &1u64.to_be_bytes());
        assert_eq!(&buf[8..12], &50_000_000u32.to_be_bytes());
        assert_eq!(&buf[12..15], b"EUR");
        assert!(buf[15..].iter().all(|&b| b == 0));
    }

    #[test]
    fn durations_are_framed_in_micros() {
        let buf = build_sig_ps(SignaturePurpose::Test)
            .put_duration(&Duration::from_secs(3))
            .put_duration(&Duration::Forever)
            .build();
        assert_eq!(&buf[8..16], &3_000_000u64.to_be_bytes());
        assert_eq!(&buf[16..24], &[0xff; 8]);
    }

    #[test]
    fn long_currency_is_cut_to_the_field() {
        let amount: Amount = "VERYLONGCURRENCY:2".parse().unwrap();
        let buf = amount_to_buffer(&amount);
        assert_eq!(&buf[..8], &2u64.to_be_bytes());
        assert_eq!(&buf[12..], b"VERYLONGCURR");
    }

    #[test]
    fn timestamps_are_framed_in_micros() {
        let buf = build_sig_ps(SignaturePurpose::Test)
            .put_timestamp(&Timestamp::new(2))
            .put_timestamp(&Timestamp::Never)
            .build();
        assert_eq!(&buf[8..16], &2_000_000u64.to_be_bytes());
        assert_eq!(&buf[16..24], &[0xff; 8]);
    }
}
