use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// Number of fractional units in one unit of currency.
pub const FRACTIONAL_BASE: u32 = 100_000_000;
/// Number of decimal digits in the fractional part.
pub const FRACTIONAL_LENGTH: usize = 8;
/// Largest representable integer part, 2^52.
pub const MAX_AMOUNT_VALUE: u64 = 1 << 52;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Malformed amount string: '{0}'")]
    Malformed(String),
    #[error("Invalid currency code: '{0}'")]
    InvalidCurrency(String),
    #[error("Currency mismatch: {0} vs {1}")]
    CurrencyMismatch(String, String),
    #[error("Amount value {0} exceeds the maximum of 2^52")]
    ValueTooLarge(u64),
    #[error("Division by zero")]
    DivisionByZero,
}

/// A non-negative fixed-point amount of money in a named currency.
///
/// The fraction is always kept in `[0, FRACTIONAL_BASE)`, the value never exceeds [`MAX_AMOUNT_VALUE`] and the
/// currency code is stored upper-cased. The textual form is `"CUR:V[.F]"`; JSON uses the same string, but the
/// object form `{currency, value, fraction}` is accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AmountRepr", into = "String")]
pub struct Amount {
    currency: String,
    value: u64,
    fraction: u32,
}

/// The result of an arithmetic operation that clamps instead of overflowing.
///
/// An overflowing addition yields the maximal amount and an underflowing subtraction yields zero, both with
/// `saturated` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaturatingAmount {
    pub amount: Amount,
    pub saturated: bool,
}

impl SaturatingAmount {
    fn exact(amount: Amount) -> Self {
        Self { amount, saturated: false }
    }

    fn saturated(amount: Amount) -> Self {
        Self { amount, saturated: true }
    }

    /// The amount if no saturation happened.
    pub fn checked(self) -> Option<Amount> {
        (!self.saturated).then_some(self.amount)
    }
}

/// The explicit object form of an amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountJson {
    pub currency: String,
    pub value: u64,
    pub fraction: u32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AmountRepr {
    Text(String),
    Object(AmountJson),
}

fn is_currency_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '*' || c == '-'
}

fn validate_currency(currency: &str) -> Result<String, AmountError> {
    if currency.is_empty() || !currency.chars().all(is_currency_char) {
        return Err(AmountError::InvalidCurrency(currency.to_string()));
    }
    Ok(currency.to_ascii_uppercase())
}

impl Amount {
    /// Creates a new amount, normalizing a fraction of one unit or more into the value.
    pub fn new(currency: &str, value: u64, fraction: u32) -> Result<Self, AmountError> {
        let currency = validate_currency(currency)?;
        let value = value
            .checked_add((fraction / FRACTIONAL_BASE) as u64)
            .filter(|v| *v <= MAX_AMOUNT_VALUE)
            .ok_or(AmountError::ValueTooLarge(value))?;
        Ok(Self { currency, value, fraction: fraction % FRACTIONAL_BASE })
    }

    /// The zero amount in `currency`. Invalid codes are not checked here, so this is only used with currencies
    /// taken from existing amounts.
    fn zero_unchecked(currency: &str) -> Self {
        Self { currency: currency.to_string(), value: 0, fraction: 0 }
    }

    fn max_unchecked(currency: &str) -> Self {
        Self { currency: currency.to_string(), value: MAX_AMOUNT_VALUE, fraction: FRACTIONAL_BASE - 1 }
    }

    pub fn zero(currency: &str) -> Result<Self, AmountError> {
        Ok(Self::zero_unchecked(&validate_currency(currency)?))
    }

    /// The largest representable amount in `currency`.
    pub fn max_value(currency: &str) -> Result<Self, AmountError> {
        Ok(Self::max_unchecked(&validate_currency(currency)?))
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn fraction(&self) -> u32 {
        self.fraction
    }

    pub fn is_zero(&self) -> bool {
        self.value == 0 && self.fraction == 0
    }

    pub fn is_non_zero(&self) -> bool {
        !self.is_zero()
    }

    pub fn same_currency(&self, other: &Amount) -> bool {
        self.currency.eq_ignore_ascii_case(&other.currency)
    }

    fn check_currency(&self, other: &Amount) -> Result<(), AmountError> {
        if self.same_currency(other) {
            Ok(())
        } else {
            Err(AmountError::CurrencyMismatch(self.currency.clone(), other.currency.clone()))
        }
    }

    pub fn add(&self, other: &Amount) -> Result<SaturatingAmount, AmountError> {
        Self::add_all(self, [other])
    }

    /// Sums `first` and every amount in `rest`, saturating at the maximal amount.
    pub fn add_all<'a>(
        first: &Amount,
        rest: impl IntoIterator<Item = &'a Amount>,
    ) -> Result<SaturatingAmount, AmountError> {
        let rest: Vec<&Amount> = rest.into_iter().collect();
        for x in &rest {
            first.check_currency(x)?;
        }
        let mut value = first.value;
        let mut fraction = first.fraction;
        for x in rest {
            let total_fraction = fraction + x.fraction;
            value += x.value + (total_fraction / FRACTIONAL_BASE) as u64;
            fraction = total_fraction % FRACTIONAL_BASE;
            if value > MAX_AMOUNT_VALUE {
                return Ok(SaturatingAmount::saturated(Self::max_unchecked(&first.currency)));
            }
        }
        Ok(SaturatingAmount::exact(Self { currency: first.currency.clone(), value, fraction }))
    }

    pub fn sub(&self, other: &Amount) -> Result<SaturatingAmount, AmountError> {
        Self::sub_all(self, [other])
    }

    /// Subtracts every amount in `rest` from `first`. The first underflow yields zero with `saturated` set.
    pub fn sub_all<'a>(
        first: &Amount,
        rest: impl IntoIterator<Item = &'a Amount>,
    ) -> Result<SaturatingAmount, AmountError> {
        let rest: Vec<&Amount> = rest.into_iter().collect();
        for x in &rest {
            first.check_currency(x)?;
        }
        let mut value = first.value;
        let mut fraction = first.fraction;
        for x in rest {
            if x.fraction > fraction {
                if value < 1 {
                    return Ok(SaturatingAmount::saturated(Self::zero_unchecked(&first.currency)));
                }
                value -= 1;
                fraction += FRACTIONAL_BASE;
            }
            fraction -= x.fraction;
            if x.value > value {
                return Ok(SaturatingAmount::saturated(Self::zero_unchecked(&first.currency)));
            }
            value -= x.value;
        }
        Ok(SaturatingAmount::exact(Self { currency: first.currency.clone(), value, fraction }))
    }

    /// Compares two amounts of the same currency.
    pub fn cmp_amount(&self, other: &Amount) -> Result<Ordering, AmountError> {
        self.check_currency(other)?;
        Ok((self.value, self.fraction).cmp(&(other.value, other.fraction)))
    }

    /// Multiplies by `n` using repeated doubling. The result saturates like [`Amount::add`].
    pub fn mult(&self, n: u64) -> SaturatingAmount {
        let mut acc = Self::zero_unchecked(&self.currency);
        if n == 0 {
            return SaturatingAmount::exact(acc);
        }
        let mut x = self.clone();
        let mut n = n;
        while n > 1 {
            if n % 2 == 0 {
                n /= 2;
            } else {
                n = (n - 1) / 2;
                match Self::add_internal(&acc, &x) {
                    Some(sum) => acc = sum,
                    None => return SaturatingAmount::saturated(Self::max_unchecked(&self.currency)),
                }
            }
            match Self::add_internal(&x, &x) {
                Some(doubled) => x = doubled,
                None => return SaturatingAmount::saturated(Self::max_unchecked(&self.currency)),
            }
        }
        match Self::add_internal(&acc, &x) {
            Some(sum) => SaturatingAmount::exact(sum),
            None => SaturatingAmount::saturated(Self::max_unchecked(&self.currency)),
        }
    }

    // Same-currency addition that reports overflow as `None`.
    fn add_internal(a: &Amount, b: &Amount) -> Option<Amount> {
        let total_fraction = a.fraction + b.fraction;
        let value = a.value + b.value + (total_fraction / FRACTIONAL_BASE) as u64;
        (value <= MAX_AMOUNT_VALUE).then(|| Self {
            currency: a.currency.clone(),
            value,
            fraction: total_fraction % FRACTIONAL_BASE,
        })
    }

    /// Divides by `n`, truncating toward zero at the smallest fractional unit.
    pub fn divide(&self, n: u64) -> Result<Amount, AmountError> {
        if n == 0 {
            return Err(AmountError::DivisionByZero);
        }
        if n == 1 {
            return Ok(self.clone());
        }
        let r = (self.value % n) as u128;
        let fraction = ((r * FRACTIONAL_BASE as u128 + self.fraction as u128) / n as u128) as u32;
        Ok(Self { currency: self.currency.clone(), value: self.value / n, fraction })
    }

    pub fn min<'a>(&'a self, other: &'a Amount) -> Result<&'a Amount, AmountError> {
        match self.cmp_amount(other)? {
            Ordering::Greater => Ok(other),
            _ => Ok(self),
        }
    }

    pub fn max<'a>(&'a self, other: &'a Amount) -> Result<&'a Amount, AmountError> {
        match self.cmp_amount(other)? {
            Ordering::Less => Ok(other),
            _ => Ok(self),
        }
    }

    /// Parses `"CUR:V[.F]"`, returning `None` for anything malformed.
    pub fn parse(s: &str) -> Option<Self> {
        s.parse().ok()
    }

    /// The numeric part of the amount, with at least `min_fraction_digits` fractional digits.
    pub fn stringify_value(&self, min_fraction_digits: usize) -> String {
        let digits = format!("{:08}", self.fraction);
        let significant = digits.trim_end_matches('0').len().max(min_fraction_digits.min(FRACTIONAL_LENGTH));
        if significant == 0 {
            self.value.to_string()
        } else {
            format!("{}.{}", self.value, &digits[..significant])
        }
    }

    pub fn to_json_object(&self) -> AmountJson {
        AmountJson { currency: self.currency.clone(), value: self.value, fraction: self.fraction }
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.currency, self.stringify_value(0))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || AmountError::Malformed(s.to_string());
        let (currency, number) = s.split_once(':').ok_or_else(malformed)?;
        let (whole, frac) = match number.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (number, None),
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        let fraction = match frac {
            None => 0,
            Some(f) if f.is_empty() || f.len() > FRACTIONAL_LENGTH || !f.chars().all(|c| c.is_ascii_digit()) => {
                return Err(malformed());
            }
            Some(f) => format!("{f:0<8}").parse::<u32>().map_err(|_| malformed())?,
        };
        let value = whole.parse::<u64>().map_err(|_| AmountError::ValueTooLarge(u64::MAX))?;
        if value > MAX_AMOUNT_VALUE {
            return Err(AmountError::ValueTooLarge(value));
        }
        let currency = validate_currency(currency)?;
        Ok(Self { currency, value, fraction })
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl TryFrom<AmountJson> for Amount {
    type Error = AmountError;

    fn try_from(json: AmountJson) -> Result<Self, Self::Error> {
        if json.fraction >= FRACTIONAL_BASE {
            return Err(AmountError::Malformed(format!("fraction {} out of range", json.fraction)));
        }
        if json.value > MAX_AMOUNT_VALUE {
            return Err(AmountError::ValueTooLarge(json.value));
        }
        Ok(Self { currency: validate_currency(&json.currency)?, value: json.value, fraction: json.fraction })
    }
}

impl TryFrom<AmountRepr> for Amount {
    type Error = AmountError;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        match repr {
            AmountRepr::Text(s) => s.parse(),
            AmountRepr::Object(o) => o.try_into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_stringify() {
        let a = amt("EUR:1.5");
        assert_eq!(a.value(), 1);
        assert_eq!(a.fraction(), 50_000_000);
        assert_eq!(a.to_string(), "EUR:1.5");
        assert_eq!(amt("eur:10").to_string(), "EUR:10");
        assert_eq!(amt("KUDOS:0.00000001").fraction(), 1);
        assert_eq!(amt("KUDOS:0.10").to_string(), "KUDOS:0.1");
        assert_eq!(amt("TESTKUDOS:4503599627370496").value(), MAX_AMOUNT_VALUE);
    }

    #[test]
    fn parse_rejects_malformed() {
        for s in [
            "EUR",
            "EUR:",
            "EUR:1.",
            "EUR:.5",
            "EUR:1.000000001",
            "EUR:1.2.3",
            "EUR:-1",
            "E UR:1",
            ":1",
            "EUR:4503599627370497",
            "EUR:99999999999999999999999",
            "EUR$:1",
        ] {
            assert!(Amount::parse(s).is_none(), "{s} should not parse");
        }
    }

    #[test]
    fn long_currency_codes_parse() {
        let a = amt("verylongcurrency:1.5");
        assert_eq!(a.currency(), "VERYLONGCURRENCY");
        assert_eq!(a.to_string(), "VERYLONGCURRENCY:1.5");
    }

    #[test]
    fn stringify_with_minimum_digits() {
        assert_eq!(amt("EUR:1").stringify_value(2), "1.00");
        assert_eq!(amt("EUR:1.5").stringify_value(2), "1.50");
        assert_eq!(amt("EUR:1.123").stringify_value(2), "1.123");
    }

    #[test]
    fn add_carries_fraction() {
        let r = amt("EUR:0.6").add(&amt("EUR:0.7")).unwrap();
        assert!(!r.saturated);
        assert_eq!(r.amount, amt("EUR:1.3"));
        let r = Amount::add_all(&amt("EUR:1"), [&amt("EUR:2"), &amt("EUR:3.5")]).unwrap();
        assert_eq!(r.amount, amt("EUR:6.5"));
    }

    #[test]
    fn add_saturates() {
        let max = Amount::max_value("EUR").unwrap();
        let r = max.add(&amt("EUR:0.00000001")).unwrap();
        assert!(r.saturated);
        assert_eq!(r.amount, max);
        assert_eq!(r.amount.fraction(), FRACTIONAL_BASE - 1);
    }

    #[test]
    fn currency_is_case_insensitive_but_checked() {
        let a = Amount::new("eur", 1, 0).unwrap();
        assert_eq!(a.currency(), "EUR");
        assert!(a.add(&amt("EUR:1")).is_ok());
        assert!(matches!(a.add(&amt("USD:1")), Err(AmountError::CurrencyMismatch(_, _))));
        assert!(a.cmp_amount(&amt("USD:1")).is_err());
        assert!(a.sub(&amt("USD:1")).is_err());
    }

    #[test]
    fn sub_borrows_and_underflows() {
        let r = amt("EUR:2.3").sub(&amt("EUR:0.5")).unwrap();
        assert_eq!(r.amount, amt("EUR:1.8"));
        assert!(!r.saturated);
        let r = amt("EUR:1").sub(&amt("EUR:1.5")).unwrap();
        assert!(r.saturated);
        assert!(r.amount.is_zero());
        let r = amt("EUR:0.1").sub(&amt("EUR:0.2")).unwrap();
        assert!(r.saturated);
        let r = Amount::sub_all(&amt("EUR:10"), [&amt("EUR:3"), &amt("EUR:2.5")]).unwrap();
        assert_eq!(r.amount, amt("EUR:4.5"));
    }

    #[test]
    fn compare() {
        assert_eq!(amt("EUR:1").cmp_amount(&amt("EUR:1")).unwrap(), Ordering::Equal);
        assert_eq!(amt("EUR:1.1").cmp_amount(&amt("EUR:1")).unwrap(), Ordering::Greater);
        assert_eq!(amt("EUR:0.9").cmp_amount(&amt("EUR:1")).unwrap(), Ordering::Less);
        assert_eq!(amt("EUR:2").min(&amt("EUR:3")).unwrap(), &amt("EUR:2"));
        assert_eq!(amt("EUR:2").max(&amt("EUR:3")).unwrap(), &amt("EUR:3"));
    }

    #[test]
    fn multiply() {
        assert_eq!(amt("EUR:1.5").mult(0).amount, amt("EUR:0"));
        assert_eq!(amt("EUR:1.5").mult(1).amount, amt("EUR:1.5"));
        assert_eq!(amt("EUR:1.5").mult(3).amount, amt("EUR:4.5"));
        assert_eq!(amt("EUR:0.25").mult(8).amount, amt("EUR:2"));
        assert_eq!(amt("EUR:0.00000001").mult(7).amount, amt("EUR:0.00000007"));
        let r = amt("EUR:4503599627370496").mult(2);
        assert!(r.saturated);
        assert_eq!(r.amount, Amount::max_value("EUR").unwrap());
    }

    #[test]
    fn divide() {
        assert_eq!(amt("EUR:10").divide(4).unwrap(), amt("EUR:2.5"));
        assert_eq!(amt("EUR:1").divide(3).unwrap(), amt("EUR:0.33333333"));
        assert_eq!(amt("EUR:7.5").divide(1).unwrap(), amt("EUR:7.5"));
        assert_eq!(amt("EUR:1").divide(0), Err(AmountError::DivisionByZero));
        assert!(amt("EUR:0.00000001").divide(2).unwrap().is_zero());
        let big = amt("EUR:4503599627370496").divide(u64::MAX).unwrap();
        assert_eq!(big.value(), 0);
        assert!(big.fraction() < FRACTIONAL_BASE);
    }

    #[test]
    fn new_normalizes_fraction() {
        let a = Amount::new("EUR", 1, 250_000_000).unwrap();
        assert_eq!(a, amt("EUR:3.5"));
        assert!(Amount::new("EUR", MAX_AMOUNT_VALUE, FRACTIONAL_BASE).is_err());
        assert!(Amount::new("E!R", 1, 0).is_err());
    }

    #[test]
    fn json_forms() {
        let a: Amount = serde_json::from_str(r#""EUR:1.5""#).unwrap();
        assert_eq!(a, amt("EUR:1.5"));
        let b: Amount = serde_json::from_str(r#"{"currency":"EUR","value":1,"fraction":50000000}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), r#""EUR:1.5""#);
        assert_eq!(Amount::try_from(a.to_json_object()).unwrap(), a);
        assert!(serde_json::from_str::<Amount>(r#"{"currency":"EUR","value":1,"fraction":100000000}"#).is_err());
    }
}
