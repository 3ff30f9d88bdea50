use crate::cryptography::encoding::{decode_crock, encode_crock};
use serde::{Deserialize, Deserializer, Serialize};

pub fn to_crock<S>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    encode_crock(bytes).serialize(s)
}

pub fn from_crock<'de, D>(de: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let crock_str = String::deserialize(de)?;
    decode_crock(&crock_str).map_err(|e| serde::de::Error::custom(format!("Invalid base32 string: {e}")))
}

/// Declares a public, fixed-length binary value (public keys, signatures, hashes).
///
/// The generated type serializes as a Crockford base32 string and its `Debug` output shows the encoding.
macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($len:expr);) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        $vis struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub const fn zeroed() -> Self {
                Self([0u8; $len])
            }

            pub fn try_from_slice(bytes: &[u8]) -> Result<Self, $crate::cryptography::encoding::EncodingError> {
                let arr: [u8; $len] = bytes.try_into().map_err(|_| {
                    $crate::cryptography::encoding::EncodingError::InvalidLength { expected: $len, actual: bytes.len() }
                })?;
                Ok(Self(arr))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_bytes(&self) -> [u8; $len] {
                self.0
            }

            pub fn from_crock(s: &str) -> Result<Self, $crate::cryptography::encoding::EncodingError> {
                let arr = $crate::cryptography::encoding::decode_crock_fixed::<$len>(s)?;
                Ok(Self(arr))
            }

            pub fn to_crock(&self) -> String {
                $crate::cryptography::encoding::encode_crock(&self.0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_crock())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(&self.to_crock())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
                let s = <String as serde::Deserialize>::deserialize(de)?;
                Self::from_crock(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

/// Declares a secret, fixed-length binary value (private keys, blinding secrets, seeds).
///
/// The bytes live in a [`zeroize::Zeroizing`] buffer, so cloning is safe. `Debug` only prints the type name.
macro_rules! secret_bytes {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($len:expr);) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq)]
        $vis struct $name(zeroize::Zeroizing<[u8; $len]>);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(zeroize::Zeroizing::new(bytes))
            }

            pub fn random() -> Self {
                use rand::RngCore;
                let mut bytes = zeroize::Zeroizing::new([0u8; $len]);
                rand::rng().fill_bytes(&mut bytes[..]);
                Self(bytes)
            }

            pub fn try_from_slice(bytes: &[u8]) -> Result<Self, $crate::cryptography::encoding::EncodingError> {
                if bytes.len() != $len {
                    return Err($crate::cryptography::encoding::EncodingError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    });
                }
                let mut arr = zeroize::Zeroizing::new([0u8; $len]);
                arr.copy_from_slice(bytes);
                Ok(Self(arr))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn from_crock(s: &str) -> Result<Self, $crate::cryptography::encoding::EncodingError> {
                let bytes = zeroize::Zeroizing::new($crate::cryptography::encoding::decode_crock(s)?);
                Self::try_from_slice(&bytes)
            }

            pub fn to_crock(&self) -> String {
                $crate::cryptography::encoding::encode_crock(&self.0[..])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0[..]
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(stringify!($name))
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_str(&self.to_crock())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
                let s = zeroize::Zeroizing::new(<String as serde::Deserialize>::deserialize(de)?);
                Self::from_crock(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use fixed_bytes;
pub(crate) use secret_bytes;

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawTime {
    Number(u64),
    Label(String),
}

/// A protocol timestamp with one-second resolution, or the distinguished value "never".
///
/// On the wire it is `{"t_s": <seconds>}` or `{"t_s": "never"}`. When framed into signed data it becomes a
/// big-endian count of microseconds, with "never" encoded as all ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "TimestampRepr", into = "TimestampRepr")]
pub enum Timestamp {
    Seconds(u64),
    Never,
}

#[derive(Serialize, Deserialize)]
struct TimestampRepr {
    t_s: RawTime,
}

impl Timestamp {
    /// Creates a new Timestamp from seconds since Unix epoch.
    pub fn new(seconds: u64) -> Self {
        Self::Seconds(seconds)
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    /// The value framed into signed data: microseconds since the epoch, big-endian. "Never" is `u64::MAX`.
    pub fn to_be_micros(&self) -> [u8; 8] {
        match self {
            Self::Seconds(s) => s.saturating_mul(1_000_000).to_be_bytes(),
            Self::Never => u64::MAX.to_be_bytes(),
        }
    }
}

impl From<u64> for Timestamp {
    fn from(secs: u64) -> Self {
        Self::Seconds(secs)
    }
}

impl From<Timestamp> for TimestampRepr {
    fn from(ts: Timestamp) -> Self {
        match ts {
            Timestamp::Seconds(s) => Self { t_s: RawTime::Number(s) },
            Timestamp::Never => Self { t_s: RawTime::Label("never".into()) },
        }
    }
}

impl TryFrom<TimestampRepr> for Timestamp {
    type Error = String;

    fn try_from(repr: TimestampRepr) -> Result<Self, Self::Error> {
        match repr.t_s {
            RawTime::Number(s) => Ok(Self::Seconds(s)),
            RawTime::Label(l) if l == "never" => Ok(Self::Never),
            RawTime::Label(l) => Err(format!("invalid timestamp value '{l}'")),
        }
    }
}

/// A relative protocol duration in microseconds, or "forever". Serialized as `{"d_us": ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "DurationRepr", into = "DurationRepr")]
pub enum Duration {
    Micros(u64),
    Forever,
}

#[derive(Serialize, Deserialize)]
struct DurationRepr {
    d_us: RawTime,
}

impl Duration {
    pub fn from_secs(secs: u64) -> Self {
        Self::Micros(secs.saturating_mul(1_000_000))
    }

    pub fn to_be_micros(&self) -> [u8; 8] {
        match self {
            Self::Micros(us) => us.to_be_bytes(),
            Self::Forever => u64::MAX.to_be_bytes(),
        }
    }
}

impl From<Duration> for DurationRepr {
    fn from(d: Duration) -> Self {
        match d {
            Duration::Micros(us) => Self { d_us: RawTime::Number(us) },
            Duration::Forever => Self { d_us: RawTime::Label("forever".into()) },
        }
    }
}

impl TryFrom<DurationRepr> for Duration {
    type Error = String;

    fn try_from(repr: DurationRepr) -> Result<Self, Self::Error> {
        match repr.d_us {
            RawTime::Number(us) => Ok(Self::Micros(us)),
            RawTime::Label(l) if l == "forever" => Ok(Self::Forever),
            RawTime::Label(l) => Err(format!("invalid duration value '{l}'")),
        }
    }
}
