//! Crockford base32, the textual encoding for every binary value on the wire.
//!
//! The alphabet is `0123456789ABCDEFGHJKMNPQRSTVWXYZ`. Encoding pads the final 5-bit group with zero bits and never
//! emits padding characters. Decoding is case-insensitive, folds the look-alike letters `O`, `I`, `L` and `U` onto
//! their canonical symbols, and silently drops any leftover bits that do not complete a byte.

use thiserror::Error;

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("Invalid Crockford base32 symbol '{symbol}' at position {position}")]
    InvalidSymbol { symbol: char, position: usize },
    #[error("Invalid length. Expected {expected} bytes, but got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

fn symbol_value(c: char) -> Option<u8> {
    let v = match c.to_ascii_uppercase() {
        d @ '0'..='9' => d as u8 - b'0',
        'O' => 0,
        'I' | 'L' => 1,
        'U' => 27,
        c => ALPHABET.iter().position(|&a| a as char == c)? as u8,
    };
    Some(v)
}

/// Encode `data` as Crockford base32.
pub fn encode_crock(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8).div_ceil(5));
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for &byte in data {
        acc = (acc << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((acc >> bits) & 0x1f) as usize] as char);
        }
        acc &= (1 << bits) - 1;
    }
    if bits > 0 {
        out.push(ALPHABET[((acc << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}

/// Decode a Crockford base32 string. The result has `floor(len * 5 / 8)` bytes.
pub fn decode_crock(encoded: &str) -> Result<Vec<u8>, EncodingError> {
    let mut out = Vec::with_capacity(encoded.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits = 0u32;
    for (position, symbol) in encoded.chars().enumerate() {
        let v = symbol_value(symbol).ok_or(EncodingError::InvalidSymbol { symbol, position })?;
        acc = (acc << 5) | v as u32;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }
    Ok(out)
}

/// Decode a Crockford base32 string that must hold exactly `N` bytes.
pub fn decode_crock_fixed<const N: usize>(encoded: &str) -> Result<[u8; N], EncodingError> {
    let bytes = decode_crock(encoded)?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| EncodingError::InvalidLength { expected: N, actual: len })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encode_known_strings() {
        assert_eq!(encode_crock(b"Hello, World"), "91JPRV3F5GG5EVVJDHJ0");
        assert_eq!(encode_crock(b""), "");
        assert_eq!(encode_crock(&[0xff]), "ZW");
    }

    #[test]
    fn decode_known_strings() {
        assert_eq!(decode_crock("94KPT83PCNS7J83KC5P78Y8").unwrap(), b"I'm very salty");
        assert_eq!(decode_crock("91JPRV3F5GG5EVVJDHJ0").unwrap(), b"Hello, World");
    }

    #[test]
    fn decoding_is_lenient_about_case_and_lookalikes() {
        let canonical = decode_crock("91JPRV3F5GG5EVVJDHJ0").unwrap();
        assert_eq!(decode_crock("91jprv3f5gg5evvjdhj0").unwrap(), canonical);
        assert_eq!(decode_crock("O").unwrap(), decode_crock("0").unwrap());
        assert_eq!(decode_crock("IIII").unwrap(), decode_crock("1111").unwrap());
        assert_eq!(decode_crock("llll").unwrap(), decode_crock("1111").unwrap());
        assert_eq!(decode_crock("UU").unwrap(), decode_crock("VV").unwrap());
    }

    #[test]
    fn decoding_drops_incomplete_trailing_bits() {
        // 3 symbols carry 15 bits, which is one full byte.
        assert_eq!(decode_crock("ZZZ").unwrap(), vec![0xff]);
        assert_eq!(decode_crock("Z").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn invalid_symbols_are_rejected() {
        let err = decode_crock("91JP-V3F").unwrap_err();
        assert_eq!(err, EncodingError::InvalidSymbol { symbol: '-', position: 4 });
        assert!(decode_crock("ABC=").is_err());
    }

    #[test]
    fn fixed_length_decoding() {
        let bytes: [u8; 14] = decode_crock_fixed("94KPT83PCNS7J83KC5P78Y8").unwrap();
        assert_eq!(&bytes, b"I'm very salty");
        let err = decode_crock_fixed::<32>("94KPT83PCNS7J83KC5P78Y8").unwrap_err();
        assert_eq!(err, EncodingError::InvalidLength { expected: 32, actual: 14 });
    }

    #[test]
    fn round_trip_all_lengths() {
        let data: Vec<u8> = (0u8..=255).collect();
        for len in 0..70 {
            let slice = &data[len..len * 2];
            assert_eq!(decode_crock(&encode_crock(slice)).unwrap(), slice);
        }
    }
}
