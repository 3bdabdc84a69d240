//! Binary envelope codec.
//!
//! Every blob crossing the wire is a `0x`-prefixed hexadecimal string. The
//! empty blob is the bare prefix `0x`, so it is never confused with a
//! missing value.
//!
//! # Example
//!
//! ```
//! use ancient_protocol::envelope;
//!
//! assert_eq!(envelope::encode(&[0xde, 0xad]), "0xdead");
//! assert_eq!(envelope::decode("0xDEAD").unwrap(), vec![0xde, 0xad]);
//! assert_eq!(envelope::encode(&[]), "0x");
//! assert!(envelope::decode("0x").unwrap().is_empty());
//! assert!(envelope::decode("dead").is_err());
//! ```

use ancient_store::AncientError;
use thiserror::Error;

/// The encoding of the empty blob.
pub const EMPTY_ENVELOPE: &str = "0x";

/// Errors produced when decoding an envelope.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EnvelopeError {
    /// The text does not start with `0x`.
    #[error("missing 0x prefix")]
    MissingPrefix,

    /// The number of hex digits is odd.
    #[error("odd number of hex digits ({0})")]
    OddLength(usize),

    /// A character is not a hex digit.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

impl From<EnvelopeError> for AncientError {
    fn from(err: EnvelopeError) -> Self {
        AncientError::MalformedEnvelope(err.to_string())
    }
}

/// Encodes `bytes` as a lowercase `0x`-prefixed hex string.
#[must_use]
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str(EMPTY_ENVELOPE);
    out.push_str(&hex::encode(bytes));
    out
}

/// Decodes a `0x`-prefixed hex string. Digits of either case are accepted.
///
/// # Errors
///
/// Returns an error if the prefix is missing, the digit count is odd or a
/// digit is not hexadecimal.
pub fn decode(text: &str) -> Result<Vec<u8>, EnvelopeError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .ok_or(EnvelopeError::MissingPrefix)?;
    if digits.len() % 2 != 0 {
        return Err(EnvelopeError::OddLength(digits.len()));
    }
    Ok(hex::decode(digits)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_blob_uses_marker() {
        assert_eq!(encode(&[]), EMPTY_ENVELOPE);
        assert_eq!(decode(EMPTY_ENVELOPE).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn encode_is_lowercase() {
        assert_eq!(encode(&[0xAB, 0x01]), "0xab01");
    }

    #[test]
    fn decode_accepts_uppercase() {
        assert_eq!(decode("0XAB01").unwrap(), vec![0xab, 0x01]);
    }

    #[test]
    fn decode_rejects_missing_prefix() {
        assert_eq!(decode("ab01"), Err(EnvelopeError::MissingPrefix));
        assert_eq!(decode(""), Err(EnvelopeError::MissingPrefix));
    }

    #[test]
    fn decode_rejects_odd_length() {
        assert_eq!(decode("0xabc"), Err(EnvelopeError::OddLength(3)));
    }

    #[test]
    fn decode_rejects_non_hex() {
        assert!(matches!(decode("0xzz"), Err(EnvelopeError::InvalidHex(_))));
    }

    #[test]
    fn converts_to_malformed_envelope() {
        let err: AncientError = decode("nothex").unwrap_err().into();
        assert!(matches!(err, AncientError::MalformedEnvelope(_)));
    }

    proptest! {
        #[test]
        fn round_trip(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }
    }
}
