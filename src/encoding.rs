//! Secret encodings
//!
//! The negotiated configuration fixes how the human-relayed secret is
//! presented: an encoding type plus the number of symbols shown to the
//! user. The protocol currently defines exactly one encoding type,
//! hexadecimal, and the set is deliberately closed.

use serde::{Deserialize, Serialize};

use crate::{PairingError, Result};

/// Closed set of secret encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingType {
    /// Secret shown as hexadecimal digits, two symbols per byte.
    Hexadecimal,
}

/// One secret encoding: a type plus a symbol count.
///
/// `symbol_length` is the number of user-visible symbols making up the
/// full secret (gamma). It must be even — gamma is half alpha prefix,
/// half nonce — and at least 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    /// Encoding type
    pub encoding_type: EncodingType,
    /// Number of secret symbols
    pub symbol_length: u32,
}

impl Encoding {
    /// Create a hexadecimal encoding with the given symbol length.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::InvalidArgument`] if the symbol length is
    /// odd or less than 2.
    pub fn hexadecimal(symbol_length: u32) -> Result<Self> {
        let encoding = Self {
            encoding_type: EncodingType::Hexadecimal,
            symbol_length,
        };
        encoding.validate()?;
        Ok(encoding)
    }

    /// Check the symbol-length invariant.
    pub fn validate(&self) -> Result<()> {
        if self.symbol_length < 2 || self.symbol_length % 2 != 0 {
            return Err(PairingError::InvalidArgument(format!(
                "encoding symbol length must be even and >= 2, got {}",
                self.symbol_length
            )));
        }
        Ok(())
    }

    /// Nonce size in bytes for this encoding: the bytes covered by half
    /// the secret's symbols.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::InvalidArgument`] if half the symbols do
    /// not fill at least one whole byte.
    pub fn nonce_length(&self) -> Result<usize> {
        let encoder = SecretEncoder::for_type(self.encoding_type);
        let bytes = (self.symbol_length as usize / 2) / encoder.symbols_per_byte();
        if bytes == 0 {
            return Err(PairingError::InvalidArgument(format!(
                "symbol length {} too short for a whole-byte nonce",
                self.symbol_length
            )));
        }
        Ok(bytes)
    }
}

/// Encoder for a secret encoding type, resolved once during
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoder {
    /// Hexadecimal digits via the `hex` crate.
    Hexadecimal,
}

impl SecretEncoder {
    /// Resolve the encoder for an encoding type.
    pub fn for_type(encoding_type: EncodingType) -> Self {
        match encoding_type {
            EncodingType::Hexadecimal => SecretEncoder::Hexadecimal,
        }
    }

    /// Number of user-visible symbols per byte.
    pub fn symbols_per_byte(&self) -> usize {
        match self {
            SecretEncoder::Hexadecimal => 2,
        }
    }

    /// Encode secret bytes into the user-visible string.
    pub fn encode_to_string(&self, secret: &[u8]) -> String {
        match self {
            SecretEncoder::Hexadecimal => hex::encode_upper(secret),
        }
    }

    /// Decode a user-entered string back into secret bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PairingError::InvalidArgument`] if the string is not
    /// valid for this encoding.
    pub fn decode_from_string(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            SecretEncoder::Hexadecimal => hex::decode(text.trim())
                .map_err(|e| PairingError::InvalidArgument(format!("invalid hex secret: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_length_invariant() {
        assert!(Encoding::hexadecimal(4).is_ok());
        assert!(Encoding::hexadecimal(64).is_ok());

        assert!(matches!(
            Encoding::hexadecimal(0),
            Err(PairingError::InvalidArgument(_))
        ));
        assert!(matches!(
            Encoding::hexadecimal(3),
            Err(PairingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_nonce_length() {
        // 4 hex symbols: 2 for the nonce, 2 symbols per byte -> 1 byte.
        assert_eq!(Encoding::hexadecimal(4).unwrap().nonce_length().unwrap(), 1);
        assert_eq!(Encoding::hexadecimal(8).unwrap().nonce_length().unwrap(), 2);

        // 2 symbols leave a sub-byte nonce, which is not expressible.
        assert!(matches!(
            Encoding::hexadecimal(2).unwrap().nonce_length(),
            Err(PairingError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_hex_round_trip() {
        let encoder = SecretEncoder::for_type(EncodingType::Hexadecimal);
        let secret = [0xde, 0xad, 0xbe, 0xef];

        let text = encoder.encode_to_string(&secret);
        assert_eq!(text, "DEADBEEF");
        assert_eq!(encoder.decode_from_string(&text).unwrap(), secret);

        // Users copy secrets with surrounding whitespace.
        assert_eq!(encoder.decode_from_string(" deadbeef ").unwrap(), secret);
    }

    #[test]
    fn test_hex_decode_rejects_garbage() {
        let encoder = SecretEncoder::Hexadecimal;
        assert!(matches!(
            encoder.decode_from_string("not hex"),
            Err(PairingError::InvalidArgument(_))
        ));
    }
}
