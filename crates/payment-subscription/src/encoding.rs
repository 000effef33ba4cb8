pub use bincode::{Decode, Encode};

use crate::error::EncodingError;

/// Trait for binary encoding/decoding with hex string support.
///
/// Datums and redeemers handed to the transaction builder use this encoding.
pub trait Encodable {
    fn encode(&self) -> Result<Vec<u8>, EncodingError>
    where
        Self: Encode,
    {
        Ok(bincode::encode_to_vec(self, bincode::config::standard())?)
    }

    /// Decode from binary and fail if trailing bytes remain.
    fn decode(buf: &[u8]) -> Result<Self, EncodingError>
    where
        Self: Sized + Decode<()>,
    {
        let (decoded, consumed) = bincode::decode_from_slice(buf, bincode::config::standard())?;
        if consumed != buf.len() {
            return Err(EncodingError::TrailingBytes {
                consumed,
                total: buf.len(),
            });
        }

        Ok(decoded)
    }

    fn to_hex(&self) -> Result<String, EncodingError>
    where
        Self: Encode,
    {
        Ok(hex::encode(Encodable::encode(self)?))
    }

    fn from_hex(hex: &str) -> Result<Self, EncodingError>
    where
        Self: Sized + Decode<()>,
    {
        Encodable::decode(&hex::decode(hex)?)
    }
}
