//! # Topicstore Codec
//!
//! CBOR encoding for every record the topic store persists: messages,
//! acknowledgment entries, consumer references, subscriptions and batch
//! positions.
//!
//! Records are plain serde types. The journal stores the CBOR bytes as an
//! opaque body, so the framing layer never depends on record layout.
//!
//! ## Usage
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use topicstore_codec::{Decode, Encode};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Position {
//!     entry: u64,
//!     message_id: String,
//! }
//!
//! let position = Position { entry: 7, message_id: "m7".into() };
//! let bytes = position.encode().unwrap();
//! assert_eq!(Position::decode(&bytes).unwrap(), position);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decodes a value from CBOR bytes.
///
/// Trailing bytes after the first complete item are rejected.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let value = ciborium::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::decoding_failed(format!(
            "{} trailing bytes after record",
            reader.len()
        )));
    }
    Ok(value)
}

/// Trait for types that can be encoded to CBOR.
pub trait Encode {
    /// Encode this value to CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T: Serialize> Encode for T {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }
}

impl<T: DeserializeOwned> Decode for T {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
