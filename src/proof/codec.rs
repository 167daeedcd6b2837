//! Text encoding of proofs.
//!
//! Proofs cross the workflow-variable boundary only as [`SerializedProof`]
//! values. The encoding follows the protobuf JSON mapping used by the proving
//! backend: lowerCamelCase field names, base64 for bytes, default-valued fields
//! omitted.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to read a [`SerializedProof`] back into a [`Proof`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("serialized proof is not a valid proof document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("serialized proof is empty")]
    Empty,
}

/// A proof produced by the backend: an opaque certificate plus the public
/// output of the proven computation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Proof {
    /// Opaque certificate bytes (the zkVM receipt).
    #[serde(default, with = "base64_bytes", skip_serializing_if = "Vec::is_empty")]
    pub receipt: Vec<u8>,
    #[serde(default, alias = "public_output", skip_serializing_if = "String::is_empty")]
    pub public_output: String,
}

impl Proof {
    pub fn new(receipt: impl Into<Vec<u8>>, public_output: impl Into<String>) -> Self {
        Proof {
            receipt: receipt.into(),
            public_output: public_output.into(),
        }
    }
}

/// The portable text form of a [`Proof`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedProof(String);

impl SerializedProof {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for SerializedProof {
    fn from(value: String) -> Self {
        SerializedProof(value)
    }
}

impl From<&str> for SerializedProof {
    fn from(value: &str) -> Self {
        SerializedProof(value.to_string())
    }
}

impl fmt::Display for SerializedProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Encode a proof into its text form.
pub fn serialize(proof: &Proof) -> SerializedProof {
    // A `Proof` only holds a string and base64-encoded bytes, which always encode.
    let json = serde_json::to_string(proof).expect("proof encoding is infallible");
    SerializedProof(json)
}

/// Decode the text form produced by [`serialize`].
pub fn parse(serialized: &SerializedProof) -> Result<Proof, DecodeError> {
    let text = serialized.as_str().trim();
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(serde_json::from_str(text)?)
}

mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(&encoded)
            .or_else(|_| URL_SAFE.decode(&encoded))
            .map_err(D::Error::custom)
    }
}
