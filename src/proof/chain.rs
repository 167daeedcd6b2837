//! The ordered, append-only proof chain of one workflow instance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::codec::{self, DecodeError, Proof, SerializedProof};

/// Ordered sequence of serialized proofs, in computation order.
///
/// Elements can only be added through [`ProofChain::append`], which runs the
/// codec, and only be read through [`ProofChain::parse_all`]. Nothing is ever
/// removed or reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofChain(Vec<SerializedProof>);

impl ProofChain {
    pub fn new() -> Self {
        ProofChain(Vec::new())
    }

    /// Rebuild a chain from the values stored in the workflow instance.
    pub fn from_stored(entries: Vec<SerializedProof>) -> Self {
        ProofChain(entries)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize `proof` and append it; returns the appended element.
    pub fn append(&mut self, proof: &Proof) -> &SerializedProof {
        self.0.push(codec::serialize(proof));
        &self.0[self.0.len() - 1]
    }

    /// Decode every element, preserving order.
    pub fn parse_all(&self) -> Result<Vec<Proof>, DecodeError> {
        self.0.iter().map(codec::parse).collect()
    }

    /// The stored form: a JSON list of the serialized proofs, in order.
    pub fn to_variable(&self) -> Value {
        Value::Array(
            self.0
                .iter()
                .map(|element| Value::String(element.as_str().to_string()))
                .collect(),
        )
    }

    /// Decode the most recently appended element.
    pub fn parse_last(&self) -> Option<Result<Proof, DecodeError>> {
        self.0.last().map(codec::parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_grows_by_one_and_keeps_order() {
        let mut chain = ProofChain::new();
        assert!(chain.is_empty());

        let first = Proof::new(b"p1".to_vec(), "1");
        let second = Proof::new(b"p2".to_vec(), "2");
        let appended = chain.append(&first).clone();
        assert_eq!(appended, codec::serialize(&first));
        chain.append(&second);

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.parse_all().unwrap(), vec![first, second.clone()]);
        assert_eq!(chain.parse_last().unwrap().unwrap(), second);
    }

    #[test]
    fn test_empty_chain_parses_to_nothing() {
        let chain = ProofChain::default();
        assert!(chain.parse_all().unwrap().is_empty());
        assert!(chain.parse_last().is_none());
    }

    #[test]
    fn test_corrupt_element_fails_whole_parse() {
        let chain = ProofChain::from_stored(vec![
            codec::serialize(&Proof::new(b"ok".to_vec(), "1")),
            SerializedProof::from("garbage"),
        ]);
        assert!(chain.parse_all().is_err());
    }

    #[test]
    fn test_stored_form_is_a_plain_string_list() {
        let mut chain = ProofChain::new();
        chain.append(&Proof::new(Vec::new(), "7"));
        let value = serde_json::to_value(&chain).unwrap();
        assert_eq!(value, serde_json::json!([r#"{"publicOutput":"7"}"#]));
        assert_eq!(chain.to_variable(), value);
    }

    #[test]
    fn test_variable_form_keeps_every_element() {
        let mut chain = ProofChain::from_stored(vec![
            SerializedProof::from("first"),
            SerializedProof::from("second"),
        ]);
        chain.append(&Proof::new(b"p3".to_vec(), "3"));
        let stored: ProofChain = serde_json::from_value(chain.to_variable()).unwrap();
        assert_eq!(stored, chain);
        assert_eq!(stored.len(), 3);
    }
}
