//! Typed views over job variables.
//!
//! The workflow engine hands every job an untyped variable map. Each operation
//! kind reads it once, at the boundary, into its own input record; a missing
//! required value is `MissingVariable`, a value of the wrong shape is
//! `InvalidVariable`. Optional inputs fall back to their empty form.

use std::path::Path;

use anyhow::Context as _;
use serde_json::{Value, json};

use super::kind::OperationKind;
use crate::proof::{ProofChain, SerializedProof};
use crate::{AmbassadorError, AmbassadorResult};

/// Variables of one job, or a delta to merge into the workflow instance.
pub type VariableMap = serde_json::Map<String, Value>;

/// Variable names shared with the workflow models.
pub mod names {
    pub const A: &str = "a";
    pub const B: &str = "b";
    pub const OPERATION: &str = "operation";
    pub const COMPOSITION: &str = "composition";
    pub const PREVIOUS_PROOF: &str = "previous_proof";
    pub const PROOF_CHAIN: &str = "proof_chain";
    pub const METHOD_PAYLOAD: &str = "method_payload";
    pub const PUBLIC_OUTPUT: &str = "public_output";
    pub const VERIFICATION_OUTPUT: &str = "verification_output";
    pub const IS_VALID_EXECUTED: &str = "is_valid_executed";
}

/// Inputs of a Prove step.
#[derive(Debug, Clone, PartialEq)]
pub struct ProveInputs {
    pub a: Value,
    pub b: Value,
    pub operation: String,
    /// Set iff the step continues a previous proof (`composition = true`).
    pub previous_proof: Option<SerializedProof>,
    pub chain: ProofChain,
}

impl ProveInputs {
    pub fn from_variables(variables: &VariableMap) -> AmbassadorResult<Self> {
        let a = required_scalar(variables, names::A)?;
        let b = required_scalar(variables, names::B)?;
        let operation = required_string(variables, names::OPERATION)?;
        let composition = optional_bool(variables, names::COMPOSITION)?.unwrap_or(false);
        let previous_proof = if composition {
            Some(
                optional_proof(variables, names::PREVIOUS_PROOF)?
                    .ok_or_else(|| AmbassadorError::MissingVariable(names::PREVIOUS_PROOF.into()))?,
            )
        } else {
            None
        };
        let chain = optional_chain(variables)?;
        Ok(ProveInputs {
            a,
            b,
            operation,
            previous_proof,
            chain,
        })
    }

    /// The document describing this step to the proving program.
    pub fn method_payload(&self) -> String {
        json!({ "a": self.a, "b": self.b, "operation": self.operation }).to_string()
    }
}

/// Inputs of a Verify step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyInputs {
    /// `None` produces an empty verify request.
    pub proof: Option<SerializedProof>,
}

impl VerifyInputs {
    pub fn from_variables(variables: &VariableMap) -> AmbassadorResult<Self> {
        Ok(VerifyInputs {
            proof: optional_proof(variables, names::PREVIOUS_PROOF)?,
        })
    }
}

/// Inputs of a Compose step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComposeInputs {
    pub chain: ProofChain,
}

impl ComposeInputs {
    pub fn from_variables(variables: &VariableMap) -> AmbassadorResult<Self> {
        Ok(ComposeInputs {
            chain: optional_chain(variables)?,
        })
    }
}

/// Inputs of a Combine step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombineInputs {
    pub method_payload: Vec<String>,
}

impl CombineInputs {
    pub fn from_variables(variables: &VariableMap) -> AmbassadorResult<Self> {
        let method_payload = match present(variables, names::METHOD_PAYLOAD) {
            None => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| text_of(item, names::METHOD_PAYLOAD))
                .collect::<AmbassadorResult<_>>()?,
            Some(other) => return Err(invalid(names::METHOD_PAYLOAD, "a list of strings", other)),
        };
        Ok(CombineInputs { method_payload })
    }
}

/// Validated inputs of one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepInputs {
    Prove(ProveInputs),
    Verify(VerifyInputs),
    Compose(ComposeInputs),
    Combine(CombineInputs),
}

impl StepInputs {
    pub fn from_variables(kind: OperationKind, variables: &VariableMap) -> AmbassadorResult<Self> {
        Ok(match kind {
            OperationKind::Prove => StepInputs::Prove(ProveInputs::from_variables(variables)?),
            OperationKind::Verify => StepInputs::Verify(VerifyInputs::from_variables(variables)?),
            OperationKind::Compose => StepInputs::Compose(ComposeInputs::from_variables(variables)?),
            OperationKind::Combine => StepInputs::Combine(CombineInputs::from_variables(variables)?),
        })
    }
}

/// Read job variables from a JSON file holding one object.
pub fn load_variables(path: &Path) -> anyhow::Result<VariableMap> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON object of job variables", path.display()))
}

/// Merge a completion delta into instance variables, replacing top-level
/// keys the way the workflow engine does.
pub fn merge_variables(instance: &mut VariableMap, delta: VariableMap) {
    for (name, value) in delta {
        instance.insert(name, value);
    }
}

// `null` counts as absent.
fn present<'a>(variables: &'a VariableMap, name: &str) -> Option<&'a Value> {
    variables.get(name).filter(|v| !v.is_null())
}

fn invalid(name: &str, expected: &str, got: &Value) -> AmbassadorError {
    AmbassadorError::InvalidVariable {
        name: name.to_string(),
        reason: format!("expected {expected}, got {got}"),
    }
}

fn required_scalar(variables: &VariableMap, name: &str) -> AmbassadorResult<Value> {
    match present(variables, name) {
        None => Err(AmbassadorError::MissingVariable(name.to_string())),
        Some(value @ (Value::Number(_) | Value::String(_) | Value::Bool(_))) => Ok(value.clone()),
        Some(other) => Err(invalid(name, "a scalar", other)),
    }
}

fn required_string(variables: &VariableMap, name: &str) -> AmbassadorResult<String> {
    match present(variables, name) {
        None => Err(AmbassadorError::MissingVariable(name.to_string())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(invalid(name, "a string", other)),
    }
}

fn optional_bool(variables: &VariableMap, name: &str) -> AmbassadorResult<Option<bool>> {
    match present(variables, name) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(invalid(name, "a boolean", other)),
    }
}

fn optional_proof(
    variables: &VariableMap,
    name: &str,
) -> AmbassadorResult<Option<SerializedProof>> {
    present(variables, name)
        .map(|value| text_of(value, name).map(SerializedProof::from))
        .transpose()
}

fn optional_chain(variables: &VariableMap) -> AmbassadorResult<ProofChain> {
    match present(variables, names::PROOF_CHAIN) {
        None => Ok(ProofChain::new()),
        Some(Value::Array(items)) => {
            let entries = items
                .iter()
                .map(|item| text_of(item, names::PROOF_CHAIN).map(SerializedProof::from))
                .collect::<AmbassadorResult<_>>()?;
            Ok(ProofChain::from_stored(entries))
        }
        Some(other) => Err(invalid(names::PROOF_CHAIN, "a list of serialized proofs", other)),
    }
}

// Strings are taken verbatim; a JSON object someone stored unserialized is
// re-encoded to its text form.
fn text_of(value: &Value, name: &str) -> AmbassadorResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Object(_) => Ok(value.to_string()),
        other => Err(invalid(name, "a string", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(value: Value) -> VariableMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("test variables must be an object"),
        }
    }

    #[test]
    fn test_prove_inputs_payload_document() {
        let inputs =
            ProveInputs::from_variables(&vars(json!({"a": 2, "b": 3, "operation": "add"}))).unwrap();
        assert_eq!(inputs.method_payload(), r#"{"a":2,"b":3,"operation":"add"}"#);
        assert!(inputs.previous_proof.is_none());
        assert!(inputs.chain.is_empty());
    }

    #[test]
    fn test_prove_inputs_missing_operand() {
        let err = ProveInputs::from_variables(&vars(json!({"a": 2, "operation": "add"})))
            .unwrap_err();
        assert!(matches!(err, AmbassadorError::MissingVariable(name) if name == "b"));

        let err = ProveInputs::from_variables(&vars(json!({"a": 2, "b": null, "operation": "add"})))
            .unwrap_err();
        assert!(matches!(err, AmbassadorError::MissingVariable(name) if name == "b"));
    }

    #[test]
    fn test_prove_inputs_composition_requires_previous_proof() {
        let err = ProveInputs::from_variables(&vars(
            json!({"a": 1, "b": 1, "operation": "mul", "composition": true}),
        ))
        .unwrap_err();
        assert!(matches!(err, AmbassadorError::MissingVariable(name) if name == "previous_proof"));
    }

    #[test]
    fn test_prove_inputs_ignore_previous_proof_without_composition() {
        let inputs = ProveInputs::from_variables(&vars(json!({
            "a": 1, "b": 1, "operation": "mul", "composition": false, "previous_proof": "{}"
        })))
        .unwrap();
        assert!(inputs.previous_proof.is_none());
    }

    #[test]
    fn test_wrong_shapes_are_invalid_not_panics() {
        let cases = [
            json!({"a": [1], "b": 1, "operation": "add"}),
            json!({"a": 1, "b": 1, "operation": 7}),
            json!({"a": 1, "b": 1, "operation": "add", "composition": "yes"}),
            json!({"a": 1, "b": 1, "operation": "add", "proof_chain": "p1"}),
            json!({"a": 1, "b": 1, "operation": "add", "proof_chain": [1]}),
        ];
        for case in cases {
            let err = ProveInputs::from_variables(&vars(case.clone())).unwrap_err();
            assert!(
                matches!(err, AmbassadorError::InvalidVariable { .. }),
                "{case} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_optional_inputs_default_to_empty() {
        let empty = VariableMap::new();
        assert_eq!(VerifyInputs::from_variables(&empty).unwrap(), VerifyInputs::default());
        assert_eq!(ComposeInputs::from_variables(&empty).unwrap(), ComposeInputs::default());
        assert_eq!(CombineInputs::from_variables(&empty).unwrap(), CombineInputs::default());
    }

    #[test]
    fn test_combine_inputs_keep_order() {
        let inputs =
            CombineInputs::from_variables(&vars(json!({"method_payload": ["m2", "m1", "m3"]})))
                .unwrap();
        assert_eq!(inputs.method_payload, vec!["m2", "m1", "m3"]);

        let err = CombineInputs::from_variables(&vars(json!({"method_payload": [true]})))
            .unwrap_err();
        assert!(matches!(err, AmbassadorError::InvalidVariable { .. }));
    }

    #[test]
    fn test_object_proof_is_reencoded_as_text() {
        let inputs =
            VerifyInputs::from_variables(&vars(json!({"previous_proof": {"publicOutput": "4"}})))
                .unwrap();
        assert_eq!(inputs.proof.unwrap().as_str(), r#"{"publicOutput":"4"}"#);
    }

    #[test]
    fn test_load_variables_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, r#"{"a": 2, "b": 3, "operation": "add"}"#).unwrap();
        let variables = load_variables(&path).unwrap();
        assert_eq!(variables["operation"], json!("add"));

        std::fs::write(&path, "[1, 2]").unwrap();
        let err = AmbassadorError::from(load_variables(&path).unwrap_err());
        assert!(matches!(err, AmbassadorError::Anyhow(_)));
        assert!(format!("{err:#}").contains("job.json"));

        assert!(load_variables(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_merge_replaces_top_level_keys() {
        let mut instance = vars(json!({"a": 1, "proof_chain": ["x"]}));
        merge_variables(&mut instance, vars(json!({"proof_chain": ["x", "y"], "public_output": "3"})));
        assert_eq!(
            Value::Object(instance),
            json!({"a": 1, "proof_chain": ["x", "y"], "public_output": "3"})
        );
    }
}
