//! Proof artifacts and the proof chain.
//!
//! - `codec`: text form of a single proof, the only representation stored in
//!   workflow variables.
//! - `chain`: the append-only sequence of serialized proofs a workflow
//!   instance accumulates across Prove and Compose steps.

pub mod chain;
pub mod codec;

pub use chain::ProofChain;
pub use codec::{DecodeError, Proof, SerializedProof, parse, serialize};
