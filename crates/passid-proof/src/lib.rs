//! Passid Proof: zero-knowledge proof handling for passport registration.
//!
//! - Groth16 verification over snarkjs-formatted keys and proofs
//! - Public-signal validation (DG1 binding, current date, age, expiration)
//! - Uniqueness circuit inputs over a Poseidon nullifier tree
//! - Proving through an external witness generator and prover

pub mod error;
pub mod groth16;
pub mod prover;
pub mod signals;
pub mod uniqueness;

pub use error::ProofError;
pub use groth16::{proof_to_points, verifying_key_to_json, Groth16Verifier};
pub use prover::{CircuitProver, CommandProver};
pub use signals::{ProofValidator, PublicSignals, ValidatedSignals, VerificationKeys};
pub use uniqueness::CircuitInputs;
