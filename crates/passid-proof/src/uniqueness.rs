//! Inputs of the uniqueness circuit: a Poseidon tree over the nullifiers of
//! every account registered with one document.

use ark_bn254::Fr;
use passid_core::TreeParams;
use passid_crypto::{field_to_decimal, nullifier, InclusionProof, PoseidonMerkleTree};
use serde::Serialize;
use serde_json::value::RawValue;

use crate::error::ProofError;

/// Circuit inputs for one document hash.
#[derive(Debug, Clone)]
pub struct CircuitInputs {
    pub blinder: Fr,
    pub document_hash: Fr,
    /// Salts padded with zero up to the circuit's nullifier count.
    pub salts: Vec<Fr>,
    /// Leaf data, one nullifier per salt slot.
    pub leaves: Vec<Fr>,
    pub root: Fr,
    pub proofs: Vec<InclusionProof>,
}

/// Canonical form: unquoted decimal numbers, keys in lexical order.
#[derive(Serialize)]
struct CanonicalInputs {
    blinder: Box<RawValue>,
    #[serde(rename = "documentHash")]
    document_hash: Box<RawValue>,
    #[serde(rename = "proofsBranches")]
    proofs_branches: Vec<Vec<Box<RawValue>>>,
    #[serde(rename = "proofsOrder")]
    proofs_order: Vec<Vec<u8>>,
    root: Box<RawValue>,
    salt: Vec<Box<RawValue>>,
}

/// Witness-generator form: decimal strings, as read by circom witness tools.
#[derive(Serialize)]
struct WitnessInputs {
    blinder: String,
    #[serde(rename = "documentHash")]
    document_hash: String,
    salt: Vec<String>,
    root: String,
    #[serde(rename = "proofsOrder")]
    proofs_order: Vec<Vec<String>>,
    #[serde(rename = "proofsBranches")]
    proofs_branches: Vec<Vec<String>>,
}

fn raw_number(value: &Fr) -> Result<Box<RawValue>, ProofError> {
    RawValue::from_string(field_to_decimal(value))
        .map_err(|e| ProofError::ProofGenerationFailed(format!("encoding inputs: {}", e)))
}

impl CircuitInputs {
    /// Build the inputs for `salts` of accounts sharing `document_hash`.
    ///
    /// Slots past the last salt hold a zero leaf; the tree is padded with
    /// zero leaves up to `2^tree_depth`. Each slot's inclusion proof points at
    /// the first leaf carrying the same data.
    pub fn build(
        params: &TreeParams,
        blinder: &Fr,
        document_hash: &Fr,
        salts: &[Fr],
    ) -> Result<Self, ProofError> {
        if salts.len() > params.nullifiers_count {
            return Err(ProofError::TooManySalts {
                count: salts.len(),
                max: params.nullifiers_count,
            });
        }

        let zero = Fr::from(0u64);
        let mut padded_salts = salts.to_vec();
        padded_salts.resize(params.nullifiers_count, zero);

        let mut leaves = Vec::with_capacity(params.nullifiers_count);
        for salt in salts {
            leaves.push(nullifier(document_hash, blinder, salt)?);
        }
        leaves.resize(params.nullifiers_count, zero);

        let tree = PoseidonMerkleTree::with_depth(leaves.clone(), params.tree_depth)?;
        let proofs = leaves
            .iter()
            .map(|leaf| {
                tree.proof_for(leaf).ok_or_else(|| {
                    ProofError::ProofGenerationFailed("leaf missing from nullifier tree".into())
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            salts = salts.len(),
            slots = params.nullifiers_count,
            depth = params.tree_depth,
            "built uniqueness circuit inputs"
        );

        Ok(Self {
            blinder: *blinder,
            document_hash: *document_hash,
            salts: padded_salts,
            leaves,
            root: tree.root(),
            proofs,
        })
    }

    /// Whether every inclusion proof recomputes the stored root.
    pub fn paths_are_consistent(&self) -> bool {
        self.leaves
            .iter()
            .zip(&self.proofs)
            .all(|(leaf, proof)| proof.verify(leaf, &self.root))
    }

    /// Canonical JSON encoding of the inputs.
    pub fn to_json(&self) -> Result<String, ProofError> {
        let canonical = CanonicalInputs {
            blinder: raw_number(&self.blinder)?,
            document_hash: raw_number(&self.document_hash)?,
            proofs_branches: self
                .proofs
                .iter()
                .map(|p| p.siblings.iter().map(raw_number).collect::<Result<Vec<_>, _>>())
                .collect::<Result<_, _>>()?,
            proofs_order: self.proofs.iter().map(|p| p.path.clone()).collect(),
            root: raw_number(&self.root)?,
            salt: self.salts.iter().map(raw_number).collect::<Result<_, _>>()?,
        };
        serde_json::to_string(&canonical)
            .map_err(|e| ProofError::ProofGenerationFailed(format!("encoding inputs: {}", e)))
    }

    /// Inputs as consumed by a circom witness generator.
    pub fn to_witness_json(&self) -> Result<String, ProofError> {
        let inputs = WitnessInputs {
            blinder: field_to_decimal(&self.blinder),
            document_hash: field_to_decimal(&self.document_hash),
            salt: self.salts.iter().map(field_to_decimal).collect(),
            root: field_to_decimal(&self.root),
            proofs_order: self
                .proofs
                .iter()
                .map(|p| p.path.iter().map(|bit| bit.to_string()).collect())
                .collect(),
            proofs_branches: self
                .proofs
                .iter()
                .map(|p| p.siblings.iter().map(field_to_decimal).collect())
                .collect(),
        };
        serde_json::to_string(&inputs)
            .map_err(|e| ProofError::ProofGenerationFailed(format!("encoding inputs: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passid_crypto::parse_field;

    const BLINDER: &str =
        "11714559926329488462499858375762588794276508657368433057518712516415455910929";
    const DOCUMENT_HASH: &str =
        "8302794276508657323125842252912847046623971092627426530323130710715455910928";

    fn salts(values: &[&str]) -> Vec<Fr> {
        values.iter().map(|s| parse_field(s).unwrap()).collect()
    }

    fn build(params: TreeParams, salts: &[Fr]) -> CircuitInputs {
        CircuitInputs::build(
            &params,
            &parse_field(BLINDER).unwrap(),
            &parse_field(DOCUMENT_HASH).unwrap(),
            salts,
        )
        .unwrap()
    }

    #[test]
    fn test_partial_salts_are_padded() {
        let inputs = build(TreeParams::new(4, 3).unwrap(), &salts(&["55910928", "5599263"]));
        assert_eq!(inputs.salts.len(), 4);
        assert_eq!(inputs.salts[2], Fr::from(0u64));
        assert_eq!(inputs.proofs.len(), 4);
        assert!(inputs.proofs.iter().all(|p| p.siblings.len() == 3));
        // Both zero slots share the first zero leaf's path.
        assert_eq!(inputs.proofs[2], inputs.proofs[3]);
        assert_eq!(inputs.proofs[2].index, 2);
        assert!(inputs.paths_are_consistent());
    }

    #[test]
    fn test_too_many_salts() {
        let err = CircuitInputs::build(
            &TreeParams::new(2, 1).unwrap(),
            &Fr::from(1u64),
            &Fr::from(2u64),
            &salts(&["1", "2", "3"]),
        )
        .unwrap_err();
        assert!(matches!(err, ProofError::TooManySalts { count: 3, max: 2 }));
    }

    #[test]
    fn test_witness_json_quotes_numbers() {
        let inputs = build(TreeParams::new(2, 1).unwrap(), &salts(&["7"]));
        let witness: serde_json::Value =
            serde_json::from_str(&inputs.to_witness_json().unwrap()).unwrap();
        assert_eq!(witness["salt"], serde_json::json!(["7", "0"]));
        assert_eq!(witness["proofsOrder"], serde_json::json!([["0"], ["1"]]));
        assert_eq!(witness["blinder"], serde_json::json!(BLINDER));
    }

    #[test]
    fn test_canonical_json_is_unquoted() {
        let inputs = build(TreeParams::new(2, 1).unwrap(), &salts(&["7"]));
        let json = inputs.to_json().unwrap();
        assert!(json.starts_with(&format!("{{\"blinder\":{},", BLINDER)));
        assert!(json.ends_with("\"salt\":[7,0]}"));
    }
}
