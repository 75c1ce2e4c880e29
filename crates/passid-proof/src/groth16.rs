//! Groth16 verification over BN254 using snarkjs JSON encodings.

use ark_bn254::{Bn254, Fq, Fq2, Fr, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{Groth16, PreparedVerifyingKey, Proof, VerifyingKey};
use num_bigint::BigUint;
use passid_core::ProofPoints;
use passid_crypto::field::parse_biguint;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ProofError;

/// snarkjs `verification_key.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VerifyingKeyJson {
    #[serde(default)]
    protocol: String,
    #[serde(default)]
    curve: String,
    #[serde(rename = "nPublic")]
    n_public: usize,
    vk_alpha_1: Vec<String>,
    vk_beta_2: Vec<Vec<String>>,
    vk_gamma_2: Vec<Vec<String>>,
    vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<String>>,
}

/// A prepared Groth16 verification key for one circuit.
pub struct Groth16Verifier {
    pvk: PreparedVerifyingKey<Bn254>,
    n_public: usize,
}

impl std::fmt::Debug for Groth16Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Groth16Verifier")
            .field("n_public", &self.n_public)
            .finish()
    }
}

impl Groth16Verifier {
    pub fn new(vk: VerifyingKey<Bn254>) -> Self {
        let n_public = vk.gamma_abc_g1.len().saturating_sub(1);
        Self {
            pvk: ark_groth16::prepare_verifying_key(&vk),
            n_public,
        }
    }

    /// Parse a snarkjs verification key.
    pub fn from_json(json: &str) -> Result<Self, ProofError> {
        let raw: VerifyingKeyJson = serde_json::from_str(json)
            .map_err(|e| ProofError::VerificationKey(e.to_string()))?;

        if !raw.protocol.is_empty() && raw.protocol != "groth16" {
            return Err(ProofError::VerificationKey(format!(
                "unsupported protocol {}",
                raw.protocol
            )));
        }
        if !raw.curve.is_empty() && raw.curve != "bn128" {
            return Err(ProofError::VerificationKey(format!(
                "unsupported curve {}",
                raw.curve
            )));
        }
        if raw.ic.len() != raw.n_public + 1 {
            return Err(ProofError::VerificationKey(format!(
                "IC has {} points for {} public inputs",
                raw.ic.len(),
                raw.n_public
            )));
        }

        let key_err = |e: ProofError| ProofError::VerificationKey(e.to_string());
        let vk = VerifyingKey::<Bn254> {
            alpha_g1: parse_g1(&raw.vk_alpha_1).map_err(key_err)?,
            beta_g2: parse_g2(&raw.vk_beta_2).map_err(key_err)?,
            gamma_g2: parse_g2(&raw.vk_gamma_2).map_err(key_err)?,
            delta_g2: parse_g2(&raw.vk_delta_2).map_err(key_err)?,
            gamma_abc_g1: raw
                .ic
                .iter()
                .map(|point| parse_g1(point))
                .collect::<Result<Vec<_>, _>>()
                .map_err(key_err)?,
        };
        Ok(Self::new(vk))
    }

    /// Load a snarkjs verification key from disk.
    pub fn load(path: &Path) -> Result<Self, ProofError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ProofError::VerificationKey(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Number of public inputs the circuit expects.
    pub fn n_public(&self) -> usize {
        self.n_public
    }

    /// Verify `proof` against `public_inputs`.
    pub fn verify(&self, proof: &ProofPoints, public_inputs: &[Fr]) -> Result<(), ProofError> {
        if public_inputs.len() != self.n_public {
            return Err(ProofError::MalformedSignals(format!(
                "expected {} public signals, got {}",
                self.n_public,
                public_inputs.len()
            )));
        }
        if proof.protocol != "groth16" {
            return Err(ProofError::MalformedProof(format!(
                "unsupported protocol {}",
                proof.protocol
            )));
        }

        let proof = Proof::<Bn254> {
            a: parse_g1(&proof.pi_a)?,
            b: parse_g2(&proof.pi_b)?,
            c: parse_g1(&proof.pi_c)?,
        };

        let valid = Groth16::<Bn254>::verify_proof(&self.pvk, &proof, public_inputs)
            .map_err(|e| ProofError::ProofInvalid(e.to_string()))?;
        if !valid {
            return Err(ProofError::ProofInvalid("pairing check failed".into()));
        }
        Ok(())
    }
}

fn parse_fq(value: &str) -> Result<Fq, ProofError> {
    let parsed =
        parse_biguint(value).map_err(|e| ProofError::MalformedProof(e.to_string()))?;
    if parsed >= BigUint::from(Fq::MODULUS) {
        return Err(ProofError::MalformedProof(format!(
            "coordinate exceeds base field: {}",
            value
        )));
    }
    Ok(Fq::from(parsed))
}

/// Parse `[x, y, z]` where z is "1" for affine points and "0" for infinity.
fn parse_g1(coords: &[String]) -> Result<G1Affine, ProofError> {
    match coords {
        [x, y] => g1_affine(x, y),
        [_, _, z] if z.trim() == "0" => Ok(G1Affine::zero()),
        [x, y, z] if z.trim() == "1" => g1_affine(x, y),
        _ => Err(ProofError::MalformedProof(format!(
            "G1 point must be [x, y, 1], got {} coordinates",
            coords.len()
        ))),
    }
}

fn g1_affine(x: &str, y: &str) -> Result<G1Affine, ProofError> {
    let point = G1Affine::new_unchecked(parse_fq(x)?, parse_fq(y)?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ProofError::MalformedProof("G1 point not on curve".into()));
    }
    Ok(point)
}

fn parse_fq2(pair: &[String]) -> Result<Fq2, ProofError> {
    match pair {
        [c0, c1] => Ok(Fq2::new(parse_fq(c0)?, parse_fq(c1)?)),
        _ => Err(ProofError::MalformedProof(
            "Fq2 element must have two coefficients".into(),
        )),
    }
}

/// Parse `[[x0, x1], [y0, y1], [z0, z1]]`.
fn parse_g2(coords: &[Vec<String>]) -> Result<G2Affine, ProofError> {
    let is = |pair: &Vec<String>, c0: &str, c1: &str| {
        pair.len() == 2 && pair[0].trim() == c0 && pair[1].trim() == c1
    };
    match coords {
        [_, _, z] if is(z, "0", "0") => Ok(G2Affine::zero()),
        [x, y, z] if is(z, "1", "0") => g2_affine(x, y),
        [x, y] => g2_affine(x, y),
        _ => Err(ProofError::MalformedProof(format!(
            "G2 point must be [[x0, x1], [y0, y1], [1, 0]], got {} coordinates",
            coords.len()
        ))),
    }
}

fn g2_affine(x: &[String], y: &[String]) -> Result<G2Affine, ProofError> {
    let point = G2Affine::new_unchecked(parse_fq2(x)?, parse_fq2(y)?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ProofError::MalformedProof("G2 point not on curve".into()));
    }
    Ok(point)
}

fn fq_to_decimal(value: &Fq) -> String {
    BigUint::from_bytes_be(&value.into_bigint().to_bytes_be()).to_string()
}

fn g1_to_json(point: &G1Affine) -> Vec<String> {
    match point.xy() {
        Some((x, y)) => vec![fq_to_decimal(x), fq_to_decimal(y), "1".into()],
        None => vec!["0".into(), "1".into(), "0".into()],
    }
}

fn g2_to_json(point: &G2Affine) -> Vec<Vec<String>> {
    match point.xy() {
        Some((x, y)) => vec![
            vec![fq_to_decimal(&x.c0), fq_to_decimal(&x.c1)],
            vec![fq_to_decimal(&y.c0), fq_to_decimal(&y.c1)],
            vec!["1".into(), "0".into()],
        ],
        None => vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ],
    }
}

/// Encode an arkworks proof in snarkjs layout.
pub fn proof_to_points(proof: &Proof<Bn254>) -> ProofPoints {
    ProofPoints {
        pi_a: g1_to_json(&proof.a),
        pi_b: g2_to_json(&proof.b),
        pi_c: g1_to_json(&proof.c),
        protocol: "groth16".into(),
        curve: "bn128".into(),
    }
}

/// Encode an arkworks verifying key as a snarkjs `verification_key.json`.
pub fn verifying_key_to_json(vk: &VerifyingKey<Bn254>) -> String {
    let raw = VerifyingKeyJson {
        protocol: "groth16".into(),
        curve: "bn128".into(),
        n_public: vk.gamma_abc_g1.len().saturating_sub(1),
        vk_alpha_1: g1_to_json(&vk.alpha_g1),
        vk_beta_2: g2_to_json(&vk.beta_g2),
        vk_gamma_2: g2_to_json(&vk.gamma_g2),
        vk_delta_2: g2_to_json(&vk.delta_g2),
        ic: vk.gamma_abc_g1.iter().map(g1_to_json).collect(),
    };
    serde_json::to_string_pretty(&raw).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ark_relations::lc;
    use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError, Variable};
    use ark_snark::SNARK;
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    /// Circuit exposing its inputs as public signals.
    pub(crate) struct EchoCircuit {
        pub signals: Vec<Fr>,
    }

    impl ConstraintSynthesizer<Fr> for EchoCircuit {
        fn generate_constraints(self, cs: ConstraintSystemRef<Fr>) -> Result<(), SynthesisError> {
            for signal in self.signals {
                let v = cs.new_input_variable(|| Ok(signal))?;
                cs.enforce_constraint(lc!() + v, lc!() + Variable::One, lc!() + v)?;
            }
            Ok(())
        }
    }

    /// Produce a snarkjs-encoded verification key and proof over `signals`.
    pub(crate) fn prove_signals(signals: &[Fr]) -> (String, ProofPoints) {
        let mut rng = StdRng::seed_from_u64(42);
        let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(
            EchoCircuit {
                signals: signals.to_vec(),
            },
            &mut rng,
        )
        .unwrap();
        let proof = Groth16::<Bn254>::prove(
            &pk,
            EchoCircuit {
                signals: signals.to_vec(),
            },
            &mut rng,
        )
        .unwrap();
        (verifying_key_to_json(&vk), proof_to_points(&proof))
    }

    #[test]
    fn test_roundtrip_valid_proof() {
        let signals = vec![Fr::from(3u64), Fr::from(5u64)];
        let (vk_json, points) = prove_signals(&signals);
        let verifier = Groth16Verifier::from_json(&vk_json).unwrap();
        assert_eq!(verifier.n_public(), 2);
        verifier.verify(&points, &signals).unwrap();
    }

    #[test]
    fn test_wrong_public_input_rejected() {
        let signals = vec![Fr::from(3u64), Fr::from(5u64)];
        let (vk_json, points) = prove_signals(&signals);
        let verifier = Groth16Verifier::from_json(&vk_json).unwrap();
        let err = verifier
            .verify(&points, &[Fr::from(3u64), Fr::from(6u64)])
            .unwrap_err();
        assert!(matches!(err, ProofError::ProofInvalid(_)));
    }

    #[test]
    fn test_signal_count_mismatch() {
        let signals = vec![Fr::from(1u64)];
        let (vk_json, points) = prove_signals(&signals);
        let verifier = Groth16Verifier::from_json(&vk_json).unwrap();
        assert!(matches!(
            verifier.verify(&points, &[]),
            Err(ProofError::MalformedSignals(_))
        ));
    }

    #[test]
    fn test_off_curve_point_rejected() {
        let signals = vec![Fr::from(1u64)];
        let (vk_json, mut points) = prove_signals(&signals);
        let verifier = Groth16Verifier::from_json(&vk_json).unwrap();
        points.pi_a[1] = "2".into();
        assert!(matches!(
            verifier.verify(&points, &signals),
            Err(ProofError::MalformedProof(_))
        ));
    }

    #[test]
    fn test_vk_ic_length_checked() {
        let signals = vec![Fr::from(1u64)];
        let (vk_json, _) = prove_signals(&signals);
        let mut raw: serde_json::Value = serde_json::from_str(&vk_json).unwrap();
        raw["nPublic"] = serde_json::json!(4);
        assert!(matches!(
            Groth16Verifier::from_json(&raw.to_string()),
            Err(ProofError::VerificationKey(_))
        ));
    }

    #[test]
    fn test_identity_encoding() {
        assert_eq!(g1_to_json(&G1Affine::zero()), vec!["0", "1", "0"]);
        assert_eq!(parse_g1(&g1_to_json(&G1Affine::zero())).unwrap(), G1Affine::zero());
    }
}
