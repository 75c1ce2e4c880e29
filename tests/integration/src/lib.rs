//! Shared fixtures and fakes for the cross-crate tests.

use ark_bn254::{Bn254, Fr};
use ark_groth16::Groth16;
use ark_relations::lc;
use ark_relations::r1cs::{ConstraintSynthesizer, ConstraintSystemRef, SynthesisError, Variable};
use ark_snark::SNARK;
use ark_std::rand::{rngs::StdRng, SeedableRng};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use num_bigint::BigUint;
use passid_core::{DocumentSod, ProofPoints, ZkProof};
use passid_credentials::{CredentialIssuer, CredentialRecord, IssueRequest, IssuerError};
use passid_document::TrustStore;
use passid_node::Clock;
use passid_proof::{proof_to_points, verifying_key_to_json, Groth16Verifier};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

pub const MASTER_CERTS: &[u8] =
    include_bytes!("../../../crates/passid-document/tests/fixtures/master_certs.pem");
pub const SOD_SHA256_RSA: &str =
    include_str!("../../../crates/passid-document/tests/fixtures/sod_sha256_rsa.json");
pub const SOD_SHA256_ECDSA: &str =
    include_str!("../../../crates/passid-document/tests/fixtures/sod_sha256_ecdsa.json");
pub const SOD_SHA1_ECDSA: &str =
    include_str!("../../../crates/passid-document/tests/fixtures/sod_sha1_ecdsa.json");

pub fn trust_store() -> Arc<TrustStore> {
    Arc::new(TrustStore::from_pem_bundle(MASTER_CERTS).unwrap())
}

pub fn sod(json: &str) -> DocumentSod {
    serde_json::from_str(json).unwrap()
}

/// Circuit whose only constraints tie each public input to itself, so any
/// signal vector yields a valid proof.
struct EchoCircuit {
    signals: Vec<Fr>,
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

/// A verifier and a matching proof over `signals`.
pub fn prove(signals: &[String]) -> (Arc<Groth16Verifier>, ZkProof) {
    let public: Vec<Fr> = signals
        .iter()
        .map(|s| passid_crypto::parse_field(s).unwrap())
        .collect();
    let mut rng = StdRng::seed_from_u64(7);
    let (pk, vk) = Groth16::<Bn254>::circuit_specific_setup(
        EchoCircuit {
            signals: public.clone(),
        },
        &mut rng,
    )
    .unwrap();
    let proof = Groth16::<Bn254>::prove(&pk, EchoCircuit { signals: public }, &mut rng).unwrap();

    let verifier = Groth16Verifier::from_json(&verifying_key_to_json(&vk)).unwrap();
    let points: ProofPoints = proof_to_points(&proof);
    (
        Arc::new(verifier),
        ZkProof {
            proof: points,
            pub_signals: signals.to_vec(),
        },
    )
}

/// Registration circuit signals binding `dg1_hash` and `today`.
pub fn registration_signals(dg1_hash: &[u8], today: NaiveDate, age: u32) -> Vec<String> {
    let (high, low) = dg1_hash.split_at(dg1_hash.len() / 2);
    vec![
        BigUint::from_bytes_be(high).to_string(),
        BigUint::from_bytes_be(low).to_string(),
        "8400".into(),
        (today.year() - 2000).to_string(),
        today.month().to_string(),
        today.day().to_string(),
        "31".into(),
        "12".into(),
        "31".into(),
        age.to_string(),
    ]
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Issuer that records every request.
#[derive(Default)]
pub struct RecordingIssuer {
    pub issued: Mutex<Vec<IssueRequest>>,
}

impl RecordingIssuer {
    pub fn issued_count(&self) -> usize {
        self.issued.lock().unwrap().len()
    }
}

#[async_trait]
impl CredentialIssuer for RecordingIssuer {
    async fn issue(&self, request: &IssueRequest) -> Result<Uuid, IssuerError> {
        self.issued.lock().unwrap().push(request.clone());
        Ok(Uuid::now_v7())
    }

    async fn get_credential(&self, claim_id: Uuid) -> Result<CredentialRecord, IssuerError> {
        Ok(CredentialRecord {
            id: claim_id.to_string(),
            revoked: false,
            rev_nonce: 1,
            expired: false,
            user_id: String::new(),
            schema_type: String::new(),
        })
    }

    async fn revoke(&self, _rev_nonce: i64) -> Result<(), IssuerError> {
        Ok(())
    }
}
