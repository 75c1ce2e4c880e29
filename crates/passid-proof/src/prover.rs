//! Uniqueness proof generation through external circuit tooling.
//!
//! The witness generator is invoked as `<witness_command…> input.json
//! witness.wtns` and the prover as `<prover_command…> witness.wtns
//! proof.json public.json`, matching snarkjs/circom witness scripts and
//! rapidsnark.

use async_trait::async_trait;
use passid_core::{ProofPoints, ZkProof};
use passid_crypto::parse_field;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;

use crate::error::ProofError;
use crate::groth16::Groth16Verifier;
use crate::uniqueness::CircuitInputs;

/// Longest stderr excerpt carried in an error.
const STDERR_EXCERPT: usize = 512;

/// Produces a uniqueness proof for a set of circuit inputs.
#[async_trait]
pub trait CircuitProver: Send + Sync {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<ZkProof, ProofError>;
}

/// Runs a witness generator and a Groth16 prover as child processes, then
/// verifies the produced proof before returning it.
pub struct CommandProver {
    witness_command: Vec<String>,
    prover_command: Vec<String>,
    verifier: Arc<Groth16Verifier>,
    work_dir: Option<PathBuf>,
}

impl CommandProver {
    pub fn new(
        witness_command: Vec<String>,
        prover_command: Vec<String>,
        verifier: Arc<Groth16Verifier>,
    ) -> Result<Self, ProofError> {
        if witness_command.is_empty() || prover_command.is_empty() {
            return Err(ProofError::ProofGenerationFailed(
                "witness and prover commands must not be empty".into(),
            ));
        }
        Ok(Self {
            witness_command,
            prover_command,
            verifier,
            work_dir: None,
        })
    }

    /// Create scratch directories under `dir` instead of the system temp dir.
    pub fn with_work_dir(mut self, dir: PathBuf) -> Self {
        self.work_dir = Some(dir);
        self
    }

    fn scratch_dir(&self) -> Result<tempfile::TempDir, ProofError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("uniqueness-");
        let dir = match &self.work_dir {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        dir.map_err(|e| ProofError::ProofGenerationFailed(format!("scratch dir: {}", e)))
    }
}

async fn run_step(step: &str, argv: &[String], files: &[&Path]) -> Result<(), ProofError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ProofError::ProofGenerationFailed(format!("{}: empty command", step)))?;

    let output = Command::new(program)
        .args(args)
        .args(files)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            ProofError::ProofGenerationFailed(format!("{}: cannot run {}: {}", step, program, e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let excerpt: String = stderr
            .chars()
            .skip(stderr.chars().count().saturating_sub(STDERR_EXCERPT))
            .collect();
        return Err(ProofError::ProofGenerationFailed(format!(
            "{} exited with {}: {}",
            step,
            output.status,
            excerpt.trim()
        )));
    }
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ProofError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        ProofError::ProofGenerationFailed(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        ProofError::ProofGenerationFailed(format!("cannot parse {}: {}", path.display(), e))
    })
}

#[async_trait]
impl CircuitProver for CommandProver {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<ZkProof, ProofError> {
        let dir = self.scratch_dir()?;
        let input_path = dir.path().join("input.json");
        let witness_path = dir.path().join("witness.wtns");
        let proof_path = dir.path().join("proof.json");
        let public_path = dir.path().join("public.json");

        tokio::fs::write(&input_path, inputs.to_witness_json()?)
            .await
            .map_err(|e| ProofError::ProofGenerationFailed(format!("writing inputs: {}", e)))?;

        run_step("witness generator", &self.witness_command, &[&input_path, &witness_path])
            .await?;
        run_step(
            "prover",
            &self.prover_command,
            &[&witness_path, &proof_path, &public_path],
        )
        .await?;

        let points: ProofPoints = read_json(&proof_path).await?;
        let pub_signals: Vec<String> = read_json(&public_path).await?;
        let public = pub_signals
            .iter()
            .map(|s| parse_field(s))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ProofError::ProofGenerationFailed(format!("public signals: {}", e)))?;

        let verifier = self.verifier.clone();
        let checked = points.clone();
        tokio::task::spawn_blocking(move || verifier.verify(&checked, &public))
            .await
            .map_err(|e| ProofError::ProofGenerationFailed(format!("verification task: {}", e)))?
            .map_err(|e| {
                ProofError::ProofGenerationFailed(format!("self-verification failed: {}", e))
            })?;

        tracing::info!(
            root = %passid_crypto::field_to_decimal(&inputs.root),
            public_signals = pub_signals.len(),
            "uniqueness proof generated"
        );

        Ok(ZkProof {
            proof: points,
            pub_signals,
        })
    }
}
