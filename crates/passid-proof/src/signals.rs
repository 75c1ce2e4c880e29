//! Public-signal layout and validation of registration proofs.

use ark_bn254::Fr;
use chrono::{DateTime, NaiveDate, Utc};
use num_bigint::BigUint;
use passid_core::{HashFamily, ZkProof};
use passid_crypto::field::{field_from_biguint, minimal_be_bytes, parse_biguint};
use std::sync::Arc;

use crate::error::ProofError;
use crate::groth16::Groth16Verifier;

/// Number of public signals emitted by the registration circuit.
pub const SIGNAL_COUNT: usize = 10;

const DG1_HASH_HIGH: usize = 0;
const DG1_HASH_LOW: usize = 1;
const ISSUING_AUTHORITY: usize = 2;
const CURRENT_DATE: usize = 3;
const EXPIRATION_DATE: usize = 6;
const AGE: usize = 9;

/// Dates in the circuit are encoded as years since 2000.
const YEAR_BASE: i32 = 2000;

/// Parsed registration public signals, in circuit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSignals {
    values: Vec<BigUint>,
}

impl PublicSignals {
    /// Parse the decimal or hex signal strings. Every signal must be a
    /// canonical scalar.
    pub fn parse(signals: &[String]) -> Result<Self, ProofError> {
        if signals.len() != SIGNAL_COUNT {
            return Err(ProofError::MalformedSignals(format!(
                "expected {} public signals, got {}",
                SIGNAL_COUNT,
                signals.len()
            )));
        }
        let values = signals
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let value = parse_biguint(raw)
                    .map_err(|_| ProofError::MalformedSignals(format!("signal {} is not a number", i)))?;
                field_from_biguint(&value).map_err(|_| {
                    ProofError::MalformedSignals(format!("signal {} exceeds the scalar field", i))
                })?;
                Ok(value)
            })
            .collect::<Result<Vec<_>, ProofError>>()?;
        Ok(Self { values })
    }

    /// Signals as field elements for Groth16 verification.
    pub fn field_elements(&self) -> Vec<Fr> {
        self.values.iter().map(|v| Fr::from(v.clone())).collect()
    }

    /// DG1 hash reassembled from its two halves.
    pub fn dg1_hash(&self) -> Vec<u8> {
        let mut bytes = minimal_be_bytes(&self.values[DG1_HASH_HIGH]);
        bytes.extend(minimal_be_bytes(&self.values[DG1_HASH_LOW]));
        bytes
    }

    pub fn issuing_authority(&self) -> Result<i64, ProofError> {
        i64::try_from(&self.values[ISSUING_AUTHORITY]).map_err(|_| {
            ProofError::MalformedSignals("issuing authority does not fit in i64".into())
        })
    }

    pub fn age(&self) -> u64 {
        u64::try_from(&self.values[AGE]).unwrap_or(u64::MAX)
    }

    fn small(&self, index: usize) -> Result<u32, ProofError> {
        u32::try_from(&self.values[index])
            .map_err(|_| ProofError::MalformedSignals(format!("signal {} is out of range", index)))
    }

    /// Raw `(year, month, day)` triple starting at `index`.
    fn date_parts(&self, index: usize) -> Result<(i32, u32, u32), ProofError> {
        let year_offset = self.small(index)?;
        let year = i32::try_from(year_offset)
            .ok()
            .and_then(|offset| YEAR_BASE.checked_add(offset))
            .ok_or_else(|| ProofError::MalformedSignals("year out of range".into()))?;
        Ok((year, self.small(index + 1)?, self.small(index + 2)?))
    }

    fn date(&self, index: usize) -> Result<Option<NaiveDate>, ProofError> {
        let (year, month, day) = self.date_parts(index)?;
        Ok(NaiveDate::from_ymd_opt(year, month, day))
    }

    /// Date the proof was generated for.
    pub fn current_date(&self) -> Result<Option<NaiveDate>, ProofError> {
        self.date(CURRENT_DATE)
    }

    /// Document expiration date.
    pub fn expiration_date(&self) -> Result<NaiveDate, ProofError> {
        self.date(EXPIRATION_DATE)?.ok_or_else(|| {
            ProofError::MalformedSignals("expiration is not a calendar date".into())
        })
    }
}

/// Values extracted from a validated proof, forwarded to the issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSignals {
    pub issuing_authority: i64,
    pub expiration: DateTime<Utc>,
}

/// Verification keys per passport signature hash family.
#[derive(Debug, Clone)]
pub struct VerificationKeys {
    pub sha1: Arc<Groth16Verifier>,
    pub sha256: Arc<Groth16Verifier>,
}

impl VerificationKeys {
    /// Pair the per-family keys, checking each was set up for the
    /// registration circuit's public signals.
    pub fn new(sha1: Arc<Groth16Verifier>, sha256: Arc<Groth16Verifier>) -> Result<Self, ProofError> {
        for (family, key) in [(HashFamily::Sha1, &sha1), (HashFamily::Sha256, &sha256)] {
            if key.n_public() != SIGNAL_COUNT {
                return Err(ProofError::VerificationKey(format!(
                    "{} key expects {} public signals, registration proofs carry {}",
                    family,
                    key.n_public(),
                    SIGNAL_COUNT
                )));
            }
        }
        Ok(Self { sha1, sha256 })
    }

    pub fn for_family(&self, family: HashFamily) -> &Groth16Verifier {
        match family {
            HashFamily::Sha1 => &self.sha1,
            HashFamily::Sha256 => &self.sha256,
        }
    }
}

/// Verifies registration proofs and cross-checks their public signals.
#[derive(Debug, Clone)]
pub struct ProofValidator {
    keys: VerificationKeys,
    min_age: u32,
}

impl ProofValidator {
    pub fn new(keys: VerificationKeys, min_age: u32) -> Self {
        Self { keys, min_age }
    }

    pub fn min_age(&self) -> u32 {
        self.min_age
    }

    /// Validate `proof` for a document whose DG1 hash is `dg1_hash`.
    ///
    /// Order: Groth16, DG1 binding, current date (exact match with `today`),
    /// minimum age, expiration.
    pub fn validate(
        &self,
        proof: &ZkProof,
        family: HashFamily,
        dg1_hash: &[u8],
        today: NaiveDate,
    ) -> Result<ValidatedSignals, ProofError> {
        let signals = PublicSignals::parse(&proof.pub_signals)?;

        self.keys
            .for_family(family)
            .verify(&proof.proof, &signals.field_elements())?;

        if signals.dg1_hash() != dg1_hash {
            return Err(ProofError::Dg1Mismatch);
        }

        let (year, month, day) = signals.date_parts(CURRENT_DATE)?;
        if signals.current_date()? != Some(today) {
            return Err(ProofError::DateMismatch {
                proof: format!("{:04}-{:02}-{:02}", year, month, day),
                today,
            });
        }

        let age = signals.age();
        if age < u64::from(self.min_age) {
            return Err(ProofError::AgeTooLow {
                age,
                min: self.min_age,
            });
        }

        let expiration = signals
            .expiration_date()?
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .ok_or_else(|| ProofError::MalformedSignals("invalid expiration".into()))?;

        let validated = ValidatedSignals {
            issuing_authority: signals.issuing_authority()?,
            expiration,
        };

        tracing::debug!(
            family = %family,
            issuing_authority = validated.issuing_authority,
            expiration = %validated.expiration,
            "registration proof validated"
        );

        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groth16::tests::prove_signals;
    use chrono::Datelike;
    use num_bigint::BigUint;

    const DG1: &str = "aa17b54d39f2a8794527d2f4ad43b1f9f36abfc634156991ddf7d0ed11e3ada8";

    fn signals_for(today: NaiveDate, age: u64) -> Vec<String> {
        let dg1 = hex::decode(DG1).unwrap();
        vec![
            BigUint::from_bytes_be(&dg1[..16]).to_string(),
            BigUint::from_bytes_be(&dg1[16..]).to_string(),
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

    fn validator_and_proof(signals: &[String]) -> (ProofValidator, ZkProof) {
        let public = PublicSignals::parse(signals).unwrap().field_elements();
        let (vk_json, points) = prove_signals(&public);
        let verifier = Arc::new(Groth16Verifier::from_json(&vk_json).unwrap());
        let keys = VerificationKeys::new(verifier.clone(), verifier).unwrap();
        (
            ProofValidator::new(keys, 18),
            ZkProof {
                proof: points,
                pub_signals: signals.to_vec(),
            },
        )
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn test_valid_proof() {
        let (validator, proof) = validator_and_proof(&signals_for(today(), 30));
        let out = validator
            .validate(&proof, HashFamily::Sha256, &hex::decode(DG1).unwrap(), today())
            .unwrap();
        assert_eq!(out.issuing_authority, 8400);
        assert_eq!(out.expiration.date_naive(), NaiveDate::from_ymd_opt(2031, 12, 31).unwrap());
    }

    #[test]
    fn test_tampered_signal_fails_groth16() {
        let (validator, mut proof) = validator_and_proof(&signals_for(today(), 30));
        proof.pub_signals[9] = "99".into();
        assert!(matches!(
            validator.validate(&proof, HashFamily::Sha256, &hex::decode(DG1).unwrap(), today()),
            Err(ProofError::ProofInvalid(_))
        ));
    }

    #[test]
    fn test_dg1_mismatch() {
        let (validator, proof) = validator_and_proof(&signals_for(today(), 30));
        let mut other = hex::decode(DG1).unwrap();
        other[0] ^= 1;
        assert!(matches!(
            validator.validate(&proof, HashFamily::Sha256, &other, today()),
            Err(ProofError::Dg1Mismatch)
        ));
    }

    #[test]
    fn test_date_mismatch_with_valid_proof() {
        let yesterday = today().pred_opt().unwrap();
        let (validator, proof) = validator_and_proof(&signals_for(yesterday, 30));
        assert!(matches!(
            validator.validate(&proof, HashFamily::Sha256, &hex::decode(DG1).unwrap(), today()),
            Err(ProofError::DateMismatch { .. })
        ));
    }

    #[test]
    fn test_age_too_low() {
        let (validator, proof) = validator_and_proof(&signals_for(today(), 17));
        assert!(matches!(
            validator.validate(&proof, HashFamily::Sha256, &hex::decode(DG1).unwrap(), today()),
            Err(ProofError::AgeTooLow { age: 17, min: 18 })
        ));
    }

    #[test]
    fn test_keys_must_match_signal_count() {
        let (vk_json, _) = prove_signals(&[Fr::from(1u64), Fr::from(2u64)]);
        let narrow = Arc::new(Groth16Verifier::from_json(&vk_json).unwrap());
        let (validator, _) = validator_and_proof(&signals_for(today(), 30));
        let wide = validator.keys.sha256.clone();

        assert!(matches!(
            VerificationKeys::new(narrow.clone(), wide.clone()),
            Err(ProofError::VerificationKey(_))
        ));
        assert!(matches!(
            VerificationKeys::new(wide.clone(), narrow),
            Err(ProofError::VerificationKey(_))
        ));
        VerificationKeys::new(wide.clone(), wide).unwrap();
    }

    #[test]
    fn test_wrong_signal_count() {
        let signals: Vec<String> = signals_for(today(), 30).into_iter().take(9).collect();
        assert!(matches!(
            PublicSignals::parse(&signals),
            Err(ProofError::MalformedSignals(_))
        ));
    }

    #[test]
    fn test_hex_signals_accepted() {
        let mut signals = signals_for(today(), 30);
        signals[2] = "0x20d0".into();
        let parsed = PublicSignals::parse(&signals).unwrap();
        assert_eq!(parsed.issuing_authority().unwrap(), 8400);
        assert_eq!(parsed.dg1_hash(), hex::decode(DG1).unwrap());
    }

    #[test]
    fn test_out_of_field_signal_rejected() {
        let mut signals = signals_for(today(), 30);
        signals[0] =
            "21888242871839275222246405745257275088548364400416034343698204186575808495617".into();
        assert!(matches!(
            PublicSignals::parse(&signals),
            Err(ProofError::MalformedSignals(_))
        ));
    }

    #[test]
    fn test_invalid_calendar_date_is_mismatch() {
        let mut signals = signals_for(today(), 30);
        signals[4] = "13".into();
        let parsed = PublicSignals::parse(&signals).unwrap();
        assert_eq!(parsed.current_date().unwrap(), None);
    }
}
