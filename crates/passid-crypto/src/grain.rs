//! Round constants and MDS matrices for circom Poseidon widths that
//! light-poseidon does not ship (t = 14..=17).
//!
//! circomlib derived its parameters with the Grain LFSR from the Poseidon
//! reference script (`generate_parameters_grain.sage 1 0 254 t 8 R_P p`).
//! The same stream is replayed here and cached per width.

use std::sync::OnceLock;

use ark_bn254::Fr;
use ark_ff::{Field, PrimeField};
use light_poseidon::PoseidonParameters;
use num_bigint::BigUint;

use crate::error::CryptoError;

pub(crate) const FULL_ROUNDS: usize = 8;
const ALPHA: u64 = 5;
const FIELD_BITS: usize = 254;

/// circomlib partial round counts, indexed by `t - 2`.
const PARTIAL_ROUNDS: [usize; 16] = [
    56, 57, 56, 60, 60, 63, 64, 63, 60, 66, 60, 65, 70, 60, 64, 68,
];

/// Smallest and largest width generated here.
pub(crate) const MIN_WIDTH: usize = 14;
pub(crate) const MAX_WIDTH: usize = 17;

struct Parameters {
    ark: Vec<Fr>,
    mds: Vec<Vec<Fr>>,
    partial_rounds: usize,
}

static CACHE: [OnceLock<Parameters>; MAX_WIDTH - MIN_WIDTH + 1] =
    [OnceLock::new(), OnceLock::new(), OnceLock::new(), OnceLock::new()];

/// Poseidon parameters for `width` in `MIN_WIDTH..=MAX_WIDTH`.
pub(crate) fn wide_parameters(width: usize) -> Result<PoseidonParameters<Fr>, CryptoError> {
    if !(MIN_WIDTH..=MAX_WIDTH).contains(&width) {
        return Err(CryptoError::InvalidInput(format!(
            "no generated poseidon parameters for width {}",
            width
        )));
    }
    let cached = CACHE[width - MIN_WIDTH].get_or_init(|| {
        tracing::debug!(width, "generating poseidon parameters");
        generate(width, PARTIAL_ROUNDS[width - 2])
    });
    Ok(PoseidonParameters::new(
        cached.ark.clone(),
        cached.mds.clone(),
        FULL_ROUNDS,
        cached.partial_rounds,
        width,
        ALPHA,
    ))
}

/// 80-bit Grain LFSR in self-shrinking mode.
struct GrainLfsr {
    bits: [bool; 80],
    head: usize,
}

impl GrainLfsr {
    fn new(width: usize, partial_rounds: usize) -> Self {
        // field = 1 (prime), sbox = 0 (x^alpha), then n, t, R_F, R_P, and 30 ones.
        let fields: [(u64, usize); 6] = [
            (1, 2),
            (0, 4),
            (FIELD_BITS as u64, 12),
            (width as u64, 12),
            (FULL_ROUNDS as u64, 10),
            (partial_rounds as u64, 10),
        ];
        let mut bits = [true; 80];
        let mut pos = 0;
        for (value, len) in fields {
            for i in (0..len).rev() {
                bits[pos] = (value >> i) & 1 == 1;
                pos += 1;
            }
        }
        let mut lfsr = Self { bits, head: 0 };
        for _ in 0..160 {
            lfsr.clock();
        }
        lfsr
    }

    fn clock(&mut self) -> bool {
        let tap = |i: usize| self.bits[(self.head + i) % 80];
        let bit = tap(62) ^ tap(51) ^ tap(38) ^ tap(23) ^ tap(13) ^ tap(0);
        self.bits[self.head] = bit;
        self.head = (self.head + 1) % 80;
        bit
    }

    fn next_bit(&mut self) -> bool {
        loop {
            if self.clock() {
                return self.clock();
            }
            self.clock();
        }
    }

    fn next_integer(&mut self) -> BigUint {
        let mut value = BigUint::default();
        for _ in 0..FIELD_BITS {
            value <<= 1u32;
            if self.next_bit() {
                value += 1u32;
            }
        }
        value
    }
}

fn generate(width: usize, partial_rounds: usize) -> Parameters {
    let modulus = BigUint::from(Fr::MODULUS);
    let mut lfsr = GrainLfsr::new(width, partial_rounds);

    let ark = (0..(FULL_ROUNDS + partial_rounds) * width)
        .map(|_| loop {
            let candidate = lfsr.next_integer();
            if candidate < modulus {
                break Fr::from(candidate);
            }
        })
        .collect();

    // Cauchy matrix 1 / (x_i + y_j) over 2t distinct samples.
    let mds = loop {
        let samples: Vec<Fr> = (0..2 * width)
            .map(|_| Fr::from(lfsr.next_integer() % &modulus))
            .collect();
        let distinct = samples
            .iter()
            .enumerate()
            .all(|(i, a)| samples[i + 1..].iter().all(|b| a != b));
        if !distinct {
            continue;
        }
        let (xs, ys) = samples.split_at(width);
        let matrix: Option<Vec<Vec<Fr>>> = xs
            .iter()
            .map(|x| ys.iter().map(|y| (*x + y).inverse()).collect())
            .collect();
        if let Some(matrix) = matrix {
            break matrix;
        }
    };

    Parameters {
        ark,
        mds,
        partial_rounds,
    }
}
