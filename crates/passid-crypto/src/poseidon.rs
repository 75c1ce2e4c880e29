//! Poseidon over BN254 with circom parameters (t = inputs + 1).

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher};

use crate::error::CryptoError;
use crate::field::field_from_be_bytes;
use crate::grain;

/// Maximum number of inputs a single circom Poseidon permutation accepts.
pub const MAX_INPUTS: usize = 16;

/// Widest permutation light-poseidon bundles constants for.
const BUNDLED_MAX_INPUTS: usize = 12;

/// Elements absorbed per sponge frame, as in go-iden3-crypto `HashBytes`.
pub const SPONGE_FRAME: usize = 16;

/// Bytes absorbed per sponge element. 31 bytes always fit below the modulus.
const SPONGE_CHUNK_SIZE: usize = 31;

/// Hash 1..=16 field elements with circom-compatible Poseidon.
pub fn poseidon_hash(inputs: &[Fr]) -> Result<Fr, CryptoError> {
    if inputs.is_empty() || inputs.len() > MAX_INPUTS {
        return Err(CryptoError::InvalidInput(format!(
            "poseidon accepts 1..={} inputs, got {}",
            MAX_INPUTS,
            inputs.len()
        )));
    }
    let mut hasher = if inputs.len() <= BUNDLED_MAX_INPUTS {
        Poseidon::<Fr>::new_circom(inputs.len())
            .map_err(|e| CryptoError::HashError(e.to_string()))?
    } else {
        Poseidon::<Fr>::new(grain::wide_parameters(inputs.len() + 1)?)
    };
    hasher
        .hash(inputs)
        .map_err(|e| CryptoError::HashError(e.to_string()))
}

/// Hash an arbitrary byte string with a Poseidon sponge.
///
/// Matches go-iden3-crypto `poseidon.HashBytes`: the message is cut into
/// 31-byte big-endian chunks (the last one right-padded with zeros) and
/// absorbed into frames of 16 elements. Each full frame is hashed and its
/// digest becomes element 0 of the next frame. Empty input is rejected.
pub fn poseidon_hash_bytes(msg: &[u8]) -> Result<Fr, CryptoError> {
    if msg.is_empty() {
        return Err(CryptoError::InvalidInput(
            "cannot hash an empty byte string".into(),
        ));
    }

    let zero = Fr::from(0u64);
    let mut frame = [zero; SPONGE_FRAME];
    let mut k = 0usize;
    let mut dirty = false;
    let mut digest = zero;

    for chunk in msg.chunks(SPONGE_CHUNK_SIZE) {
        let element = if chunk.len() == SPONGE_CHUNK_SIZE {
            field_from_be_bytes(chunk)?
        } else {
            let mut padded = [0u8; SPONGE_CHUNK_SIZE];
            padded[..chunk.len()].copy_from_slice(chunk);
            field_from_be_bytes(&padded)?
        };
        frame[k] = element;
        dirty = true;

        if k == SPONGE_FRAME - 1 {
            digest = poseidon_hash(&frame)?;
            dirty = false;
            frame = [zero; SPONGE_FRAME];
            frame[0] = digest;
            k = 1;
        } else {
            k += 1;
        }
    }

    if dirty {
        digest = poseidon_hash(&frame)?;
    }
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{field_to_decimal, parse_field};

    #[test]
    fn test_poseidon_known_vector() {
        // circomlib Poseidon([1, 2])
        let h = poseidon_hash(&[Fr::from(1u64), Fr::from(2u64)]).unwrap();
        assert_eq!(
            field_to_decimal(&h),
            "7853200120776062878684798364095072458815029376092732009249414926327459813530"
        );
    }

    #[test]
    fn test_poseidon_sixteen_inputs_known_vector() {
        // go-iden3-crypto Poseidon([1..=16])
        let inputs: Vec<Fr> = (1..=16u64).map(Fr::from).collect();
        assert_eq!(
            field_to_decimal(&poseidon_hash(&inputs).unwrap()),
            "9989051620750914585850546081941653841776809718687451684622678807385399211877"
        );
    }

    #[test]
    fn test_hash_bytes_vectors() {
        let cases: [(Vec<u8>, &str); 3] = [
            (
                vec![0xde, 0xad, 0xbe, 0xef],
                "12576071478264650858652211247191262098869614196088448645467504053993093393337",
            ),
            (
                vec![0],
                "6961025786505490270790487869888725702980364259855350215456397845563605340881",
            ),
            (
                (0..31 * 16 + 1).map(|i| (i % 251) as u8).collect(),
                "6241173886013241259398833653627690410443695348620004398394372464066445639446",
            ),
        ];
        for (msg, expected) in cases {
            assert_eq!(field_to_decimal(&poseidon_hash_bytes(&msg).unwrap()), expected);
        }
    }

    #[test]
    fn test_poseidon_arity_bounds() {
        assert!(poseidon_hash(&[]).is_err());
        let inputs = vec![Fr::from(7u64); MAX_INPUTS + 1];
        assert!(poseidon_hash(&inputs).is_err());
        assert!(poseidon_hash(&inputs[..MAX_INPUTS]).is_ok());
    }

    #[test]
    fn test_poseidon_order_matters() {
        let a = parse_field("11").unwrap();
        let b = parse_field("22").unwrap();
        assert_ne!(
            poseidon_hash(&[a, b]).unwrap(),
            poseidon_hash(&[b, a]).unwrap()
        );
    }

    #[test]
    fn test_hash_bytes_short_message_is_single_frame() {
        let msg = [0xde, 0xad, 0xbe, 0xef];
        let mut padded = [0u8; 31];
        padded[..4].copy_from_slice(&msg);
        let mut frame = [Fr::from(0u64); SPONGE_FRAME];
        frame[0] = field_from_be_bytes(&padded).unwrap();
        assert_eq!(
            poseidon_hash_bytes(&msg).unwrap(),
            poseidon_hash(&frame).unwrap()
        );
    }

    #[test]
    fn test_hash_bytes_exact_frame_chains() {
        // Exactly 16 full chunks: one permutation, no trailing frame.
        let msg: Vec<u8> = (0..31 * 16).map(|i| (i % 251) as u8).collect();
        let frame: Vec<Fr> = msg
            .chunks(31)
            .map(|c| field_from_be_bytes(c).unwrap())
            .collect();
        assert_eq!(
            poseidon_hash_bytes(&msg).unwrap(),
            poseidon_hash(&frame).unwrap()
        );

        // One extra byte spills into a second frame seeded with the digest.
        let mut longer = msg.clone();
        longer.push(0x01);
        let first = poseidon_hash(&frame).unwrap();
        let mut tail = [0u8; 31];
        tail[0] = 0x01;
        let mut second = [Fr::from(0u64); SPONGE_FRAME];
        second[0] = first;
        second[1] = field_from_be_bytes(&tail).unwrap();
        assert_eq!(
            poseidon_hash_bytes(&longer).unwrap(),
            poseidon_hash(&second).unwrap()
        );
    }

    #[test]
    fn test_hash_bytes_empty_rejected() {
        assert!(poseidon_hash_bytes(&[]).is_err());
    }

    #[test]
    fn test_hash_bytes_padding_is_significant() {
        assert_ne!(
            poseidon_hash_bytes(&[1]).unwrap(),
            poseidon_hash_bytes(&[0, 1]).unwrap()
        );
    }
}
