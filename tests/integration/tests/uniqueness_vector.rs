//! Integration test: uniqueness circuit inputs across passid-crypto and
//! passid-proof, checked against a reference vector.

use passid_core::TreeParams;
use passid_crypto::{nullifier, parse_field, Fr, PoseidonMerkleTree};
use passid_proof::CircuitInputs;

const BLINDER: &str =
    "11714559926329488462499858375762588794276508657368433057518712516415455910929";
const DOCUMENT_HASH: &str =
    "8302794276508657323125842252912847046623971092627426530323130710715455910928";
const SALTS: [&str; 4] = ["55910928", "58422529128", "6258879427650865736", "5599263"];

const EXPECTED: &str = r#"{"blinder":11714559926329488462499858375762588794276508657368433057518712516415455910929,"documentHash":8302794276508657323125842252912847046623971092627426530323130710715455910928,"proofsBranches":[[14608654625794963586448227673575985341169574701931235311695964667515136442289,14251024860076613042921893745958981824974577945853564226868633391418705231824],[14956400568832893264463752969297624636961411789737111255032868037575924055015,14251024860076613042921893745958981824974577945853564226868633391418705231824],[15786718725042124006503955346891945541263064496327370271144286596393510010204,18429428004424288136854689676374984841037963087622002096815542450018113160566],[4554524831031135169141095118682810348362568316467552620599541134110663353784,18429428004424288136854689676374984841037963087622002096815542450018113160566]],"proofsOrder":[[0,0],[1,0],[0,1],[1,1]],"root":14455125453068568951440238152987304090154352684894597083022717377037819367009,"salt":[55910928,58422529128,6258879427650865736,5599263]}"#;

fn build(salts: &[&str]) -> CircuitInputs {
    let salts: Vec<Fr> = salts.iter().map(|s| parse_field(s).unwrap()).collect();
    CircuitInputs::build(
        &TreeParams::new(4, 2).unwrap(),
        &parse_field(BLINDER).unwrap(),
        &parse_field(DOCUMENT_HASH).unwrap(),
        &salts,
    )
    .unwrap()
}

#[test]
fn test_reference_vector_is_byte_exact() {
    assert_eq!(build(&SALTS).to_json().unwrap(), EXPECTED);
}

#[test]
fn test_different_salt_changes_output() {
    let mut salts = SALTS;
    salts[3] = "5599264";
    let json = build(&salts).to_json().unwrap();
    assert_ne!(json, EXPECTED);
    assert!(!json.contains("\"root\":14455125453068568951440238152987304090154352684894597083022717377037819367009"));
}

#[test]
fn test_every_path_recomputes_root() {
    let inputs = build(&SALTS);
    assert!(inputs.paths_are_consistent());
    for (leaf, proof) in inputs.leaves.iter().zip(&inputs.proofs) {
        assert!(proof.verify(leaf, &inputs.root));
        assert!(!proof.verify(leaf, &Fr::from(1u64)));
    }
}

#[test]
fn test_leaves_are_account_nullifiers() {
    let inputs = build(&SALTS);
    let blinder = parse_field(BLINDER).unwrap();
    let document_hash = parse_field(DOCUMENT_HASH).unwrap();
    for (salt, leaf) in SALTS.iter().zip(&inputs.leaves) {
        let expected = nullifier(&document_hash, &blinder, &parse_field(salt).unwrap()).unwrap();
        assert_eq!(*leaf, expected);
    }

    let tree = PoseidonMerkleTree::with_depth(inputs.leaves.clone(), 2).unwrap();
    assert_eq!(tree.root(), inputs.root);
}
