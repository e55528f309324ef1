//! Property-based tests for anchoring invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Hash determinism: same canonical payload -> same hash
//! - Canonical form: key insertion order never changes the hash
//! - Merkle soundness: every member proof verifies, tampering fails
//! - Matricule format: every generated identifier validates

use anchor_core::hash::{canonical_json, content_hash, verify_content};
use anchor_core::matricule::{self, MatriculeKind};
use anchor_core::merkle::{verify_proof, MerkleTree};
use anchor_core::types::{RecordSnapshot, VitalSigns};
use proptest::prelude::*;
use serde_json::{Map, Value};

/// Strategy for generating snapshot-shaped payloads
fn snapshot_strategy() -> impl Strategy<Value = RecordSnapshot> {
    (
        proptest::option::of("[A-Za-z ]{1,40}"),
        proptest::option::of("PAT-[0-9]{8}-[A-F0-9]{4}"),
        proptest::option::of("[a-z ,]{0,60}"),
        proptest::option::of(40u32..180),
    )
        .prop_map(|(title, patient_id, notes, heart_rate)| RecordSnapshot {
            title,
            patient_id,
            practitioner_id: None,
            notes: notes.clone(),
            prescription: notes,
            vitals: heart_rate.map(|hr| VitalSigns {
                heart_rate: Some(hr),
                ..Default::default()
            }),
        })
}

/// Strategy for flat JSON objects with 1..8 distinct keys
fn object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,12}", 1..8).prop_map(|m| {
        m.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect()
    })
}

proptest! {
    #[test]
    fn hash_is_deterministic(snapshot in snapshot_strategy()) {
        let value = serde_json::to_value(&snapshot).unwrap();
        prop_assert_eq!(content_hash(&value), content_hash(&value));
        prop_assert!(verify_content(&content_hash(&value), &value));
    }

    #[test]
    fn hash_ignores_key_insertion_order(object in object_strategy()) {
        let forward = Value::Object(object.clone().into_iter().collect());
        let reversed = Value::Object(object.into_iter().rev().collect());
        prop_assert_eq!(content_hash(&forward), content_hash(&reversed));
        prop_assert_eq!(canonical_json(&forward), canonical_json(&reversed));
    }

    #[test]
    fn distinct_payloads_hash_differently(
        a in "[a-z]{1,20}",
        b in "[a-z]{1,20}",
    ) {
        prop_assume!(a != b);
        let va = serde_json::json!({ "notes": a });
        let vb = serde_json::json!({ "notes": b });
        prop_assert_ne!(content_hash(&va), content_hash(&vb));
    }

    #[test]
    fn mutating_any_field_breaks_verification(
        snapshot in snapshot_strategy(),
        extra in "[a-z]{1,10}",
    ) {
        let value = serde_json::to_value(&snapshot).unwrap();
        let hash = content_hash(&value);

        let mut mutated = value.clone();
        mutated["injected"] = Value::String(extra);
        prop_assert!(!verify_content(&hash, &mutated));
    }

    #[test]
    fn merkle_proofs_verify_for_all_members(leaves in proptest::collection::vec("[a-z]{1,16}", 1..48)) {
        let hashes: Vec<String> = leaves
            .iter()
            .map(|l| content_hash(&serde_json::json!({ "leaf": l })))
            .collect();

        let tree = MerkleTree::from_hashes(&hashes).unwrap();
        let root = tree.root();

        for (i, leaf) in hashes.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            prop_assert_eq!(proof.index, i);
            prop_assert!(verify_proof(leaf, &proof, &root));
        }
    }

    #[test]
    fn flipping_one_leaf_invalidates_it(
        leaves in proptest::collection::vec("[a-z]{1,16}", 2..32),
        flip in 0usize..32,
    ) {
        let flip = flip % leaves.len();
        let hashes: Vec<String> = leaves
            .iter()
            .map(|l| content_hash(&serde_json::json!({ "leaf": l })))
            .collect();

        let tree = MerkleTree::from_hashes(&hashes).unwrap();
        let root = tree.root();
        let proof = tree.proof(flip).unwrap();

        let flipped = content_hash(&serde_json::json!({ "leaf": "tampered-content" }));
        prop_assume!(flipped != hashes[flip]);

        // The recorded proof no longer matches the substituted leaf,
        // and a tree rebuilt with it produces a different root.
        prop_assert!(!verify_proof(&flipped, &proof, &root));

        let mut tampered = hashes.clone();
        tampered[flip] = flipped;
        let tampered_tree = MerkleTree::from_hashes(&tampered).unwrap();
        prop_assert_ne!(tampered_tree.root(), root);
    }

    #[test]
    fn generated_matricules_always_validate(_seed in 0u8..255) {
        let pat = matricule::patient();
        let prx = matricule::prescription();
        let ord = matricule::order();

        prop_assert!(matricule::is_valid(MatriculeKind::Patient, &pat));
        prop_assert!(matricule::is_valid(MatriculeKind::Prescription, &prx));
        prop_assert!(matricule::is_valid(MatriculeKind::Order, &ord));
        prop_assert_eq!(pat.len(), 17);
        prop_assert_eq!(prx.len(), 17);
    }
}
