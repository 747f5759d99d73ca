use halo2_proofs::{circuit::Value, dev::MockProver};
use pasta_curves::{group::ff::Field, pallas};
use zkp_group_membership::{
    circuit::{MESSAGE_ROW, NULLIFIER_ROW, ROOT_ROW},
    Identity, MembershipCircuit, MerkleMembershipTree, PublicSignals, Witness, CIRCUIT_K,
    TREE_DEPTH,
};

fn setup(message: &[u8]) -> (MembershipCircuit, PublicSignals) {
    let mut tree = MerkleMembershipTree::new(TREE_DEPTH).unwrap();
    let identities: Vec<Identity> = (0u8..3)
        .map(|i| Identity::from_seed(&[i + 1; 65]).unwrap())
        .collect();
    for identity in &identities {
        tree.insert(identity.commitment()).unwrap();
    }

    // Index 1 exercises both left and right positions along the path.
    let membership = tree.prove_membership(1).unwrap();
    Witness::new(&identities[1], &membership, message)
        .unwrap()
        .into_circuit()
}

fn run(circuit: &MembershipCircuit, instance: Vec<pallas::Base>) -> bool {
    MockProver::run(CIRCUIT_K, circuit, vec![instance])
        .unwrap()
        .verify()
        .is_ok()
}

#[test]
fn test_valid_witness_satisfies_circuit() {
    let (circuit, signals) = setup(b"Hello world");
    assert!(run(&circuit, signals.to_instance()));
}

#[test]
fn test_instance_layout() {
    let (_, signals) = setup(b"Hello world");
    let instance = signals.to_instance();
    assert_eq!(instance[ROOT_ROW], signals.root);
    assert_eq!(instance[NULLIFIER_ROW], signals.nullifier_hash);
    assert_eq!(instance[MESSAGE_ROW], signals.external_message_hash);
}

#[test]
fn test_wrong_root_fails() {
    let (circuit, signals) = setup(b"Hello world");
    let mut instance = signals.to_instance();
    instance[ROOT_ROW] += pallas::Base::ONE;
    assert!(!run(&circuit, instance));
}

#[test]
fn test_wrong_nullifier_hash_fails() {
    let (circuit, signals) = setup(b"Hello world");
    let mut instance = signals.to_instance();
    instance[NULLIFIER_ROW] += pallas::Base::ONE;
    assert!(!run(&circuit, instance));
}

#[test]
fn test_message_is_bound_to_nullifier() {
    let (circuit, signals) = setup(b"Hello world");
    let (_, other) = setup(b"Hello world!");

    // Same member, different message: only the message hash row is swapped in.
    let mut instance = signals.to_instance();
    instance[MESSAGE_ROW] = other.external_message_hash;
    assert!(!run(&circuit, instance));
    assert_ne!(signals.nullifier_hash, other.nullifier_hash);
}

#[test]
fn test_non_boolean_position_fails() {
    let (mut circuit, signals) = setup(b"Hello world");
    circuit.positions[0] = Value::known(pallas::Base::from(2));
    assert!(!run(&circuit, signals.to_instance()));
}

#[test]
fn test_flipped_position_fails() {
    let (mut circuit, signals) = setup(b"Hello world");
    // Leaf 1 is a right child at level 0.
    circuit.positions[0] = Value::known(pallas::Base::ZERO);
    assert!(!run(&circuit, signals.to_instance()));
}

#[test]
fn test_wrong_trapdoor_fails() {
    let (mut circuit, signals) = setup(b"Hello world");
    circuit.trapdoor = Value::known(pallas::Base::from(42));
    assert!(!run(&circuit, signals.to_instance()));
}

#[test]
fn test_tampered_sibling_fails() {
    let (mut circuit, signals) = setup(b"Hello world");
    circuit.siblings[5] = Value::known(pallas::Base::from(7));
    assert!(!run(&circuit, signals.to_instance()));
}
