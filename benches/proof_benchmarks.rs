use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pasta_curves::pallas;
use std::sync::Arc;
use zkp_group_membership::{
    CircuitKeys, Identity, MembershipGroup, MerkleMembershipTree, NullifierRegistry, ProofEngine,
    Verifier, TREE_DEPTH,
};

fn identity(i: u64) -> Identity {
    let mut seed = [0u8; 65];
    seed[..8].copy_from_slice(&(i + 1).to_le_bytes());
    Identity::from_seed(&seed).unwrap()
}

fn bench_proof_generation(c: &mut Criterion) {
    let keys = Arc::new(CircuitKeys::generate().unwrap());
    let engine = ProofEngine::new(keys);

    let group = MembershipGroup::new(TREE_DEPTH).unwrap();
    for i in 0..16 {
        group.insert(identity(i).commitment()).unwrap();
    }
    let member = identity(5);
    let membership = group.prove_membership(5).unwrap();

    c.bench_function("proof_generation", |b| {
        b.iter(|| black_box(engine.prove(&member, &membership, b"Hello world").unwrap()))
    });
}

fn bench_proof_verification(c: &mut Criterion) {
    let keys = Arc::new(CircuitKeys::generate().unwrap());
    let engine = ProofEngine::new(keys.clone());

    let group = MembershipGroup::new(TREE_DEPTH).unwrap();
    group.insert(identity(0).commitment()).unwrap();
    let membership = group.prove_membership(0).unwrap();
    let (proof, signals) = engine
        .prove(&identity(0), &membership, b"Hello world")
        .unwrap();

    let verifier = Verifier::new(keys, Arc::new(NullifierRegistry::in_memory()));
    let root = group.root();

    // `check` leaves the registry untouched, so repeated iterations never hit AlreadyUsed.
    c.bench_function("proof_verification", |b| {
        b.iter(|| black_box(verifier.check(&proof, &signals, root, b"Hello world").unwrap()))
    });
}

fn bench_key_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_generation");
    group.sample_size(10);
    group.bench_function("circuit_keys", |b| {
        b.iter(|| black_box(CircuitKeys::generate().unwrap()))
    });
    group.finish();
}

fn bench_merkle_tree_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_tree_insert");

    for leaf_count in [4u64, 16, 64, 256].iter() {
        let commitments: Vec<pallas::Base> =
            (0..*leaf_count).map(|i| identity(i).commitment()).collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| {
                b.iter(|| {
                    let mut tree = MerkleMembershipTree::new(TREE_DEPTH).unwrap();
                    for commitment in &commitments {
                        tree.insert(*commitment).unwrap();
                    }
                    black_box(tree.root())
                })
            },
        );
    }

    group.finish();
}

fn bench_merkle_proof_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle_proof_generation");

    for leaf_count in [4u64, 64, 256].iter() {
        let tree = MerkleMembershipTree::from_leaves(
            TREE_DEPTH,
            (0..*leaf_count).map(|i| identity(i).commitment()),
        )
        .unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| b.iter(|| black_box(tree.prove_membership(leaf_count - 1).unwrap())),
        );
    }

    group.finish();
}

fn bench_poseidon_hash(c: &mut Criterion) {
    c.bench_function("poseidon_hash", |b| {
        b.iter(|| {
            black_box(zkp_group_membership::utils::poseidon_hash(
                pallas::Base::from(1),
                pallas::Base::from(2),
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_proof_generation,
    bench_proof_verification,
    bench_key_generation,
    bench_merkle_tree_insert,
    bench_merkle_proof_generation,
    bench_poseidon_hash
);
criterion_main!(benches);
