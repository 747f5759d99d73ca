//! Anonymous Group Membership Proofs
//!
//! This library lets a member of a registered group publish a message while
//! proving, in zero knowledge, that they belong to the group. Each member can
//! signal a given message only once.
//!
//! # Components
//!
//! - [`Identity`]: member secrets and the public commitment derived from them
//! - [`MerkleMembershipTree`]: fixed-depth Poseidon Merkle tree of commitments
//! - [`MembershipGroup`]: thread-safe, optionally persisted group of members
//! - [`ProofEngine`]: builds Halo2 proofs of membership bound to a message
//! - [`NullifierRegistry`]: records consumed nullifier hashes
//! - [`Verifier`]: checks root, message binding, proof and nullifier in order
//! - [`GreetingBoard`]: log of accepted anonymous greetings
//! - [`ProofBundle`]: serialized proof output exchanged between binaries
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zkp_group_membership::{
//!     CircuitKeys, Identity, MembershipGroup, NullifierRegistry, ProofEngine, Verifier,
//!     TREE_DEPTH,
//! };
//!
//! let identity = Identity::from_seed(b"wallet signature bytes").unwrap();
//! let group = MembershipGroup::new(TREE_DEPTH).unwrap();
//! let index = group.insert(identity.commitment()).unwrap();
//!
//! let keys = Arc::new(CircuitKeys::generate().unwrap());
//! let engine = ProofEngine::new(keys.clone());
//! let membership = group.prove_membership(index).unwrap();
//! let (proof, signals) = engine.prove(&identity, &membership, b"Hello world").unwrap();
//!
//! let verifier = Verifier::new(keys, Arc::new(NullifierRegistry::in_memory()));
//! verifier.verify(&proof, &signals, group.root(), b"Hello world").unwrap();
//! ```

pub mod circuit;
pub mod config;
pub mod error;
pub mod greeter;
pub mod group;
pub mod identity;
pub mod merkle;
pub mod proof;
pub mod registry;
pub mod types;
pub mod utils;
pub mod verifier;
pub mod wallet;


pub use circuit::MembershipCircuit;
pub use error::{MembershipError, Result};
pub use greeter::{GreetingBoard, GreetingEvent};
pub use group::MembershipGroup;
pub use identity::Identity;
pub use merkle::{MembershipProof, MerkleMembershipTree};
pub use proof::{CircuitKeys, Proof, ProofEngine, PublicSignals, Witness};
pub use registry::NullifierRegistry;
pub use types::ProofBundle;
pub use utils::{bytes_to_field, field_to_bytes, hash_message, poseidon_hash};
pub use verifier::Verifier;

/// Depth of the membership tree the circuit is built for.
///
/// A depth of 20 admits 2^20 members. Proofs from trees of any other depth
/// are rejected before proving.
pub const TREE_DEPTH: usize = 20;

/// Circuit parameter for Halo2 proving system.
///
/// The value `k=12` creates a circuit with 2^k = 4096 rows, enough for one
/// commitment hash, twenty Merkle levels and the nullifier hash.
///
/// # Security Considerations
///
/// Changing `CIRCUIT_K` requires regenerating all proving and verifying keys.
/// Prover and verifier must use the same value, or verification will fail.
pub const CIRCUIT_K: u32 = 12;
