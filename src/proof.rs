//! Witness construction, key generation and proof generation.

use crate::circuit::{MembershipCircuit, MESSAGE_ROW, NULLIFIER_ROW, ROOT_ROW};
use crate::error::{MembershipError, Result};
use crate::identity::{compute_nullifier_hash, Identity};
use crate::merkle::MembershipProof;
use crate::utils::{field_to_hex, hash_message, hex_field};
use crate::{CIRCUIT_K, TREE_DEPTH};
use halo2_proofs::{
    circuit::Value,
    plonk::{create_proof, keygen_pk, keygen_vk, ProvingKey, VerifyingKey},
    poly::commitment::Params,
    transcript::{Blake2bWrite, Challenge255},
};
use log::{debug, info};
use pasta_curves::group::ff::Field;
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Public inputs of a membership proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    #[serde(with = "hex_field")]
    pub root: pallas::Base,
    #[serde(with = "hex_field")]
    pub nullifier_hash: pallas::Base,
    #[serde(with = "hex_field")]
    pub external_message_hash: pallas::Base,
}

impl PublicSignals {
    /// Instance column values in circuit row order.
    #[must_use]
    pub fn to_instance(&self) -> Vec<pallas::Base> {
        let mut instance = vec![pallas::Base::ZERO; 3];
        instance[ROOT_ROW] = self.root;
        instance[NULLIFIER_ROW] = self.nullifier_hash;
        instance[MESSAGE_ROW] = self.external_message_hash;
        instance
    }
}

impl fmt::Display for PublicSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PublicSignals:\n  Root: {}\n  Nullifier hash: {}\n  Message hash: {}",
            field_to_hex(self.root),
            field_to_hex(self.nullifier_hash),
            field_to_hex(self.external_message_hash)
        )
    }
}

/// Opaque halo2 proof transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof(Vec<u8>);

impl Proof {
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Private and public inputs for a single proof.
///
/// Not `Clone` and not serializable: it is consumed by [`Witness::into_circuit`]
/// and never persisted.
pub struct Witness {
    trapdoor: pallas::Base,
    nullifier_secret: pallas::Base,
    siblings: [pallas::Base; TREE_DEPTH],
    positions: [bool; TREE_DEPTH],
    public: PublicSignals,
}

impl Witness {
    /// Assembles the witness after checking it satisfies the statement natively.
    ///
    /// # Errors
    /// [`MembershipError::ProofGenerationFailed`] if the path has the wrong
    /// depth, the identity is not the proven leaf, or the path does not fold
    /// to `membership.root`.
    pub fn new(
        identity: &Identity,
        membership: &MembershipProof,
        external_message: &[u8],
    ) -> Result<Self> {
        if membership.depth != TREE_DEPTH || membership.siblings.len() != TREE_DEPTH {
            return Err(MembershipError::ProofGenerationFailed(format!(
                "membership path has depth {} but the circuit expects {}",
                membership.siblings.len(),
                TREE_DEPTH
            )));
        }
        if membership.leaf != identity.commitment() {
            return Err(MembershipError::ProofGenerationFailed(
                "identity commitment is not the proven leaf".into(),
            ));
        }
        if membership.compute_root_from(identity.commitment()) != membership.root {
            return Err(MembershipError::ProofGenerationFailed(
                "merkle path does not fold to the claimed root".into(),
            ));
        }

        let mut siblings = [pallas::Base::ZERO; TREE_DEPTH];
        let mut positions = [false; TREE_DEPTH];
        for (level, step) in membership.siblings.iter().enumerate() {
            siblings[level] = step.sibling;
            positions[level] = step.direction.is_right();
        }

        let external_message_hash = hash_message(external_message);
        let public = PublicSignals {
            root: membership.root,
            nullifier_hash: compute_nullifier_hash(
                identity.nullifier_secret(),
                external_message_hash,
            ),
            external_message_hash,
        };

        Ok(Self {
            trapdoor: identity.trapdoor(),
            nullifier_secret: identity.nullifier_secret(),
            siblings,
            positions,
            public,
        })
    }

    /// Consumes the witness into a circuit instance plus its public signals.
    #[must_use]
    pub fn into_circuit(self) -> (MembershipCircuit, PublicSignals) {
        let circuit = MembershipCircuit {
            trapdoor: Value::known(self.trapdoor),
            nullifier_secret: Value::known(self.nullifier_secret),
            siblings: self.siblings.map(Value::known),
            positions: self
                .positions
                .map(|bit| Value::known(pallas::Base::from(u64::from(bit)))),
        };
        (circuit, self.public)
    }
}

/// Parameters and keys for the membership circuit.
///
/// IPA parameters need no trusted setup and key generation is deterministic,
/// so separate prover and verifier processes derive identical keys.
pub struct CircuitKeys {
    params: Params<vesta::Affine>,
    vk: VerifyingKey<vesta::Affine>,
    pk: ProvingKey<vesta::Affine>,
}

impl CircuitKeys {
    /// Generates parameters for `2^CIRCUIT_K` rows and both keys.
    pub fn generate() -> Result<Self> {
        let started = Instant::now();
        let params = Params::<vesta::Affine>::new(CIRCUIT_K);
        let circuit = MembershipCircuit::default();

        let vk = keygen_vk(&params, &circuit).map_err(|e| {
            MembershipError::ProofGenerationFailed(format!("verifying key generation: {e:?}"))
        })?;
        let pk = keygen_pk(&params, vk.clone(), &circuit).map_err(|e| {
            MembershipError::ProofGenerationFailed(format!("proving key generation: {e:?}"))
        })?;

        info!(
            "Generated circuit keys (k={}) in {:.2?}",
            CIRCUIT_K,
            started.elapsed()
        );
        Ok(Self { params, vk, pk })
    }

    #[must_use]
    pub fn params(&self) -> &Params<vesta::Affine> {
        &self.params
    }

    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey<vesta::Affine> {
        &self.vk
    }

    #[must_use]
    pub fn proving_key(&self) -> &ProvingKey<vesta::Affine> {
        &self.pk
    }
}

/// Produces membership proofs. Holds no mutable state and can be shared across threads.
#[derive(Clone)]
pub struct ProofEngine {
    keys: Arc<CircuitKeys>,
}

impl ProofEngine {
    #[must_use]
    pub fn new(keys: Arc<CircuitKeys>) -> Self {
        Self { keys }
    }

    /// Proves that `identity` is the leaf behind `membership` and emits the
    /// nullifier hash for `external_message`.
    ///
    /// # Errors
    /// [`MembershipError::ProofGenerationFailed`] on an inconsistent witness or
    /// a prover failure.
    pub fn prove(
        &self,
        identity: &Identity,
        membership: &MembershipProof,
        external_message: &[u8],
    ) -> Result<(Proof, PublicSignals)> {
        let witness = Witness::new(identity, membership, external_message)?;
        self.prove_witness(witness)
    }

    /// Proves a prepared witness, consuming it.
    pub fn prove_witness(&self, witness: Witness) -> Result<(Proof, PublicSignals)> {
        let started = Instant::now();
        let (circuit, public) = witness.into_circuit();
        let instance = public.to_instance();

        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
        create_proof(
            &self.keys.params,
            &self.keys.pk,
            &[circuit],
            &[&[&instance]],
            OsRng,
            &mut transcript,
        )
        .map_err(|e| MembershipError::ProofGenerationFailed(format!("prover error: {e:?}")))?;

        let proof = Proof(transcript.finalize());
        debug!(
            "Generated {}-byte proof for nullifier {} in {:.2?}",
            proof.len(),
            field_to_hex(public.nullifier_hash),
            started.elapsed()
        );
        Ok((proof, public))
    }
}
