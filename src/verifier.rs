//! Four-step proof verification with replay protection.

use crate::error::{MembershipError, Result};
use crate::proof::{CircuitKeys, Proof, PublicSignals};
use crate::registry::NullifierRegistry;
use crate::utils::{field_to_hex, hash_message};
use halo2_proofs::{
    plonk::{verify_proof, SingleVerifier},
    transcript::{Blake2bRead, Challenge255},
};
use log::{info, warn};
use pasta_curves::{pallas, vesta};
use std::sync::Arc;

/// Checks proofs against the known root and message, then consumes the nullifier.
#[derive(Clone)]
pub struct Verifier {
    keys: Arc<CircuitKeys>,
    registry: Arc<NullifierRegistry>,
}

impl Verifier {
    #[must_use]
    pub fn new(keys: Arc<CircuitKeys>, registry: Arc<NullifierRegistry>) -> Self {
        Self { keys, registry }
    }

    #[must_use]
    pub fn registry(&self) -> &NullifierRegistry {
        &self.registry
    }

    /// Runs every check and, only if all pass, consumes the nullifier hash.
    ///
    /// Steps short-circuit in order: root, message binding, proof, nullifier.
    ///
    /// # Errors
    /// [`MembershipError::StaleRoot`], [`MembershipError::MessageMismatch`],
    /// [`MembershipError::InvalidProof`], [`MembershipError::AlreadyUsed`],
    /// or [`MembershipError::Storage`] if the registry cannot record the nullifier.
    pub fn verify(
        &self,
        proof: &Proof,
        signals: &PublicSignals,
        expected_root: pallas::Base,
        expected_message: &[u8],
    ) -> Result<()> {
        let outcome = self
            .check(proof, signals, expected_root, expected_message)
            .and_then(|()| self.registry.check_and_consume(signals.nullifier_hash));

        match &outcome {
            Ok(()) => info!(
                "Accepted proof with nullifier {}",
                field_to_hex(signals.nullifier_hash)
            ),
            Err(e) => warn!("Rejected proof [{}]: {e}", e.code()),
        }
        outcome
    }

    /// Steps 1 to 3 of [`Verifier::verify`]. Never touches the registry.
    pub fn check(
        &self,
        proof: &Proof,
        signals: &PublicSignals,
        expected_root: pallas::Base,
        expected_message: &[u8],
    ) -> Result<()> {
        if signals.root != expected_root {
            return Err(MembershipError::StaleRoot {
                proof_root: field_to_hex(signals.root),
                expected_root: field_to_hex(expected_root),
            });
        }

        if hash_message(expected_message) != signals.external_message_hash {
            return Err(MembershipError::MessageMismatch);
        }

        if proof.is_empty() {
            return Err(MembershipError::InvalidProof("proof is empty".into()));
        }

        let instance = signals.to_instance();
        let strategy = SingleVerifier::new(self.keys.params());
        let mut transcript = Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(proof.as_bytes());
        verify_proof(
            self.keys.params(),
            self.keys.verifying_key(),
            strategy,
            &[&[&instance]],
            &mut transcript,
        )
        .map_err(|e| MembershipError::InvalidProof(format!("{e:?}")))
    }
}
