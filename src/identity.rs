//! Deterministic identity derivation from a signed seed message.
//!
//! The same seed always yields the same identity, so an identity can be
//! recovered by signing the same message again with the same wallet key.
//! Anyone who learns the seed learns the identity.

use crate::error::{MembershipError, Result};
use crate::utils::{field_to_hex, hash_to_field, poseidon_hash};
use log::debug;
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;
use std::fmt;

/// Message a wallet signs to produce the identity seed.
pub const IDENTITY_SIGNING_MESSAGE: &str = "Sign this message to create your identity!";

const DOMAIN_TRAPDOOR: &[u8] = b"zkp-group-membership/v1/identity-trapdoor";
const DOMAIN_NULLIFIER: &[u8] = b"zkp-group-membership/v1/identity-nullifier";

/// A secret identity and its public commitment.
///
/// Not serializable. `Debug` redacts the secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    trapdoor: pallas::Base,
    nullifier_secret: pallas::Base,
    commitment: pallas::Base,
}

impl Identity {
    /// Derives the identity from `seed`.
    ///
    /// # Errors
    /// [`MembershipError::InvalidSeed`] if the seed is empty or maps to a zero
    /// secret.
    pub fn from_seed(seed: &[u8]) -> Result<Self> {
        if seed.is_empty() {
            return Err(MembershipError::InvalidSeed("seed is empty".into()));
        }

        let trapdoor = hash_to_field(DOMAIN_TRAPDOOR, seed);
        let nullifier_secret = hash_to_field(DOMAIN_NULLIFIER, seed);
        if bool::from(trapdoor.is_zero()) || bool::from(nullifier_secret.is_zero()) {
            return Err(MembershipError::InvalidSeed(
                "seed does not resolve to non-zero field elements".into(),
            ));
        }

        let identity = Self::from_secrets(trapdoor, nullifier_secret);
        debug!(
            "Derived identity with commitment {}",
            field_to_hex(identity.commitment)
        );
        Ok(identity)
    }

    fn from_secrets(trapdoor: pallas::Base, nullifier_secret: pallas::Base) -> Self {
        Self {
            trapdoor,
            nullifier_secret,
            commitment: compute_commitment(trapdoor, nullifier_secret),
        }
    }

    #[must_use]
    pub fn trapdoor(&self) -> pallas::Base {
        self.trapdoor
    }

    #[must_use]
    pub fn nullifier_secret(&self) -> pallas::Base {
        self.nullifier_secret
    }

    /// Public commitment `H(trapdoor, nullifier_secret)`, the value stored as a tree leaf.
    #[must_use]
    pub fn commitment(&self) -> pallas::Base {
        self.commitment
    }

    /// Nullifier hash this identity emits for the given external message.
    #[must_use]
    pub fn nullifier_hash(&self, message: &[u8]) -> pallas::Base {
        compute_nullifier_hash(self.nullifier_secret, crate::utils::hash_message(message))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("trapdoor", &"<redacted>")
            .field("nullifier_secret", &"<redacted>")
            .field("commitment", &field_to_hex(self.commitment))
            .finish()
    }
}

/// Convenience wrapper around [`Identity::from_seed`].
pub fn derive_identity(seed: &[u8]) -> Result<Identity> {
    Identity::from_seed(seed)
}

#[must_use]
#[inline]
pub fn compute_commitment(trapdoor: pallas::Base, nullifier_secret: pallas::Base) -> pallas::Base {
    poseidon_hash(trapdoor, nullifier_secret)
}

/// `H(nullifier_secret, external_message_hash)`.
///
/// Deterministic per (identity, message) pair and unlinkable across messages.
#[must_use]
#[inline]
pub fn compute_nullifier_hash(
    nullifier_secret: pallas::Base,
    external_message_hash: pallas::Base,
) -> pallas::Base {
    poseidon_hash(nullifier_secret, external_message_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_identity(b"signed message bytes").unwrap();
        let b = derive_identity(b"signed message bytes").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.commitment(), b.commitment());
    }

    #[test]
    fn test_different_seeds_give_different_identities() {
        let a = derive_identity(b"seed-a").unwrap();
        let b = derive_identity(b"seed-b").unwrap();
        assert_ne!(a.commitment(), b.commitment());
        assert_ne!(a.trapdoor(), b.trapdoor());
        assert_ne!(a.nullifier_secret(), b.nullifier_secret());
    }

    #[test]
    fn test_secrets_are_independent() {
        let id = derive_identity(b"seed").unwrap();
        assert_ne!(id.trapdoor(), id.nullifier_secret());
    }

    #[test]
    fn test_empty_seed_rejected() {
        let err = derive_identity(b"").unwrap_err();
        assert!(matches!(err, MembershipError::InvalidSeed(_)));
    }

    #[test]
    fn test_commitment_matches_poseidon() {
        let id = derive_identity(b"seed").unwrap();
        assert_eq!(
            id.commitment(),
            poseidon_hash(id.trapdoor(), id.nullifier_secret())
        );
    }

    #[test]
    fn test_nullifier_hash_is_message_scoped() {
        let id = derive_identity(b"seed").unwrap();
        assert_eq!(id.nullifier_hash(b"hello"), id.nullifier_hash(b"hello"));
        assert_ne!(id.nullifier_hash(b"hello"), id.nullifier_hash(b"hello!"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let id = derive_identity(b"seed").unwrap();
        let rendered = format!("{id:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&field_to_hex(id.trapdoor())));
        assert!(!rendered.contains(&field_to_hex(id.nullifier_secret())));
    }
}
