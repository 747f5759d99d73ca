//! Error taxonomy for the membership-proof core.
//!
//! Every failure kind is terminal for the current request. Callers decide on
//! retries (for example, re-fetching the root and regenerating the proof after
//! [`MembershipError::StaleRoot`]).

use thiserror::Error;

/// Result alias used by the core library.
pub type Result<T> = std::result::Result<T, MembershipError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MembershipError {
    /// The identity seed is empty or does not resolve to usable field elements.
    #[error("invalid identity seed: {0}")]
    InvalidSeed(String),

    /// The requested tree depth is outside the supported range.
    #[error("invalid tree depth {0}: must be between 1 and {max}", max = crate::merkle::MAX_DEPTH)]
    InvalidDepth(usize),

    /// The commitment cannot be stored as a leaf (it collides with the empty-leaf constant).
    #[error("invalid commitment: {0}")]
    InvalidCommitment(String),

    /// All `2^depth` leaf slots are taken.
    #[error("membership tree is full (capacity {capacity})")]
    TreeFull { capacity: u64 },

    /// No commitment has been inserted at this index.
    #[error("no leaf at index {0}")]
    UnknownLeaf(u64),

    #[error("proof generation failed: {0}")]
    ProofGenerationFailed(String),

    /// The proof was built against a different root than the one the verifier knows.
    #[error("stale root: proof commits to {proof_root}, expected {expected_root}")]
    StaleRoot {
        proof_root: String,
        expected_root: String,
    },

    #[error("external message does not match the proof's message hash")]
    MessageMismatch,

    #[error("invalid proof: {0}")]
    InvalidProof(String),

    /// The nullifier hash was already consumed by an earlier verification.
    #[error("nullifier {0} has already been used")]
    AlreadyUsed(String),

    /// Durable state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl MembershipError {
    /// Stable machine-readable code for the failure kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSeed(_) => "INVALID_SEED",
            Self::InvalidDepth(_) => "INVALID_DEPTH",
            Self::InvalidCommitment(_) => "INVALID_COMMITMENT",
            Self::TreeFull { .. } => "TREE_FULL",
            Self::UnknownLeaf(_) => "UNKNOWN_LEAF",
            Self::ProofGenerationFailed(_) => "PROOF_GENERATION_FAILED",
            Self::StaleRoot { .. } => "STALE_ROOT",
            Self::MessageMismatch => "MESSAGE_MISMATCH",
            Self::InvalidProof(_) => "INVALID_PROOF",
            Self::AlreadyUsed(_) => "ALREADY_USED",
            Self::Storage(_) => "STORAGE",
        }
    }

    pub(crate) fn storage(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Storage(format!("{context}: {err}"))
    }
}
