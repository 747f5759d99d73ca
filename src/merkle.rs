//! Append-only, fixed-depth Merkle tree of identity commitments.
//!
//! Nodes are Poseidon hashes over the Pallas base field. Empty subtrees are
//! filled with a chain of zero values rooted in a domain-separated constant,
//! so proofs for sparsely filled trees are well defined and an empty slot is
//! never mistaken for a real commitment.

use crate::error::{MembershipError, Result};
use crate::utils::{field_to_hex, hash_to_field, poseidon_hash};
use log::debug;
use pasta_curves::pallas;
use std::fmt;

/// Largest supported depth. Capacity is `2^depth` leaves.
pub const MAX_DEPTH: usize = 32;

const DOMAIN_EMPTY_LEAF: &[u8] = b"zkp-group-membership/v1/empty-leaf";

/// Value occupying every leaf slot that has not been filled yet.
#[must_use]
pub fn empty_leaf() -> pallas::Base {
    hash_to_field(DOMAIN_EMPTY_LEAF, &[])
}

/// Position of the proven node relative to its sibling at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// The node is the left child; the sibling sits on the right.
    Left,
    /// The node is the right child; the sibling sits on the left.
    Right,
}

impl Direction {
    fn from_index(index: u64) -> Self {
        if index % 2 == 0 {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    /// `true` when the node is a right child, the bit the circuit consumes.
    #[must_use]
    pub fn is_right(self) -> bool {
        self == Direction::Right
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathElement {
    pub sibling: pallas::Base,
    pub direction: Direction,
}

/// A Merkle proof for leaf inclusion.
///
/// `siblings` is ordered from the leaf level up to the level just below the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipProof {
    pub leaf_index: u64,
    pub leaf: pallas::Base,
    pub root: pallas::Base,
    pub siblings: Vec<PathElement>,
    pub depth: usize,
}

impl MembershipProof {
    /// Folds the path starting from `leaf` and returns the resulting root.
    #[must_use]
    pub fn compute_root_from(&self, leaf: pallas::Base) -> pallas::Base {
        self.siblings.iter().fold(leaf, |node, step| match step.direction {
            Direction::Left => poseidon_hash(node, step.sibling),
            Direction::Right => poseidon_hash(step.sibling, node),
        })
    }

    /// Checks the path shape and that folding the stored leaf reproduces `root`.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.siblings.len() == self.depth && self.compute_root_from(self.leaf) == self.root
    }
}

impl fmt::Display for MembershipProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MembershipProof:\n  Leaf: {}\n  Root: {}\n  Index: {}\n  Depth: {}",
            field_to_hex(self.leaf),
            field_to_hex(self.root),
            self.leaf_index,
            self.depth
        )
    }
}

/// Incremental binary Merkle accumulator.
///
/// `nodes[level]` holds the populated prefix of that level; anything past the
/// end is an empty subtree whose value is `zeros[level]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleMembershipTree {
    depth: usize,
    zeros: Vec<pallas::Base>,
    nodes: Vec<Vec<pallas::Base>>,
    root: pallas::Base,
}

impl MerkleMembershipTree {
    /// Creates an empty tree of the given depth.
    ///
    /// # Errors
    /// [`MembershipError::InvalidDepth`] if `depth` is 0 or above [`MAX_DEPTH`].
    pub fn new(depth: usize) -> Result<Self> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(MembershipError::InvalidDepth(depth));
        }

        let mut zeros = Vec::with_capacity(depth + 1);
        zeros.push(empty_leaf());
        for level in 0..depth {
            let z = zeros[level];
            zeros.push(poseidon_hash(z, z));
        }

        Ok(Self {
            depth,
            root: zeros[depth],
            zeros,
            nodes: vec![Vec::new(); depth + 1],
        })
    }

    /// Builds a tree from an ordered snapshot of commitments.
    pub fn from_leaves<I>(depth: usize, leaves: I) -> Result<Self>
    where
        I: IntoIterator<Item = pallas::Base>,
    {
        let mut tree = Self::new(depth)?;
        for leaf in leaves {
            tree.insert(leaf)?;
        }
        Ok(tree)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.nodes[0].len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes[0].is_empty()
    }

    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.root
    }

    /// Commitments in insertion order.
    #[must_use]
    pub fn leaves(&self) -> &[pallas::Base] {
        &self.nodes[0]
    }

    /// Index of the first leaf equal to `commitment`.
    #[must_use]
    pub fn index_of(&self, commitment: pallas::Base) -> Option<u64> {
        self.nodes[0]
            .iter()
            .position(|leaf| *leaf == commitment)
            .map(|i| i as u64)
    }

    /// Appends `commitment` at the next free index and updates the root.
    ///
    /// # Errors
    /// - [`MembershipError::TreeFull`] once `2^depth` leaves are stored
    /// - [`MembershipError::InvalidCommitment`] for the empty-leaf constant
    pub fn insert(&mut self, commitment: pallas::Base) -> Result<u64> {
        let index = self.len();
        if index >= self.capacity() {
            return Err(MembershipError::TreeFull {
                capacity: self.capacity(),
            });
        }
        if commitment == self.zeros[0] {
            return Err(MembershipError::InvalidCommitment(
                "commitment equals the empty-leaf constant".into(),
            ));
        }

        self.nodes[0].push(commitment);

        let mut node = commitment;
        let mut position = index as usize;
        for level in 0..self.depth {
            let parent = if position % 2 == 0 {
                poseidon_hash(node, self.node_at(level, position + 1))
            } else {
                poseidon_hash(self.nodes[level][position - 1], node)
            };
            position /= 2;

            let above = &mut self.nodes[level + 1];
            if position < above.len() {
                above[position] = parent;
            } else {
                above.push(parent);
            }
            node = parent;
        }
        self.root = node;

        debug!(
            "Inserted leaf {} at index {}, new root {}",
            field_to_hex(commitment),
            index,
            field_to_hex(self.root)
        );
        Ok(index)
    }

    /// Generates the sibling path for the leaf at `leaf_index`.
    ///
    /// # Errors
    /// [`MembershipError::UnknownLeaf`] if nothing was inserted at that index.
    pub fn prove_membership(&self, leaf_index: u64) -> Result<MembershipProof> {
        if leaf_index >= self.len() {
            return Err(MembershipError::UnknownLeaf(leaf_index));
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut position = leaf_index;
        for level in 0..self.depth {
            let sibling_position = (position ^ 1) as usize;
            siblings.push(PathElement {
                sibling: self.node_at(level, sibling_position),
                direction: Direction::from_index(position),
            });
            position /= 2;
        }

        Ok(MembershipProof {
            leaf_index,
            leaf: self.nodes[0][leaf_index as usize],
            root: self.root,
            siblings,
            depth: self.depth,
        })
    }

    fn node_at(&self, level: usize, position: usize) -> pallas::Base {
        self.nodes[level]
            .get(position)
            .copied()
            .unwrap_or(self.zeros[level])
    }
}
