//! Shared, optionally durable membership tree.
//!
//! Inserts are serialized behind the write lock; root lookups and membership
//! proofs take the read lock and run in parallel.

use crate::error::{MembershipError, Result};
use crate::merkle::{MembershipProof, MerkleMembershipTree};
use crate::utils::{field_from_hex, field_to_hex};
use log::{debug, info};
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// On-disk form of the tree: depth plus commitments in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub depth: usize,
    pub leaves: Vec<String>,
}

impl GroupSnapshot {
    #[must_use]
    pub fn from_tree(tree: &MerkleMembershipTree) -> Self {
        Self {
            depth: tree.depth(),
            leaves: tree.leaves().iter().copied().map(field_to_hex).collect(),
        }
    }

    /// Rebuilds the tree by replaying every insert.
    pub fn into_tree(self) -> Result<MerkleMembershipTree> {
        let leaves = self
            .leaves
            .iter()
            .enumerate()
            .map(|(i, hex)| {
                field_from_hex(hex).map_err(|e| {
                    MembershipError::storage(&format!("invalid leaf at index {i}"), e)
                })
            })
            .collect::<Result<Vec<pallas::Base>>>()?;
        MerkleMembershipTree::from_leaves(self.depth, leaves)
    }
}

pub struct MembershipGroup {
    tree: RwLock<MerkleMembershipTree>,
    state_file: Option<PathBuf>,
}

impl MembershipGroup {
    /// Empty in-memory group.
    pub fn new(depth: usize) -> Result<Self> {
        Ok(Self {
            tree: RwLock::new(MerkleMembershipTree::new(depth)?),
            state_file: None,
        })
    }

    /// Loads the group from `path`, or starts an empty tree of `depth` if the
    /// file does not exist yet. Every later insert is flushed to `path`.
    ///
    /// # Errors
    /// [`MembershipError::Storage`] for unreadable files and
    /// [`MembershipError::InvalidDepth`] if the stored depth differs from `depth`.
    pub fn open(path: impl AsRef<Path>, depth: usize) -> Result<Self> {
        let path = path.as_ref();
        let tree = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| MembershipError::storage("failed to read group state", e))?;
            let snapshot: GroupSnapshot = serde_json::from_str(&content)
                .map_err(|e| MembershipError::storage("failed to parse group state", e))?;
            if snapshot.depth != depth {
                return Err(MembershipError::InvalidDepth(snapshot.depth));
            }
            let tree = snapshot.into_tree()?;
            info!(
                "Loaded group with {} members from {} (root {})",
                tree.len(),
                path.display(),
                field_to_hex(tree.root())
            );
            tree
        } else {
            info!("Starting empty group at {}", path.display());
            MerkleMembershipTree::new(depth)?
        };

        Ok(Self {
            tree: RwLock::new(tree),
            state_file: Some(path.to_path_buf()),
        })
    }

    /// Appends a commitment. The state file is rewritten before the new leaf
    /// becomes visible, so a failed write leaves the group unchanged.
    ///
    /// With a state file every insert clones the tree and rewrites the full
    /// snapshot, so a durable insert costs O(n) in the group size.
    pub fn insert(&self, commitment: pallas::Base) -> Result<u64> {
        let mut tree = self.write();
        let index = match &self.state_file {
            None => tree.insert(commitment)?,
            Some(path) => {
                let mut next = tree.clone();
                let index = next.insert(commitment)?;
                persist(path, &next)?;
                *tree = next;
                index
            }
        };

        info!(
            "Registered commitment {} at index {}",
            field_to_hex(commitment),
            index
        );
        Ok(index)
    }

    #[must_use]
    pub fn root(&self) -> pallas::Base {
        self.read().root()
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.read().depth()
    }

    #[must_use]
    pub fn index_of(&self, commitment: pallas::Base) -> Option<u64> {
        self.read().index_of(commitment)
    }

    pub fn prove_membership(&self, leaf_index: u64) -> Result<MembershipProof> {
        self.read().prove_membership(leaf_index)
    }

    /// Point-in-time copy of the tree.
    #[must_use]
    pub fn snapshot(&self) -> MerkleMembershipTree {
        self.read().clone()
    }

    // Tree inserts validate before mutating; a poisoned lock still guards a whole tree.
    fn read(&self) -> RwLockReadGuard<'_, MerkleMembershipTree> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MerkleMembershipTree> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn persist(path: &Path, tree: &MerkleMembershipTree) -> Result<()> {
    let json = serde_json::to_string_pretty(&GroupSnapshot::from_tree(tree))
        .map_err(|e| MembershipError::storage("failed to serialize group state", e))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| MembershipError::storage("failed to create group state directory", e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    write_synced(&tmp, json.as_bytes())
        .map_err(|e| MembershipError::storage("failed to write group state", e))?;
    fs::rename(&tmp, path)
        .map_err(|e| MembershipError::storage("failed to replace group state", e))?;

    debug!("Persisted {} leaves to {}", tree.len(), path.display());
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

impl std::fmt::Debug for MembershipGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tree = self.read();
        f.debug_struct("MembershipGroup")
            .field("depth", &tree.depth())
            .field("members", &tree.len())
            .field("root", &field_to_hex(tree.root()))
            .field("state_file", &self.state_file)
            .finish()
    }
}
