//! Consumed-nullifier registry, the replay guard for verified proofs.

use crate::error::{MembershipError, Result};
use crate::utils::{field_to_bytes, FIELD_BYTES};
use log::{debug, info, warn};
use pasta_curves::pallas;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

struct RegistryState {
    consumed: HashSet<[u8; FIELD_BYTES]>,
    log: Option<File>,
    // Set when the log's last entry has no trailing newline.
    needs_newline: bool,
}

/// Set of nullifier hashes that have been accepted once.
///
/// Check and record happen under one lock, so two concurrent callers can never
/// both observe a nullifier as unused. There is no way to un-consume an entry.
pub struct NullifierRegistry {
    state: Mutex<RegistryState>,
    path: Option<PathBuf>,
}

impl NullifierRegistry {
    /// Registry without durable backing.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                consumed: HashSet::new(),
                log: None,
                needs_newline: false,
            }),
            path: None,
        }
    }

    /// Opens (or creates) an append-only log with one hex nullifier per line.
    ///
    /// A final line without a newline is the tail of an interrupted append. It
    /// is kept if it decodes and cut off otherwise.
    ///
    /// # Errors
    /// [`MembershipError::Storage`] if the file cannot be opened or a complete
    /// line is malformed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| MembershipError::storage("failed to open nullifier log", e))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .map_err(|e| MembershipError::storage("failed to read nullifier log", e))?;

        let complete_len = content.rfind('\n').map_or(0, |i| i + 1);
        let (complete, tail) = content.split_at(complete_len);

        let mut consumed = HashSet::new();
        for (line_no, line) in complete.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let bytes = decode_entry(trimmed).map_err(|e| {
                MembershipError::storage(
                    &format!("malformed nullifier on line {} of {}", line_no + 1, path.display()),
                    e,
                )
            })?;
            consumed.insert(bytes);
        }

        let mut needs_newline = false;
        let tail = tail.trim();
        if !tail.is_empty() {
            match decode_entry(tail) {
                Ok(bytes) => {
                    consumed.insert(bytes);
                    needs_newline = true;
                }
                Err(e) => {
                    warn!(
                        "Discarding torn entry at the end of {}: {e}",
                        path.display()
                    );
                    file.set_len(complete_len as u64).map_err(|e| {
                        MembershipError::storage("failed to truncate torn nullifier entry", e)
                    })?;
                }
            }
        }

        info!(
            "Loaded {} consumed nullifiers from {}",
            consumed.len(),
            path.display()
        );
        Ok(Self {
            state: Mutex::new(RegistryState {
                consumed,
                log: Some(file),
                needs_newline,
            }),
            path: Some(path.to_path_buf()),
        })
    }

    /// Marks `nullifier_hash` consumed, failing if it already was.
    ///
    /// # Errors
    /// - [`MembershipError::AlreadyUsed`] on replay
    /// - [`MembershipError::Storage`] if the durable log cannot be appended;
    ///   the nullifier is then not consumed and the log is rolled back
    pub fn check_and_consume(&self, nullifier_hash: pallas::Base) -> Result<()> {
        let key = field_to_bytes(nullifier_hash);
        let encoded = hex::encode(key);

        let mut guard = self.lock();
        let state = &mut *guard;
        if state.consumed.contains(&key) {
            return Err(MembershipError::AlreadyUsed(encoded));
        }

        if let Some(log) = state.log.as_mut() {
            append_entry(log, &encoded, state.needs_newline)
                .map_err(|e| MembershipError::storage("failed to record nullifier", e))?;
            state.needs_newline = false;
        }
        state.consumed.insert(key);

        debug!("Consumed nullifier {encoded}");
        Ok(())
    }

    #[must_use]
    pub fn is_consumed(&self, nullifier_hash: pallas::Base) -> bool {
        self.lock().consumed.contains(&field_to_bytes(nullifier_hash))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().consumed.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The consumed set only grows by whole entries, so a poisoned lock still
    // guards a consistent set.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for NullifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullifierRegistry")
            .field("consumed", &self.len())
            .field("path", &self.path)
            .finish()
    }
}

fn decode_entry(line: &str) -> std::result::Result<[u8; FIELD_BYTES], hex::FromHexError> {
    let mut bytes = [0u8; FIELD_BYTES];
    hex::decode_to_slice(line, &mut bytes)?;
    Ok(bytes)
}

/// Appends one entry and syncs it. On failure the file is cut back to its
/// previous length so no partial entry stays behind.
fn append_entry(file: &mut File, entry: &str, needs_newline: bool) -> std::io::Result<()> {
    let previous_len = file.metadata()?.len();

    let mut record = String::with_capacity(entry.len() + 2);
    if needs_newline {
        record.push('\n');
    }
    record.push_str(entry);
    record.push('\n');

    if let Err(e) = write_synced(file, record.as_bytes()) {
        if let Err(rollback) = file.set_len(previous_len) {
            warn!("Failed to roll back nullifier log to {previous_len} bytes: {rollback}");
        }
        return Err(e);
    }
    Ok(())
}

fn write_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_data()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::field_to_hex;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_consume_once() {
        let registry = NullifierRegistry::in_memory();
        let nf = pallas::Base::from(7);
        assert!(!registry.is_consumed(nf));
        registry.check_and_consume(nf).unwrap();
        assert!(registry.is_consumed(nf));
        assert_eq!(
            registry.check_and_consume(nf).unwrap_err(),
            MembershipError::AlreadyUsed(field_to_hex(nf))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_nullifiers_are_independent() {
        let registry = NullifierRegistry::in_memory();
        registry.check_and_consume(pallas::Base::from(1)).unwrap();
        registry.check_and_consume(pallas::Base::from(2)).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_concurrent_consumers_single_winner() {
        let registry = Arc::new(NullifierRegistry::in_memory());
        let nf = pallas::Base::from(42);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.check_and_consume(nf))
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, MembershipError::AlreadyUsed(_))));
    }

    #[test]
    fn test_durable_across_reopen() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        let nf = pallas::Base::from(99);

        {
            let registry = NullifierRegistry::open(&path).unwrap();
            assert!(registry.is_empty());
            registry.check_and_consume(nf).unwrap();
        }

        let reopened = NullifierRegistry::open(&path).unwrap();
        assert!(reopened.is_consumed(nf));
        assert!(matches!(
            reopened.check_and_consume(nf),
            Err(MembershipError::AlreadyUsed(_))
        ));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1);
        assert_eq!(content.trim(), field_to_hex(nf));
    }

    #[test]
    fn test_malformed_log_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        std::fs::write(&path, "not-a-nullifier\n").unwrap();

        let err = NullifierRegistry::open(&path).unwrap_err();
        assert_eq!(err.code(), "STORAGE");
    }

    #[test]
    fn test_log_without_trailing_newline_stays_readable() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        let first = pallas::Base::from(1);
        let second = pallas::Base::from(2);
        std::fs::write(&path, field_to_hex(first)).unwrap();

        {
            let registry = NullifierRegistry::open(&path).unwrap();
            assert!(registry.is_consumed(first));
            registry.check_and_consume(second).unwrap();
        }

        let reopened = NullifierRegistry::open(&path).unwrap();
        assert!(reopened.is_consumed(first));
        assert!(reopened.is_consumed(second));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            format!("{}\n{}\n", field_to_hex(first), field_to_hex(second))
        );
    }

    #[test]
    fn test_torn_tail_is_discarded() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        let first = pallas::Base::from(1);
        let second = pallas::Base::from(2);
        std::fs::write(&path, format!("{}\nabcd", field_to_hex(first))).unwrap();

        {
            let registry = NullifierRegistry::open(&path).unwrap();
            assert_eq!(registry.len(), 1);
            assert!(registry.is_consumed(first));
            registry.check_and_consume(second).unwrap();
        }

        let reopened = NullifierRegistry::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(!content.contains("abcd"));
    }

    #[test]
    fn test_failed_append_leaves_log_unchanged() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nullifiers.txt");
        let existing = format!("{}\n", field_to_hex(pallas::Base::from(1)));
        std::fs::write(&path, &existing).unwrap();

        // A read-only handle makes every write fail.
        let mut read_only = File::open(&path).unwrap();
        let encoded = field_to_hex(pallas::Base::from(2));
        assert!(append_entry(&mut read_only, &encoded, false).is_err());

        assert_eq!(std::fs::read_to_string(&path).unwrap(), existing);
        assert_eq!(NullifierRegistry::open(&path).unwrap().len(), 1);
    }
}
