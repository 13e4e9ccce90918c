// src/storage/revocation_registry.rs
//! Locally distributed revocation list.
//!
//! The registry holds the set of revoked CIDs. It is read-mostly: every
//! verification performs a lookup, revocations are rare. Writers build a new
//! immutable snapshot and publish it with a pointer swap, so readers only
//! hold the lock long enough to clone an `Arc`.
//!
//! Revocation is monotonic: there is no removal path.

use crate::error::RevocationListError;
use crate::models::credential::Cid;
use log::{info, warn};
use std::collections::HashSet;
use std::io::BufRead;
use std::sync::{Arc, PoisonError, RwLock};

/// Immutable view of the revoked CIDs at one point in time.
pub type Snapshot = Arc<HashSet<Cid>>;

/// How [`RevocationRegistry::load`] combines a new list with the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Publish the new list as the full set. It must carry every CID revoked
    /// so far, otherwise the load is refused.
    Replace,
    /// Union the new list into the current set.
    Merge,
}

/// Thread-safe set of revoked credential identifiers.
#[derive(Debug, Default)]
pub struct RevocationRegistry {
    current: RwLock<Snapshot>,
}

impl RevocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot. Later revocations do not affect it.
    pub fn snapshot(&self) -> Snapshot {
        // A poisoned lock still guards a fully published snapshot.
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // `update` returns `None` to keep the current snapshot unpublished.
    fn publish<F, E>(&self, update: F) -> Result<Option<usize>, E>
    where
        F: FnOnce(&HashSet<Cid>) -> Result<Option<HashSet<Cid>>, E>,
    {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        match update(&guard)? {
            Some(next) => {
                let len = next.len();
                *guard = Arc::new(next);
                Ok(Some(len))
            }
            None => Ok(None),
        }
    }

    /// Loads a batch of CIDs.
    ///
    /// # Arguments
    /// * `cids` - Revoked identifiers from the distributed list
    /// * `mode` - Whether the batch is the full list or an increment
    ///
    /// # Returns
    /// The size of the published set.
    ///
    /// # Errors
    /// `RevocationListError::WouldUnrevoke` when `mode` is
    /// [`LoadMode::Replace`] and the batch lacks a CID that is already
    /// revoked. The registry is left untouched.
    pub fn load<I>(&self, cids: I, mode: LoadMode) -> Result<usize, RevocationListError>
    where
        I: IntoIterator<Item = Cid>,
    {
        let incoming: HashSet<Cid> = cids.into_iter().collect();
        let batch = incoming.len();
        let published = self.publish(|current| match mode {
            LoadMode::Replace => {
                let missing = current.difference(&incoming).count();
                if missing > 0 {
                    return Err(RevocationListError::WouldUnrevoke { missing });
                }
                Ok(Some(incoming))
            }
            LoadMode::Merge => {
                let mut next = current.clone();
                next.extend(incoming);
                Ok(Some(next))
            }
        });
        let len = match published {
            Ok(len) => len.unwrap_or(0),
            Err(err) => {
                warn!("refusing revocation list ({:?}): {}", mode, err);
                return Err(err);
            }
        };
        info!("revocation list loaded: {} entries in batch, {} revoked ({:?})", batch, len, mode);
        Ok(len)
    }

    /// Parses a revocation list with one hex CID per line and loads it.
    ///
    /// Blank lines and lines starting with `#` are skipped. Any malformed
    /// line aborts the load and leaves the registry untouched.
    pub fn load_from_reader<R: BufRead>(
        &self,
        reader: R,
        mode: LoadMode,
    ) -> Result<usize, RevocationListError> {
        let mut cids = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            let entry = line.trim();
            if entry.is_empty() || entry.starts_with('#') {
                continue;
            }
            let cid = entry.parse::<Cid>().map_err(|reason| {
                warn!("rejecting revocation list at line {}", index + 1);
                RevocationListError::InvalidEntry {
                    line: index + 1,
                    reason,
                }
            })?;
            cids.push(cid);
        }
        self.load(cids, mode)
    }

    /// Membership lookup against the current snapshot.
    pub fn contains(&self, cid: &Cid) -> bool {
        self.snapshot().contains(cid)
    }

    /// Revokes a CID. Idempotent.
    ///
    /// # Returns
    /// `true` if the CID was not revoked before this call.
    pub fn revoke(&self, cid: Cid) -> bool {
        if self.contains(&cid) {
            return false;
        }
        // Another writer may have published `cid` since the read above.
        let published = self.publish::<_, std::convert::Infallible>(|current| {
            if current.contains(&cid) {
                return Ok(None);
            }
            let mut next = current.clone();
            next.insert(cid);
            Ok(Some(next))
        });
        let added = matches!(published, Ok(Some(_)));
        if added {
            info!("revoked cid={}", cid);
        }
        added
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
