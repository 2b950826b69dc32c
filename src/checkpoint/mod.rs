//! The record of already-processed messages.
//!
//! Messages are identified by IMAP UID. UIDs are only meaningful together
//! with the mailbox's UIDVALIDITY, so the checkpoint carries that value and
//! starts over when the server reports a different one.

pub mod format;
pub mod store;

use std::collections::{BTreeSet, HashSet};

/// IMAP unique identifier of a message within one mailbox.
pub type Uid = u32;

/// Set of processed UIDs for one mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    uid_validity: Option<u32>,
    seen: BTreeSet<Uid>,
}

impl Checkpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(uid_validity: Option<u32>, seen: BTreeSet<Uid>) -> Self {
        Self { uid_validity, seen }
    }

    pub fn uid_validity(&self) -> Option<u32> {
        self.uid_validity
    }

    pub fn contains(&self, uid: Uid) -> bool {
        self.seen.contains(&uid)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Processed UIDs in ascending order.
    pub fn uids(&self) -> impl Iterator<Item = Uid> + '_ {
        self.seen.iter().copied()
    }

    /// UIDs from `unseen` that have not been processed yet, ascending.
    pub fn new_since(&self, unseen: &HashSet<Uid>) -> Vec<Uid> {
        let mut fresh: Vec<Uid> = unseen
            .iter()
            .copied()
            .filter(|uid| !self.seen.contains(uid))
            .collect();
        fresh.sort_unstable();
        fresh
    }

    /// Add processed UIDs.
    pub fn record(&mut self, uids: impl IntoIterator<Item = Uid>) {
        self.seen.extend(uids);
    }

    /// Adopt the server's UIDVALIDITY.
    ///
    /// Returns `true` when a previously stored, different value forced the
    /// set to be cleared.
    pub fn reconcile_validity(&mut self, uid_validity: Option<u32>) -> bool {
        let Some(current) = uid_validity else {
            return false;
        };
        match self.uid_validity {
            Some(stored) if stored == current => false,
            Some(_) => {
                self.seen.clear();
                self.uid_validity = Some(current);
                true
            }
            None => {
                self.uid_validity = Some(current);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_since_is_set_difference() {
        let mut cp = Checkpoint::new();
        cp.record([3, 5]);
        let unseen: HashSet<Uid> = [5, 9, 3, 7].into_iter().collect();
        assert_eq!(cp.new_since(&unseen), vec![7, 9]);
    }

    #[test]
    fn test_recorded_uids_never_come_back() {
        let mut cp = Checkpoint::new();
        let unseen: HashSet<Uid> = [1, 2, 3].into_iter().collect();
        let first = cp.new_since(&unseen);
        cp.record(first.iter().copied());
        assert!(cp.new_since(&unseen).is_empty());
        assert_eq!(cp.len(), 3);
    }

    #[test]
    fn test_first_validity_is_adopted() {
        let mut cp = Checkpoint::new();
        cp.record([1]);
        assert!(!cp.reconcile_validity(Some(42)));
        assert_eq!(cp.uid_validity(), Some(42));
        assert!(cp.contains(1));
    }

    #[test]
    fn test_changed_validity_resets() {
        let mut cp = Checkpoint::from_parts(Some(42), [1, 2].into_iter().collect());
        assert!(cp.reconcile_validity(Some(43)));
        assert!(cp.is_empty());
        assert_eq!(cp.uid_validity(), Some(43));
    }

    #[test]
    fn test_unknown_validity_changes_nothing() {
        let mut cp = Checkpoint::from_parts(Some(42), [1].into_iter().collect());
        assert!(!cp.reconcile_validity(None));
        assert!(!cp.reconcile_validity(Some(42)));
        assert_eq!(cp.len(), 1);
    }
}
