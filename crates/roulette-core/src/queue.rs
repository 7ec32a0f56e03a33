//! The four FIFO waiting pools.
//!
//! FIFO over LIFO for fairness: the user who has waited longest is paired
//! next. Removal must be O(1), so pools use lazy deletion — `remove` only
//! drops the membership entry, and scans discard stale deque slots as they
//! walk past them. Each enqueue gets a fresh sequence number so a stale slot
//! can never be mistaken for a later re-enqueue of the same connection. The
//! membership index also makes `enqueue` idempotent: a connection can never
//! sit in two pools.

use std::collections::{HashMap, VecDeque};

use roulette_common::{ConnectionId, Gender, Profile, Tier};

/// Which pool a waiting user sits in.
///
/// The three gender-named pools hold premium users waiting for that specific
/// gender; everyone else waits in `Any`. A candidate of gender `g` therefore
/// scans pool `g` to find the premium waiters who asked for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Any,
    Male,
    Female,
    Other,
}

impl Bucket {
    /// The pool scanned on behalf of a candidate of the given gender.
    pub fn seeking(gender: Gender) -> Self {
        match gender {
            Gender::Male => Self::Male,
            Gender::Female => Self::Female,
            Gender::Other => Self::Other,
        }
    }

    /// Where a user with this profile waits: premium users with a specific
    /// preference go to the pool named by that preference, everyone else
    /// to `Any`.
    pub fn for_profile(profile: &Profile) -> Self {
        match (profile.tier, profile.preferred_gender.specific()) {
            (Tier::Premium, Some(gender)) => Self::seeking(gender),
            _ => Self::Any,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Any => 0,
            Self::Male => 1,
            Self::Female => 2,
            Self::Other => 3,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
struct Membership {
    bucket: Bucket,
    seq: u64,
}

/// Four FIFO pools plus a membership index for O(1) removal.
#[derive(Default)]
pub struct QueueSet {
    pools: [VecDeque<(ConnectionId, u64)>; 4],
    membership: HashMap<ConnectionId, Membership>,
    next_seq: u64,
}

impl QueueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the back of the pool. Idempotent: a connection already in
    /// any pool is left where it is. Returns whether an insert happened.
    pub fn enqueue(&mut self, id: ConnectionId, bucket: Bucket) -> bool {
        if self.membership.contains_key(&id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.membership.insert(id, Membership { bucket, seq });
        self.pools[bucket.index()].push_back((id, seq));
        true
    }

    /// Remove from whichever pool holds the connection, if any. O(1): the
    /// deque slot becomes a tombstone that later scans discard.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Bucket> {
        self.membership.remove(&id).map(|m| m.bucket)
    }

    /// The pool currently holding this connection, if any.
    pub fn bucket_of(&self, id: ConnectionId) -> Option<Bucket> {
        self.membership.get(&id).map(|m| m.bucket)
    }

    /// Number of live waiters across all pools.
    pub fn len(&self) -> usize {
        self.membership.len()
    }

    pub fn is_empty(&self) -> bool {
        self.membership.is_empty()
    }

    /// Walk one pool oldest-first and pop the first waiter the predicate
    /// accepts. Ineligible waiters keep their position; tombstones from lazy
    /// removal are compacted away in passing.
    pub fn scan(
        &mut self,
        bucket: Bucket,
        mut eligible: impl FnMut(ConnectionId) -> bool,
    ) -> Option<ConnectionId> {
        let pool = &mut self.pools[bucket.index()];
        let mut skipped = Vec::new();
        let mut found = None;

        while let Some((id, seq)) = pool.pop_front() {
            if self.membership.get(&id) != Some(&Membership { bucket, seq }) {
                // Tombstone left behind by remove(); drop it.
                continue;
            }
            if eligible(id) {
                found = Some(id);
                break;
            }
            skipped.push((id, seq));
        }

        // Put ineligible waiters back in their original order.
        for entry in skipped.into_iter().rev() {
            pool.push_front(entry);
        }

        if let Some(id) = found {
            self.membership.remove(&id);
        }
        found
    }

    /// Live occurrences of a connection across all pools. Test support for
    /// the at-most-one-queue invariant; anything other than 0 or 1 is a bug.
    pub fn occurrences(&self, id: ConnectionId) -> usize {
        let Some(membership) = self.membership.get(&id) else {
            return 0;
        };
        self.pools[membership.bucket.index()]
            .iter()
            .filter(|(queued, seq)| *queued == id && *seq == membership.seq)
            .count()
    }

    /// Ids of all live waiters, in no particular order.
    pub fn waiters(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.membership.keys().copied()
    }
}
