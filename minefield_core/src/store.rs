//! Round storage.
//!
//! The engine talks to storage through [`RoundStore`] so that a persistent or
//! distributed backend can replace [`MemoryRoundStore`] without touching
//! round logic. Implementations provide two independent exclusive scopes:
//! one per owner (nonce allocation and the active-round slot) and one per
//! round (state check-and-mutate). When both are needed the round scope is
//! entered first.
//!
//! Retired rounds leave a small tombstone (owner and end state) so that a late
//! call on a finished round is reported as such rather than as an unknown id.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::round::{OwnerId, Round, RoundId, RoundState};

/// Tombstones kept by [`MemoryRoundStore`] before the oldest is dropped.
pub const DEFAULT_FINISHED_CAPACITY: usize = 10_000;

/// Per-owner bookkeeping guarded by the owner scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerSlot {
    last_nonce: u64,
    active: Option<RoundId>,
}

impl OwnerSlot {
    /// Consume the next nonce. The first round of an owner gets 1.
    pub fn next_nonce(&mut self) -> u64 {
        self.last_nonce += 1;
        self.last_nonce
    }

    pub fn last_nonce(&self) -> u64 {
        self.last_nonce
    }

    pub fn active_round(&self) -> Option<RoundId> {
        self.active
    }

    pub fn set_active(&mut self, round_id: RoundId) {
        self.active = Some(round_id);
    }

    /// Clear the active slot if it still points at `round_id`.
    pub fn clear_active(&mut self, round_id: RoundId) {
        if self.active == Some(round_id) {
            self.active = None;
        }
    }
}

pub trait RoundStore: Send + Sync {
    /// Run `f` with exclusive access to the owner's slot.
    fn with_owner<T>(&self, owner: &OwnerId, f: impl FnOnce(&mut OwnerSlot) -> T) -> T;

    fn insert(&self, round: Round);

    /// Run `f` with exclusive access to the round, or return `None` if no
    /// such round is stored.
    fn with_round<T>(&self, round_id: &RoundId, f: impl FnOnce(&mut Round) -> T) -> Option<T>;

    /// Drop a terminated round and free its owner's active slot. Called from
    /// inside the round's scope.
    fn retire(&self, round: &Round);

    /// How a retired round ended, while its tombstone is still kept.
    fn finished(&self, round_id: &RoundId) -> Option<FinishedRound>;

    fn active_count(&self) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRound {
    pub owner: OwnerId,
    pub state: RoundState,
}

/// Bounded FIFO of tombstones.
#[derive(Debug)]
struct FinishedLog {
    capacity: usize,
    order: VecDeque<RoundId>,
    rounds: HashMap<RoundId, FinishedRound>,
}

impl FinishedLog {
    fn record(&mut self, round_id: RoundId, finished: FinishedRound) {
        if self.capacity == 0 {
            return;
        }
        if self.rounds.insert(round_id, finished).is_none() {
            self.order.push_back(round_id);
        }
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.rounds.remove(&oldest);
            }
        }
    }
}

/// Process-local store: a sharded map of per-key mutexes. Created with the
/// engine and dropped with it.
pub struct MemoryRoundStore {
    owners: DashMap<OwnerId, Arc<Mutex<OwnerSlot>>>,
    rounds: DashMap<RoundId, Arc<Mutex<Round>>>,
    finished: Mutex<FinishedLog>,
}

impl Default for MemoryRoundStore {
    fn default() -> Self {
        Self::with_finished_capacity(DEFAULT_FINISHED_CAPACITY)
    }
}

impl MemoryRoundStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_finished_capacity(capacity: usize) -> Self {
        Self {
            owners: DashMap::new(),
            rounds: DashMap::new(),
            finished: Mutex::new(FinishedLog {
                capacity,
                order: VecDeque::new(),
                rounds: HashMap::new(),
            }),
        }
    }

    fn owner_slot(&self, owner: &OwnerId) -> Arc<Mutex<OwnerSlot>> {
        if let Some(slot) = self.owners.get(owner) {
            return slot.value().clone();
        }
        self.owners.entry(owner.clone()).or_default().value().clone()
    }
}

impl RoundStore for MemoryRoundStore {
    fn with_owner<T>(&self, owner: &OwnerId, f: impl FnOnce(&mut OwnerSlot) -> T) -> T {
        // Clone the Arc out so no map shard stays locked while `f` runs.
        let slot = self.owner_slot(owner);
        let mut guard = slot.lock();
        f(&mut guard)
    }

    fn insert(&self, round: Round) {
        self.rounds.insert(round.id(), Arc::new(Mutex::new(round)));
    }

    fn with_round<T>(&self, round_id: &RoundId, f: impl FnOnce(&mut Round) -> T) -> Option<T> {
        let cell = self.rounds.get(round_id).map(|r| r.value().clone())?;
        let mut guard = cell.lock();
        Some(f(&mut guard))
    }

    fn retire(&self, round: &Round) {
        // Tombstone first: a caller that misses the live map must find it.
        self.finished.lock().record(
            round.id(),
            FinishedRound {
                owner: round.owner().clone(),
                state: round.state(),
            },
        );
        self.rounds.remove(&round.id());
        self.with_owner(round.owner(), |slot| slot.clear_active(round.id()));
    }

    fn finished(&self, round_id: &RoundId) -> Option<FinishedRound> {
        self.finished.lock().rounds.get(round_id).cloned()
    }

    fn active_count(&self) -> usize {
        self.rounds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_increase() {
        let store = MemoryRoundStore::new();
        let alice = OwnerId::from("alice");
        let bob = OwnerId::from("bob");
        assert_eq!(store.with_owner(&alice, |s| s.next_nonce()), 1);
        assert_eq!(store.with_owner(&alice, |s| s.next_nonce()), 2);
        assert_eq!(store.with_owner(&bob, |s| s.next_nonce()), 1);
        assert_eq!(store.with_owner(&alice, |s| s.last_nonce()), 2);
    }

    #[test]
    fn test_nonces_unique_under_contention() {
        let store = Arc::new(MemoryRoundStore::new());
        let owner = OwnerId::from("busy");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let owner = owner.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| store.with_owner(&owner, |s| s.next_nonce()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(all.last(), Some(&800));
    }

    #[test]
    fn test_clear_only_matching_round() {
        let mut slot = OwnerSlot::default();
        let a = RoundId::new();
        let b = RoundId::new();
        slot.set_active(a);
        slot.clear_active(b);
        assert_eq!(slot.active_round(), Some(a));
        slot.clear_active(a);
        assert_eq!(slot.active_round(), None);
    }

    #[test]
    fn test_missing_round() {
        let store = MemoryRoundStore::new();
        assert!(store.with_round(&RoundId::new(), |_| ()).is_none());
        assert!(store.finished(&RoundId::new()).is_none());
        assert_eq!(store.active_count(), 0);
    }

    #[test]
    fn test_finished_log_drops_oldest() {
        let mut log = FinishedLog {
            capacity: 2,
            order: VecDeque::new(),
            rounds: HashMap::new(),
        };
        let ids: Vec<RoundId> = (0..3).map(|_| RoundId::new()).collect();
        for id in &ids {
            log.record(
                *id,
                FinishedRound {
                    owner: OwnerId::from("alice"),
                    state: RoundState::Lost,
                },
            );
        }
        assert!(!log.rounds.contains_key(&ids[0]));
        assert!(log.rounds.contains_key(&ids[1]));
        assert!(log.rounds.contains_key(&ids[2]));
        assert_eq!(log.order.len(), 2);
    }
}
