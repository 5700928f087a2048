use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    thread::sleep,
    time::{Duration, Instant},
};

use log::debug;

use crate::{
    error::{DbError, DbResult},
    storage::heap::HeapPageID,
    transaction::{Transaction, TransactionID},
};

/// How long a single page request may wait before the requester is
/// treated as deadlocked.
const DEFAULT_TIMEOUT_MS: u64 = 100;

const RETRY_INTERVAL_MS: u64 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lock {
    Shared,
    Exclusive,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::Shared,
            Permission::ReadWrite => Lock::Exclusive,
        }
    }
}

#[derive(Default)]
struct LockState {
    // per page, the granted (transaction, mode) entries; if any entry is
    // exclusive it is the only one
    locks: HashMap<HeapPageID, Vec<(TransactionID, Lock)>>,

    hold_pages: HashMap<TransactionID, HashSet<HeapPageID>>,
}

/// Page-granularity strict two-phase locking. Deadlocks are broken by
/// timeout: a request that cannot be granted within the window aborts
/// its transaction.
pub struct LockTable {
    state: Mutex<LockState>,

    timeout_ms: AtomicU64,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            timeout_ms: AtomicU64::new(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn set_timeout(&self, ms: u64) {
        self.timeout_ms.store(ms, Ordering::Relaxed);
    }

    /// Request a lock on the given page. Blocks until the lock is
    /// granted or the deadlock window expires.
    pub fn acquire_lock(
        &self,
        tx: &Transaction,
        lock: &Lock,
        pid: &HeapPageID,
    ) -> DbResult<()> {
        let timeout = Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed));
        let start_time = Instant::now();

        loop {
            {
                let mut state = self.state.lock().unwrap();
                if Self::add_lock(&mut state, tx.get_id(), lock, pid) {
                    return Ok(());
                }
            }

            if start_time.elapsed() >= timeout {
                debug!(
                    "{} gives up on {:?} lock for {}, waited {:?}",
                    tx,
                    lock,
                    pid,
                    start_time.elapsed()
                );
                return Err(DbError::TransactionAborted(tx.get_id()));
            }

            sleep(Duration::from_millis(RETRY_INTERVAL_MS));
        }
    }

    // One grant attempt, idempotent. Returns whether the lock is now
    // held by the requester.
    fn add_lock(
        state: &mut LockState,
        tid: TransactionID,
        lock: &Lock,
        pid: &HeapPageID,
    ) -> bool {
        if !state.locks.contains_key(pid) {
            state.locks.insert(*pid, vec![(tid, *lock)]);
            state.hold_pages.entry(tid).or_default().insert(*pid);
            return true;
        }

        let entries = state.locks.get_mut(pid).unwrap();
        let granted = if let Some(pos) = entries.iter().position(|(t, _)| *t == tid) {
            let held = entries[pos].1;
            match (held, *lock) {
                // reentrant
                (Lock::Shared, Lock::Shared) | (Lock::Exclusive, Lock::Exclusive) => true,
                // an exclusive lock covers a later shared request
                (Lock::Exclusive, Lock::Shared) => true,
                (Lock::Shared, Lock::Exclusive) => {
                    // upgrade is only possible for the sole holder
                    if entries.len() == 1 {
                        entries[pos].1 = Lock::Exclusive;
                        true
                    } else {
                        false
                    }
                }
            }
        } else if entries.iter().any(|(_, l)| *l == Lock::Exclusive) {
            false
        } else {
            // all holders are shared
            match lock {
                Lock::Shared => {
                    entries.push((tid, Lock::Shared));
                    true
                }
                Lock::Exclusive => false,
            }
        };

        if granted {
            state.hold_pages.entry(tid).or_default().insert(*pid);
        }
        granted
    }

    /// Drop one (transaction, page) lock. Safe only when the caller
    /// knows no rollback will need the page; exposed for recovery-style
    /// code paths.
    pub fn release_lock(&self, tx: &Transaction, pid: &HeapPageID) {
        let mut state = self.state.lock().unwrap();
        Self::remove_lock(&mut state, tx.get_id(), pid);
    }

    /// Drop every lock the transaction holds. Called only at
    /// transaction completion.
    pub fn release_all(&self, tx: &Transaction) {
        let mut state = self.state.lock().unwrap();
        let pids: Vec<HeapPageID> = state
            .hold_pages
            .get(&tx.get_id())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        for pid in pids {
            Self::remove_lock(&mut state, tx.get_id(), &pid);
        }
        state.hold_pages.remove(&tx.get_id());
    }

    fn remove_lock(state: &mut LockState, tid: TransactionID, pid: &HeapPageID) {
        if let Some(entries) = state.locks.get_mut(pid) {
            entries.retain(|(t, _)| *t != tid);
            if entries.is_empty() {
                state.locks.remove(pid);
            }
        }
        if let Some(pages) = state.hold_pages.get_mut(&tid) {
            pages.remove(pid);
        }
    }

    pub fn holds_lock(&self, tx: &Transaction, pid: &HeapPageID) -> bool {
        let state = self.state.lock().unwrap();
        state
            .locks
            .get(pid)
            .map(|entries| entries.iter().any(|(t, _)| *t == tx.get_id()))
            .unwrap_or(false)
    }

    pub fn held_pages(&self, tx: &Transaction) -> HashSet<HeapPageID> {
        let state = self.state.lock().unwrap();
        state
            .hold_pages
            .get(&tx.get_id())
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(i: u32) -> HeapPageID {
        HeapPageID::new(7, i)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let table = LockTable::new();
        table.set_timeout(10);
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        table.acquire_lock(&t1, &Lock::Shared, &pid(0)).unwrap();
        table.acquire_lock(&t2, &Lock::Shared, &pid(0)).unwrap();
        assert!(table.holds_lock(&t1, &pid(0)));
        assert!(table.holds_lock(&t2, &pid(0)));
    }

    #[test]
    fn test_exclusive_blocks_others() {
        let table = LockTable::new();
        table.set_timeout(10);
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        table.acquire_lock(&t1, &Lock::Exclusive, &pid(0)).unwrap();
        assert!(table.acquire_lock(&t2, &Lock::Shared, &pid(0)).is_err());
        assert!(table
            .acquire_lock(&t2, &Lock::Exclusive, &pid(0))
            .is_err());

        // a different page is unaffected
        table.acquire_lock(&t2, &Lock::Exclusive, &pid(1)).unwrap();
    }

    #[test]
    fn test_reentrant_grants() {
        let table = LockTable::new();
        table.set_timeout(10);
        let t1 = Transaction::new();

        table.acquire_lock(&t1, &Lock::Exclusive, &pid(0)).unwrap();
        // exclusive covers a later shared request
        table.acquire_lock(&t1, &Lock::Shared, &pid(0)).unwrap();
        table.acquire_lock(&t1, &Lock::Exclusive, &pid(0)).unwrap();
    }

    #[test]
    fn test_upgrade_when_sole_holder() {
        let table = LockTable::new();
        table.set_timeout(10);
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        table.acquire_lock(&t1, &Lock::Shared, &pid(0)).unwrap();
        table.acquire_lock(&t1, &Lock::Exclusive, &pid(0)).unwrap();

        // the upgrade holds: others are shut out until release
        assert!(table.acquire_lock(&t2, &Lock::Shared, &pid(0)).is_err());

        table.release_all(&t1);
        table.acquire_lock(&t2, &Lock::Shared, &pid(0)).unwrap();
    }

    #[test]
    fn test_upgrade_denied_with_other_holders() {
        let table = LockTable::new();
        table.set_timeout(10);
        let t1 = Transaction::new();
        let t2 = Transaction::new();

        table.acquire_lock(&t1, &Lock::Shared, &pid(0)).unwrap();
        table.acquire_lock(&t2, &Lock::Shared, &pid(0)).unwrap();
        assert!(table
            .acquire_lock(&t1, &Lock::Exclusive, &pid(0))
            .is_err());
    }

    #[test]
    fn test_release_all() {
        let table = LockTable::new();
        table.set_timeout(10);
        let t1 = Transaction::new();

        table.acquire_lock(&t1, &Lock::Shared, &pid(0)).unwrap();
        table.acquire_lock(&t1, &Lock::Exclusive, &pid(1)).unwrap();
        assert_eq!(table.held_pages(&t1).len(), 2);

        table.release_all(&t1);
        assert!(!table.holds_lock(&t1, &pid(0)));
        assert!(!table.holds_lock(&t1, &pid(1)));
        assert!(table.held_pages(&t1).is_empty());
    }
}
