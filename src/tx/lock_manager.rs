use std::time::{Duration, Instant};

use ahash::{AHashMap, AHashSet};
use parking_lot::{Condvar, Mutex};

use super::{LockError, TransactionId};
use crate::file::{PageId, TableId};

/// Bound on a blocking lock wait before the requester is told to abort.
/// There is no deadlock detection; a circular wait resolves when one of
/// the parties times out and aborts.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-page lock state machine.
#[derive(Debug)]
enum PageLock {
    Unlocked,
    Shared(AHashSet<TransactionId>),
    Exclusive(TransactionId),
}

#[derive(Default)]
struct LockTables {
    /// Lock state per page. Entries are created lazily and kept once
    /// created; `Unlocked` means no holder.
    pages: AHashMap<PageId, PageLock>,
    /// Pages each transaction holds any lock on.
    pages_by_tid: AHashMap<TransactionId, AHashSet<PageId>>,
    /// Exclusive file-lock holder per table, used only during page append.
    files: AHashMap<TableId, Option<TransactionId>>,
    /// Files each transaction holds the exclusive file lock on.
    files_by_tid: AHashMap<TransactionId, AHashSet<TableId>>,
}

impl LockTables {
    /// Try to take a shared lock. Returns false if the caller must wait.
    fn try_shared(&mut self, tid: TransactionId, pid: PageId) -> bool {
        let state = self.pages.entry(pid).or_insert(PageLock::Unlocked);
        match state {
            PageLock::Unlocked => {
                let mut holders = AHashSet::new();
                holders.insert(tid);
                *state = PageLock::Shared(holders);
            }
            PageLock::Shared(holders) => {
                holders.insert(tid);
            }
            // A transaction holding the page exclusively is implicitly
            // allowed read access; no additional lock is taken.
            PageLock::Exclusive(owner) if *owner == tid => {}
            PageLock::Exclusive(_) => return false,
        }
        self.pages_by_tid.entry(tid).or_default().insert(pid);
        true
    }

    /// Try to take the exclusive lock. Returns false if the caller must
    /// wait. Upgrades in place when `tid` is the sole shared holder: no
    /// concurrent holder exists, so promoting cannot race.
    fn try_exclusive(&mut self, tid: TransactionId, pid: PageId) -> bool {
        let state = self.pages.entry(pid).or_insert(PageLock::Unlocked);
        let can_take = match state {
            PageLock::Unlocked => true,
            PageLock::Exclusive(owner) => *owner == tid,
            PageLock::Shared(holders) => {
                holders.is_empty() || (holders.len() == 1 && holders.contains(&tid))
            }
        };
        if !can_take {
            return false;
        }
        *state = PageLock::Exclusive(tid);
        self.pages_by_tid.entry(tid).or_default().insert(pid);
        true
    }

    /// Try to take the per-file exclusive lock. Reentrant for the holder.
    fn try_file_exclusive(&mut self, tid: TransactionId, table_id: TableId) -> bool {
        let holder = self.files.entry(table_id).or_insert(None);
        match holder {
            None => {
                *holder = Some(tid);
            }
            Some(owner) if *owner == tid => {}
            Some(_) => return false,
        }
        self.files_by_tid.entry(tid).or_default().insert(table_id);
        true
    }

    fn release_page(&mut self, tid: TransactionId, pid: PageId) {
        if let Some(state) = self.pages.get_mut(&pid) {
            match state {
                PageLock::Exclusive(owner) if *owner == tid => {
                    *state = PageLock::Unlocked;
                }
                PageLock::Shared(holders) => {
                    holders.remove(&tid);
                    if holders.is_empty() {
                        *state = PageLock::Unlocked;
                    }
                }
                _ => {}
            }
        }
        if let Some(pids) = self.pages_by_tid.get_mut(&tid) {
            pids.remove(&pid);
        }
    }

    fn release_file(&mut self, tid: TransactionId, table_id: TableId) {
        if let Some(holder) = self.files.get_mut(&table_id)
            && *holder == Some(tid)
        {
            *holder = None;
        }
        if let Some(tables) = self.files_by_tid.get_mut(&tid) {
            tables.remove(&table_id);
        }
    }
}

/// Strict two-phase lock manager over PageId-keyed reader/writer locks,
/// plus per-file exclusive locks that serialize page appends.
///
/// All bookkeeping lives behind one mutex so that "check holder set, then
/// take or upgrade" is atomic; blocked acquisitions park on a condvar and
/// are woken by any release. Each instance is independent, so multiple
/// buffer pools can run side by side.
pub struct LockManager {
    tables: Mutex<LockTables>,
    released: Condvar,
    timeout: Duration,
}

impl LockManager {
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_ACQUIRE_TIMEOUT)
    }

    /// A lock manager whose blocking acquisitions give up after `timeout`
    /// and signal the requester to abort.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            tables: Mutex::new(LockTables::default()),
            released: Condvar::new(),
            timeout,
        }
    }

    /// Block until `tid` may read `pid`: no other transaction holds the
    /// exclusive lock, or `tid` itself does.
    pub fn acquire_shared(&self, tid: TransactionId, pid: PageId) -> Result<(), LockError> {
        let deadline = Instant::now() + self.timeout;
        let mut tables = self.tables.lock();
        while !tables.try_shared(tid, pid) {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::PageWaitTimeout { tid, pid });
            }
            self.released.wait_for(&mut tables, deadline - now);
        }
        Ok(())
    }

    /// Block until `tid` owns `pid` exclusively. A sole shared holder is
    /// upgraded in place without releasing first.
    pub fn acquire_exclusive(&self, tid: TransactionId, pid: PageId) -> Result<(), LockError> {
        let deadline = Instant::now() + self.timeout;
        let mut tables = self.tables.lock();
        while !tables.try_exclusive(tid, pid) {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::PageWaitTimeout { tid, pid });
            }
            self.released.wait_for(&mut tables, deadline - now);
        }
        Ok(())
    }

    /// Block until `tid` holds the exclusive file lock for `table_id`.
    /// Independent of the per-page lock table.
    pub fn acquire_file_exclusive(
        &self,
        tid: TransactionId,
        table_id: TableId,
    ) -> Result<(), LockError> {
        let deadline = Instant::now() + self.timeout;
        let mut tables = self.tables.lock();
        while !tables.try_file_exclusive(tid, table_id) {
            let now = Instant::now();
            if now >= deadline {
                return Err(LockError::FileWaitTimeout { tid, table_id });
            }
            self.released.wait_for(&mut tables, deadline - now);
        }
        Ok(())
    }

    /// Release whichever page lock `tid` holds on `pid` (no-op if none).
    /// Releasing mid-transaction breaks strict two-phase locking; only
    /// call this where the two-phase guarantee is not required.
    pub fn release(&self, tid: TransactionId, pid: PageId) {
        self.tables.lock().release_page(tid, pid);
        self.released.notify_all();
    }

    /// Release the exclusive file lock if `tid` holds it.
    pub fn release_file(&self, tid: TransactionId, table_id: TableId) {
        self.tables.lock().release_file(tid, table_id);
        self.released.notify_all();
    }

    /// True iff `tid` holds any (shared or exclusive) lock on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        match self.tables.lock().pages.get(&pid) {
            Some(PageLock::Shared(holders)) => holders.contains(&tid),
            Some(PageLock::Exclusive(owner)) => *owner == tid,
            _ => false,
        }
    }

    /// Release every page and file lock `tid` holds and erase it from the
    /// bookkeeping. The only release path for a transaction boundary.
    pub fn complete_transaction(&self, tid: TransactionId) {
        let mut tables = self.tables.lock();
        let t = &mut *tables;
        if let Some(pids) = t.pages_by_tid.remove(&tid) {
            for pid in pids {
                if let Some(state) = t.pages.get_mut(&pid) {
                    match state {
                        PageLock::Exclusive(owner) if *owner == tid => {
                            *state = PageLock::Unlocked;
                        }
                        PageLock::Shared(holders) => {
                            holders.remove(&tid);
                            if holders.is_empty() {
                                *state = PageLock::Unlocked;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        if let Some(table_ids) = t.files_by_tid.remove(&tid) {
            for table_id in table_ids {
                if let Some(holder) = t.files.get_mut(&table_id)
                    && *holder == Some(tid)
                {
                    *holder = None;
                }
            }
        }
        drop(tables);
        self.released.notify_all();
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    fn pid(page_no: usize) -> PageId {
        PageId::new(7, page_no)
    }

    #[test]
    fn test_shared_allows_concurrent_readers() {
        let lm = LockManager::new();
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_shared(t2, pid(0)).unwrap();

        assert!(lm.holds_lock(t1, pid(0)));
        assert!(lm.holds_lock(t2, pid(0)));
    }

    #[test]
    fn test_exclusive_blocks_shared_until_complete() {
        let lm = Arc::new(LockManager::new());
        let (t1, t2) = (TransactionId::new(), TransactionId::new());
        let counter = Arc::new(AtomicU64::new(0));

        lm.acquire_exclusive(t1, pid(0)).unwrap();

        let lm2 = lm.clone();
        let c = counter.clone();
        let reader = thread::spawn(move || {
            lm2.acquire_shared(t2, pid(0)).unwrap();
            // By the time we get the lock, the writer must have finished
            assert!(c.load(Ordering::SeqCst) >= 2);
        });

        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        counter.fetch_add(1, Ordering::SeqCst);
        lm.complete_transaction(t1);

        reader.join().unwrap();
        assert!(!lm.holds_lock(t1, pid(0)));
        assert!(lm.holds_lock(t2, pid(0)));
    }

    #[test]
    fn test_exclusive_mutual_exclusion() {
        let lm = Arc::new(LockManager::new());
        let counter = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lm = lm.clone();
                let c = counter.clone();
                thread::spawn(move || {
                    let tid = TransactionId::new();
                    lm.acquire_exclusive(tid, pid(0)).unwrap();
                    // Only one writer may be between these two increments
                    let seen = c.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(seen % 2, 0);
                    thread::sleep(Duration::from_millis(5));
                    c.fetch_add(1, Ordering::SeqCst);
                    lm.complete_transaction(tid);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_upgrade_does_not_self_block() {
        // A short timeout would surface any accidental self-deadlock
        let lm = LockManager::with_timeout(Duration::from_millis(100));
        let tid = TransactionId::new();

        lm.acquire_shared(tid, pid(0)).unwrap();
        lm.acquire_exclusive(tid, pid(0)).unwrap();
        assert!(lm.holds_lock(tid, pid(0)));
    }

    #[test]
    fn test_upgrade_blocked_by_other_reader() {
        let lm = LockManager::with_timeout(Duration::from_millis(50));
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_shared(t2, pid(0)).unwrap();

        let result = lm.acquire_exclusive(t1, pid(0));
        assert!(matches!(result, Err(LockError::PageWaitTimeout { .. })));
    }

    #[test]
    fn test_shared_after_own_exclusive_is_noop() {
        let lm = LockManager::with_timeout(Duration::from_millis(100));
        let tid = TransactionId::new();

        lm.acquire_exclusive(tid, pid(0)).unwrap();
        lm.acquire_shared(tid, pid(0)).unwrap();
        assert!(lm.holds_lock(tid, pid(0)));

        // Still exclusively held: another reader must wait
        let other = TransactionId::new();
        assert!(lm.acquire_shared(other, pid(0)).is_err());
    }

    #[test]
    fn test_timeout_signals_abort() {
        let lm = LockManager::with_timeout(Duration::from_millis(50));
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_exclusive(t1, pid(0)).unwrap();
        let result = lm.acquire_exclusive(t2, pid(0));
        assert!(matches!(
            result,
            Err(LockError::PageWaitTimeout { tid, .. }) if tid == t2
        ));
    }

    #[test]
    fn test_release_unblocks_waiter() {
        let lm = Arc::new(LockManager::new());
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_shared(t1, pid(0)).unwrap();

        let lm2 = lm.clone();
        let writer = thread::spawn(move || {
            lm2.acquire_exclusive(t2, pid(0)).unwrap();
            lm2.complete_transaction(t2);
        });

        thread::sleep(Duration::from_millis(20));
        lm.release(t1, pid(0));
        writer.join().unwrap();
        assert!(!lm.holds_lock(t1, pid(0)));
    }

    #[test]
    fn test_release_without_lock_is_noop() {
        let lm = LockManager::new();
        let tid = TransactionId::new();
        lm.release(tid, pid(3));
        assert!(!lm.holds_lock(tid, pid(3)));
    }

    #[test]
    fn test_file_lock_serializes_appenders() {
        let lm = LockManager::with_timeout(Duration::from_millis(50));
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_file_exclusive(t1, 7).unwrap();
        // Reentrant for the holder
        lm.acquire_file_exclusive(t1, 7).unwrap();

        let result = lm.acquire_file_exclusive(t2, 7);
        assert!(matches!(result, Err(LockError::FileWaitTimeout { .. })));

        lm.release_file(t1, 7);
        lm.acquire_file_exclusive(t2, 7).unwrap();
    }

    #[test]
    fn test_complete_transaction_releases_everything() {
        let lm = LockManager::with_timeout(Duration::from_millis(100));
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_shared(t1, pid(0)).unwrap();
        lm.acquire_exclusive(t1, pid(1)).unwrap();
        lm.acquire_file_exclusive(t1, 7).unwrap();

        lm.complete_transaction(t1);

        assert!(!lm.holds_lock(t1, pid(0)));
        assert!(!lm.holds_lock(t1, pid(1)));
        lm.acquire_exclusive(t2, pid(0)).unwrap();
        lm.acquire_exclusive(t2, pid(1)).unwrap();
        lm.acquire_file_exclusive(t2, 7).unwrap();
    }

    #[test]
    fn test_disjoint_pages_proceed_in_parallel() {
        let lm = LockManager::with_timeout(Duration::from_millis(100));
        let (t1, t2) = (TransactionId::new(), TransactionId::new());

        lm.acquire_exclusive(t1, pid(0)).unwrap();
        lm.acquire_exclusive(t2, pid(1)).unwrap();

        assert!(lm.holds_lock(t1, pid(0)));
        assert!(lm.holds_lock(t2, pid(1)));
    }
}
