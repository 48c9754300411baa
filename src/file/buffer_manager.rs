use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Mutex, RwLock};

use super::{BUFFER_POOL_SIZE, FileError, FileResult, PageId};
use crate::catalog::Catalog;
use crate::record::{HeapPage, RecordResult, Tuple};
use crate::tx::{LockManager, Permission, TransactionId};

/// Lease on a cached page. The pool owns the cache entry; the handle
/// keeps the page alive across eviction and lets the holder read or
/// mutate it under the page's own reader/writer lock. The transaction's
/// page lock (taken in `get_page`) is what makes that mutation safe.
pub type PageHandle = Arc<RwLock<HeapPage>>;

/// Bounded page cache in front of the heap files, with strict two-phase
/// locking on every access.
///
/// Eviction is no-steal: only clean pages leave the cache, dirty pages
/// are pinned in memory until their transaction commits (flush) or
/// aborts (reload from disk). When every cached page is dirty the pool
/// is full and the request fails.
///
/// The LRU cache is created unbounded and the capacity is enforced by
/// hand in `get_page`, since the cache's own bounded mode drops the
/// least-recently-used entry unconditionally on insert.
pub struct BufferManager {
    catalog: Arc<Catalog>,
    lock_manager: Arc<LockManager>,
    pool: Mutex<LruCache<PageId, PageHandle>>,
    capacity: usize,
}

impl BufferManager {
    pub fn new(catalog: Arc<Catalog>, lock_manager: Arc<LockManager>) -> Self {
        Self::with_capacity(catalog, lock_manager, BUFFER_POOL_SIZE)
    }

    /// A pool holding at most `capacity` pages
    pub fn with_capacity(
        catalog: Arc<Catalog>,
        lock_manager: Arc<LockManager>,
        capacity: usize,
    ) -> Self {
        Self {
            catalog,
            lock_manager,
            pool: Mutex::new(LruCache::unbounded()),
            capacity,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Fetch a page on behalf of a transaction, blocking until the lock
    /// matching `perm` is granted. Serves from cache when possible,
    /// otherwise loads from the backing heap file, evicting a clean page
    /// first if the pool is at capacity.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permission,
    ) -> FileResult<PageHandle> {
        match perm {
            Permission::ReadOnly => self.lock_manager.acquire_shared(tid, pid)?,
            Permission::ReadWrite => self.lock_manager.acquire_exclusive(tid, pid)?,
        }

        let mut pool = self.pool.lock();
        if let Some(handle) = pool.get(&pid) {
            return Ok(handle.clone());
        }

        if pool.len() >= self.capacity {
            Self::evict(&mut pool)?;
        }

        let file = self
            .catalog
            .table(pid.table_id)
            .ok_or(FileError::UnknownTable(pid.table_id))?;
        let page = file.read_page(pid)?.ok_or(FileError::PageNotFound(pid))?;
        let handle: PageHandle = Arc::new(RwLock::new(page));
        pool.put(pid, handle.clone());
        Ok(handle)
    }

    /// Drop the least recently used clean page. Fails when every cached
    /// page is dirty: under no-steal none of them may be written out or
    /// discarded here.
    fn evict(pool: &mut LruCache<PageId, PageHandle>) -> FileResult<()> {
        let pids: Vec<PageId> = pool.iter().map(|(pid, _)| *pid).collect();
        // iter() runs most-recent-first; scan from the LRU end
        for pid in pids.into_iter().rev() {
            let clean = pool
                .peek(&pid)
                .map(|handle| !handle.read().is_dirty())
                .unwrap_or(false);
            if clean {
                pool.pop(&pid);
                return Ok(());
            }
        }
        Err(FileError::BufferPoolFull)
    }

    /// Release the page lock `tid` holds on `pid` before the transaction
    /// ends. Breaks strict two-phase locking; used only for probe-style
    /// access where the page was read but nothing was decided from it.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    /// True iff `tid` holds any lock on `pid`
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Finish a transaction. On commit, every cached page `tid` dirtied
    /// is flushed before any lock is released. On abort, every dirty
    /// cached page is reloaded from disk in place, discarding in-memory
    /// mutations. Either way the transaction's locks are then released
    /// in bulk.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> FileResult<()> {
        let entries: Vec<(PageId, PageHandle)> = {
            let pool = self.pool.lock();
            pool.iter().map(|(pid, h)| (*pid, h.clone())).collect()
        };

        for (pid, handle) in entries {
            if commit {
                if handle.read().dirtier() == Some(tid) {
                    self.flush_handle(pid, &handle)?;
                }
            } else if handle.read().is_dirty() {
                let file = self
                    .catalog
                    .table(pid.table_id)
                    .ok_or(FileError::UnknownTable(pid.table_id))?;
                let fresh = file.read_page(pid)?.ok_or(FileError::PageNotFound(pid))?;
                *handle.write() = fresh;
            }
        }

        self.lock_manager.complete_transaction(tid);
        Ok(())
    }

    /// Write one page through to its heap file. The page is marked clean
    /// only after the write succeeds, so a failed flush never leaves a
    /// stale page cached as clean.
    fn flush_handle(&self, pid: PageId, handle: &PageHandle) -> FileResult<()> {
        let file = self
            .catalog
            .table(pid.table_id)
            .ok_or(FileError::UnknownTable(pid.table_id))?;
        let mut page = handle.write();
        file.write_page(&page)?;
        page.mark_dirty(None);
        page.set_before_image();
        Ok(())
    }

    /// Write every dirty cached page to disk and sync the touched files.
    /// Shutdown use only: this writes pages belonging to uncommitted
    /// transactions, side-stepping no-steal, and must not be mixed with
    /// abort recovery.
    pub fn flush_all_pages(&self) -> FileResult<()> {
        let entries: Vec<(PageId, PageHandle)> = {
            let pool = self.pool.lock();
            pool.iter().map(|(pid, h)| (*pid, h.clone())).collect()
        };

        let mut touched_tables = Vec::new();
        for (pid, handle) in entries {
            if handle.read().is_dirty() {
                self.flush_handle(pid, &handle)?;
                if !touched_tables.contains(&pid.table_id) {
                    touched_tables.push(pid.table_id);
                }
            }
        }
        for table_id in touched_tables {
            if let Some(file) = self.catalog.table(table_id) {
                file.sync()?;
            }
        }
        Ok(())
    }

    /// Drop a page from the cache without flushing, dirty or not. For
    /// pages whose identity has become invalid.
    pub fn discard_page(&self, pid: PageId) {
        self.pool.lock().pop(&pid);
    }

    /// Insert a tuple into a table on behalf of `tid`, marking every
    /// modified page dirty. The tuple's record id is set on success.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: super::TableId,
        tuple: &mut Tuple,
    ) -> RecordResult<()> {
        let file = self
            .catalog
            .table(table_id)
            .ok_or(FileError::UnknownTable(table_id))?;
        let touched = file.insert_tuple(self, tid, tuple)?;
        for handle in touched {
            handle.write().mark_dirty(Some(tid));
        }
        Ok(())
    }

    /// Delete a stored tuple on behalf of `tid`, marking every modified
    /// page dirty. Deleting an already-deleted tuple modifies nothing.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> RecordResult<()> {
        let rid = tuple
            .record_id()
            .ok_or(crate::record::RecordError::MissingRecordId)?;
        let file = self
            .catalog
            .table(rid.page_id.table_id)
            .ok_or(FileError::UnknownTable(rid.page_id.table_id))?;
        let touched = file.delete_tuple(self, tid, tuple)?;
        for handle in touched {
            handle.write().mark_dirty(Some(tid));
        }
        Ok(())
    }

    #[cfg(test)]
    fn cached_page_count(&self) -> usize {
        self.pool.lock().len()
    }

    #[cfg(test)]
    fn is_page_cached(&self, pid: PageId) -> bool {
        self.pool.lock().contains(&pid)
    }

    #[cfg(test)]
    fn dirty_page_count(&self) -> usize {
        self.pool
            .lock()
            .iter()
            .filter(|(_, h)| h.read().is_dirty())
            .count()
    }
}
