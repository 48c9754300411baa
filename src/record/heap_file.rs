use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::error::{RecordError, RecordResult};
use super::page::HeapPage;
use super::schema::TupleDesc;
use super::tuple::Tuple;
use crate::file::{BufferManager, FileError, FileResult, PAGE_SIZE, PageHandle, PageId, TableId};
use crate::tx::{Permission, TransactionId};

static NEXT_TABLE_ID: AtomicU32 = AtomicU32::new(1);

/// Heap file: an unordered collection of slotted pages backed by one
/// on-disk file. Page `n` lives at byte offset `n * PAGE_SIZE`.
///
/// Raw page reads and writes go straight to the file and are only used
/// by the buffer pool (and by the append path, which writes a fresh
/// empty page while holding the file lock). Tuple-level operations go
/// through the buffer pool so that caching and locking apply.
pub struct HeapFile {
    id: TableId,
    desc: TupleDesc,
    file: Mutex<File>,
}

impl HeapFile {
    /// Open (or create) the backing file for a table
    pub fn open<P: AsRef<Path>>(path: P, desc: TupleDesc) -> FileResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            desc,
            file: Mutex::new(file),
        })
    }

    /// Unique id of the table this file stores
    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// Number of whole pages currently in the file
    pub fn num_pages(&self) -> FileResult<usize> {
        let file = self.file.lock();
        let len = file.metadata()?.len() as usize;
        Ok(len / PAGE_SIZE)
    }

    /// Read a page straight from disk. `None` if the page is beyond the
    /// end of the file. A partial trailing page is zero-padded.
    pub fn read_page(&self, pid: PageId) -> FileResult<Option<HeapPage>> {
        let mut file = self.file.lock();
        let len = file.metadata()?.len() as usize;
        let offset = pid.page_no * PAGE_SIZE;
        if offset >= len {
            return Ok(None);
        }

        let available = (len - offset).min(PAGE_SIZE);
        let mut buf = vec![0u8; available];
        file.seek(SeekFrom::Start(offset as u64))?;
        file.read_exact(&mut buf)?;
        Ok(Some(HeapPage::from_bytes(pid, buf, self.desc.clone())))
    }

    /// Write a page's bytes to its slot in the file, extending the file
    /// if the page lies past the current end
    pub fn write_page(&self, page: &HeapPage) -> FileResult<()> {
        let mut file = self.file.lock();
        let offset = (page.id().page_no * PAGE_SIZE) as u64;
        let len = file.metadata()?.len();
        if offset > len {
            file.set_len(offset)?;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(page.bytes())?;
        Ok(())
    }

    /// Flush file contents to stable storage
    pub fn sync(&self) -> FileResult<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    /// Insert a tuple into the first page with a free slot, appending a
    /// new page when every existing page is full. Returns the handles of
    /// pages modified so the caller can mark them dirty.
    ///
    /// Pages are probed under a shared lock that is released if the page
    /// turns out full, so a scan over a large file does not pin every
    /// page exclusively. A page that looked free is re-acquired with
    /// write permission; another transaction may fill it in between, in
    /// which case the scan moves on.
    pub fn insert_tuple(
        &self,
        pool: &BufferManager,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> RecordResult<Vec<PageHandle>> {
        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.id, page_no);
            let handle = pool.get_page(tid, pid, Permission::ReadOnly)?;
            let has_free = handle.read().empty_slot_count() > 0;
            if !has_free {
                pool.release_page(tid, pid);
                continue;
            }

            let handle = pool.get_page(tid, pid, Permission::ReadWrite)?;
            let insert_result = handle.write().insert_tuple(tuple);
            match insert_result {
                Ok(_) => return Ok(vec![handle]),
                // Lost the race for the last free slot
                Err(RecordError::PageFull(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        // Every page is full: append a fresh page under the file lock so
        // two transactions cannot create the same page number.
        let pid = self.append_empty_page(pool, tid)?;
        let handle = pool.get_page(tid, pid, Permission::ReadWrite)?;
        handle.write().insert_tuple(tuple)?;
        Ok(vec![handle])
    }

    fn append_empty_page(&self, pool: &BufferManager, tid: TransactionId) -> RecordResult<PageId> {
        let locks = pool.lock_manager();
        locks
            .acquire_file_exclusive(tid, self.id)
            .map_err(FileError::from)?;
        let result: FileResult<PageId> = (|| {
            let pid = PageId::new(self.id, self.num_pages()?);
            self.write_page(&HeapPage::empty(pid, self.desc.clone()))?;
            Ok(pid)
        })();
        locks.release_file(tid, self.id);
        Ok(result?)
    }

    /// Delete the tuple identified by `tuple`'s record id, going straight
    /// to the owning page. Returns the handles of pages modified; deleting
    /// an already-empty slot modifies nothing.
    pub fn delete_tuple(
        &self,
        pool: &BufferManager,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> RecordResult<Vec<PageHandle>> {
        let rid = tuple.record_id().ok_or(RecordError::MissingRecordId)?;
        let handle = pool.get_page(tid, rid.page_id, Permission::ReadWrite)?;
        let removed = handle.write().delete_tuple(rid)?;
        if removed {
            Ok(vec![handle])
        } else {
            Ok(Vec::new())
        }
    }

    /// Iterate every stored tuple in page order, then slot order. Pages
    /// are read through the buffer pool under shared locks held for the
    /// rest of the transaction.
    pub fn iter<'a>(&'a self, pool: &'a BufferManager, tid: TransactionId) -> HeapFileIterator<'a> {
        HeapFileIterator {
            file: self,
            pool,
            tid,
            page_no: 0,
            slot: 0,
            current: None,
        }
    }
}

/// Scans a heap file one page at a time. Empty slots are skipped; pages
/// past the end of the file end the scan.
pub struct HeapFileIterator<'a> {
    file: &'a HeapFile,
    pool: &'a BufferManager,
    tid: TransactionId,
    page_no: usize,
    slot: usize,
    current: Option<PageHandle>,
}

impl HeapFileIterator<'_> {
    /// Restart the scan from the first page
    pub fn rewind(&mut self) {
        self.page_no = 0;
        self.slot = 0;
        self.current = None;
    }

    fn next_tuple(&mut self) -> RecordResult<Option<Tuple>> {
        loop {
            let handle = match self.current.clone() {
                Some(handle) => handle,
                None => {
                    let pid = PageId::new(self.file.id(), self.page_no);
                    match self.pool.get_page(self.tid, pid, Permission::ReadOnly) {
                        Ok(handle) => {
                            self.slot = 0;
                            self.current = Some(handle.clone());
                            handle
                        }
                        Err(FileError::PageNotFound(_)) => return Ok(None),
                        Err(e) => return Err(e.into()),
                    }
                }
            };

            let page = handle.read();
            while self.slot < page.slot_count() {
                let slot = self.slot;
                self.slot += 1;
                if let Some(tuple) = page.tuple(slot)? {
                    return Ok(Some(tuple));
                }
            }

            drop(page);
            self.page_no += 1;
            self.current = None;
        }
    }
}

impl Iterator for HeapFileIterator<'_> {
    type Item = RecordResult<Tuple>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_tuple().transpose()
    }
}
