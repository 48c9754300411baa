use super::error::{RecordError, RecordResult};
use super::schema::TupleDesc;
use super::tuple::{RecordId, SlotId, Tuple};
use crate::file::{PAGE_SIZE, PageId};
use crate::tx::TransactionId;

/// In-memory copy of one disk page: a slot-occupancy bitmap header
/// followed by a fixed number of fixed-width tuple slots.
///
/// The page tracks which transaction last dirtied it and keeps a
/// before-image of its bytes as of the last load or flush. A page is
/// owned by the buffer pool; callers mutate it only through a pool
/// handle while holding the exclusive page lock.
pub struct HeapPage {
    pid: PageId,
    desc: TupleDesc,
    data: Box<[u8]>,
    before_image: Box<[u8]>,
    dirtier: Option<TransactionId>,
}

impl HeapPage {
    /// Number of tuple slots a page holds for the given layout:
    /// each slot costs its tuple width plus one bitmap bit.
    pub fn slots_per_page(desc: &TupleDesc) -> usize {
        (PAGE_SIZE * 8) / (desc.tuple_size() * 8 + 1)
    }

    /// Bitmap header size in bytes for the given layout
    pub fn header_size(desc: &TupleDesc) -> usize {
        Self::slots_per_page(desc).div_ceil(8)
    }

    /// A freshly initialized empty page (all slots free, all bytes zero)
    pub fn empty(pid: PageId, desc: TupleDesc) -> Self {
        Self::from_bytes(pid, vec![0u8; PAGE_SIZE], desc)
    }

    /// Decode a page from its on-disk bytes. Short buffers are padded
    /// with zeros to a full page (the file's last page may be partial).
    pub fn from_bytes(pid: PageId, mut data: Vec<u8>, desc: TupleDesc) -> Self {
        data.resize(PAGE_SIZE, 0);
        let data = data.into_boxed_slice();
        let before_image = data.clone();
        Self {
            pid,
            desc,
            data,
            before_image,
            dirtier: None,
        }
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.desc
    }

    /// On-disk byte layout of the page
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// The page's bytes as of the last load or flush
    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Snapshot the current bytes as the new before-image
    pub fn set_before_image(&mut self) {
        self.before_image.copy_from_slice(&self.data);
    }

    /// The transaction that last dirtied this page, if it is dirty
    pub fn dirtier(&self) -> Option<TransactionId> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    /// Mark the page dirty on behalf of a transaction, or clean
    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtier = dirtier;
    }

    /// Get the number of slots in this page
    pub fn slot_count(&self) -> usize {
        Self::slots_per_page(&self.desc)
    }

    /// Check if a slot is used
    pub fn is_slot_used(&self, slot: SlotId) -> bool {
        if slot >= self.slot_count() {
            return false;
        }
        let byte_idx = slot / 8;
        let bit_idx = slot % 8;
        (self.data[byte_idx] & (1 << bit_idx)) != 0
    }

    /// Get the number of free slots
    pub fn empty_slot_count(&self) -> usize {
        (0..self.slot_count())
            .filter(|&slot| !self.is_slot_used(slot))
            .count()
    }

    /// Byte offset of a slot's tuple data within the page
    fn slot_offset(&self, slot: SlotId) -> usize {
        Self::header_size(&self.desc) + slot * self.desc.tuple_size()
    }

    fn set_slot_bit(&mut self, slot: SlotId, used: bool) {
        let byte_idx = slot / 8;
        let bit_idx = slot % 8;
        if used {
            self.data[byte_idx] |= 1 << bit_idx;
        } else {
            self.data[byte_idx] &= !(1 << bit_idx);
        }
    }

    /// Insert a tuple into the first free slot, assigning its record id.
    /// Fails with `PageFull` if no slot is free.
    pub fn insert_tuple(&mut self, tuple: &mut Tuple) -> RecordResult<SlotId> {
        let bytes = tuple.serialize(&self.desc)?;
        let slot = (0..self.slot_count())
            .find(|&slot| !self.is_slot_used(slot))
            .ok_or(RecordError::PageFull(self.pid))?;

        let start = self.slot_offset(slot);
        self.data[start..start + bytes.len()].copy_from_slice(&bytes);
        self.set_slot_bit(slot, true);
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        Ok(slot)
    }

    /// Clear the slot named by a record id. Returns whether the slot was
    /// actually occupied; clearing a free slot is a no-op.
    pub fn delete_tuple(&mut self, rid: RecordId) -> RecordResult<bool> {
        if rid.page_id != self.pid || rid.slot >= self.slot_count() {
            return Err(RecordError::InvalidSlot(rid.page_id, rid.slot));
        }
        if !self.is_slot_used(rid.slot) {
            return Ok(false);
        }
        self.set_slot_bit(rid.slot, false);
        Ok(true)
    }

    /// Decode the tuple stored in a slot; `None` if the slot is out of
    /// range or free.
    pub fn tuple(&self, slot: SlotId) -> RecordResult<Option<Tuple>> {
        if slot >= self.slot_count() || !self.is_slot_used(slot) {
            return Ok(None);
        }
        let start = self.slot_offset(slot);
        let end = start + self.desc.tuple_size();
        let mut tuple = Tuple::deserialize(&self.data[start..end], &self.desc)?;
        tuple.set_record_id(Some(RecordId::new(self.pid, slot)));
        Ok(Some(tuple))
    }
}
