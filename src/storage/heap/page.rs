use std::io::Cursor;

use bit_vec::BitVec;

use crate::{
    buffer_pool::BufferPool,
    error::{DbError, DbResult},
    io::ByteWriter,
    storage::{
        heap::{HeapPageID, RecordId},
        schema::Schema,
        tuple::Tuple,
    },
    transaction::TransactionID,
    types::Pod,
};

/// One fixed-size page of a heap table.
///
/// Layout: a header of `ceil(slots / 8)` bytes where bit *i* marks slot
/// *i* occupied, followed by `slots` tuple bodies, zero-padded to the
/// page size.
#[derive(Debug)]
pub struct HeapPage {
    pid: HeapPageID,

    schema: Schema,

    pub slot_count: usize,

    // indicate slots' status: true means occupied, false means empty
    header: BitVec,

    // all tuples (include empty slots, which hold stale bytes)
    tuples: Vec<Tuple>,

    // the transaction that last dirtied this page, if any
    dirtier: Option<TransactionID>,

    // page bytes as of the most recent load or commit; what an abort
    // rolls back to
    before_image: Vec<u8>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Schema) -> DbResult<Self> {
        let page_size = BufferPool::get_page_size();
        if bytes.len() != page_size {
            return Err(DbError::Storage(format!(
                "page {} has {} bytes, expect {}",
                pid,
                bytes.len(),
                page_size
            )));
        }

        let slot_count = Self::calculate_slots_count(schema);
        let header_size = Self::calculate_header_size(slot_count);
        let tuple_size = schema.get_size();

        let header = BitVec::from_bytes(&bytes[..header_size]);

        let mut tuples = Vec::with_capacity(slot_count);
        for i in 0..slot_count {
            let start = header_size + i * tuple_size;
            let mut reader = Cursor::new(&bytes[start..start + tuple_size]);
            let mut tuple = Tuple::read_from(&mut reader, schema);
            tuple.set_rid(Some(RecordId::new(*pid, i)));
            tuples.push(tuple);
        }

        Ok(Self {
            pid: *pid,
            schema: schema.clone(),
            slot_count,
            header,
            tuples,
            dirtier: None,
            before_image: bytes.to_vec(),
        })
    }

    pub fn new_empty(pid: &HeapPageID, schema: &Schema) -> DbResult<Self> {
        Self::new(pid, &empty_page_data(), schema)
    }

    /// Number of tuples a page can hold under the given schema.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let bits_per_tuple_including_header = schema.get_size() * 8 + 1;
        BufferPool::get_page_size() * 8 / bits_per_tuple_including_header
    }

    /// Header bytes needed for `slot_count` occupancy bits.
    pub fn calculate_header_size(slot_count: usize) -> usize {
        (slot_count + 7) / 8
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    pub fn get_slots_count(&self) -> usize {
        self.slot_count
    }

    pub fn empty_slots_count(&self) -> usize {
        (0..self.slot_count)
            .filter(|&i| !self.is_slot_used(i))
            .count()
    }

    /// Returns the number of tuples currently stored on this page
    pub fn tuples_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    pub fn is_slot_used(&self, slot_index: usize) -> bool {
        self.header[slot_index]
    }

    fn mark_slot_status(&mut self, slot_index: usize, used: bool) {
        self.header.set(slot_index, used);
    }

    /// Place the tuple in the first empty slot and stamp its record id.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> DbResult<RecordId> {
        if !tuple.conforms_to(&self.schema) {
            return Err(DbError::Storage(format!(
                "tuple {} does not conform to the table schema",
                tuple
            )));
        }

        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                let rid = RecordId::new(self.pid, i);
                let mut stored = tuple.clone();
                stored.set_rid(Some(rid));
                self.tuples[i] = stored;
                self.mark_slot_status(i, true);
                return Ok(rid);
            }
        }

        Err(DbError::Storage(format!("page {} is full", self.pid)))
    }

    /// Clear the slot named by the record id. The id must point at this
    /// page and at an occupied slot.
    pub fn delete_tuple(&mut self, rid: &RecordId) -> DbResult<()> {
        if rid.pid != self.pid {
            return Err(DbError::Storage(format!(
                "record {} does not live on page {}",
                rid, self.pid
            )));
        }
        if rid.slot >= self.slot_count || !self.is_slot_used(rid.slot) {
            return Err(DbError::Storage(format!("slot {} is not occupied", rid.slot)));
        }

        self.tuples[rid.slot].set_rid(None);
        self.mark_slot_status(rid.slot, false);
        Ok(())
    }

    pub fn get_tuple(&self, slot_index: usize) -> Option<Tuple> {
        if self.is_slot_used(slot_index) {
            return Some(self.tuples[slot_index].clone());
        }
        None
    }

    /// The canonical byte image of this page.
    pub fn get_page_data(&self) -> Vec<u8> {
        let mut writer = ByteWriter::new();
        writer.write_bytes(&self.header.to_bytes());
        for i in 0..self.slot_count {
            writer.write_bytes(&self.tuples[i].to_bytes(&self.schema));
        }
        writer.to_padded_bytes(BufferPool::get_page_size())
    }

    pub fn set_dirty(&mut self, dirtier: Option<TransactionID>) {
        self.dirtier = dirtier;
    }

    pub fn dirtier(&self) -> Option<TransactionID> {
        self.dirtier
    }

    pub fn is_dirty(&self) -> bool {
        self.dirtier.is_some()
    }

    pub fn set_before_image(&mut self) {
        self.before_image = self.get_page_data();
    }

    pub fn get_before_image(&self) -> Vec<u8> {
        self.before_image.clone()
    }
}

pub fn empty_page_data() -> Vec<u8> {
    vec![0; BufferPool::get_page_size()]
}

/// Iterates the occupied slots of a borrowed page in slot order.
pub struct HeapPageIterator<'page> {
    page: &'page HeapPage,
    cursor: usize,
}

impl<'page> HeapPageIterator<'page> {
    pub fn new(page: &'page HeapPage) -> Self {
        Self { page, cursor: 0 }
    }
}

impl<'page> Iterator for HeapPageIterator<'page> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.page.slot_count {
            let cursor = self.cursor;
            self.cursor += 1;

            if self.page.is_slot_used(cursor) {
                return Some(self.page.tuples[cursor].clone());
            }
        }
        None
    }
}

/// Same iteration over a shared page handle; takes the read lock per
/// step so the page is not pinned for the whole scan.
pub struct HeapPageIteratorRc {
    page: Pod<HeapPage>,
    cursor: usize,
}

impl HeapPageIteratorRc {
    pub fn new(page: Pod<HeapPage>) -> Self {
        Self { page, cursor: 0 }
    }
}

impl Iterator for HeapPageIteratorRc {
    type Item = Tuple;

    fn next(&mut self) -> Option<Self::Item> {
        let page = self.page.read().unwrap();
        while self.cursor < page.slot_count {
            let cursor = self.cursor;
            self.cursor += 1;

            if page.is_slot_used(cursor) {
                return Some(page.tuples[cursor].clone());
            }
        }
        None
    }
}
