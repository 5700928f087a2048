use core::fmt;
use std::{
    collections::hash_map::DefaultHasher,
    fs::{File, OpenOptions},
    hash::{Hash, Hasher},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    database::Database,
    error::{DbError, DbResult},
    storage::{
        heap::{
            page::{empty_page_data, HeapPageIteratorRc},
            HeapPageID,
        },
        schema::Schema,
        tuple::Tuple,
    },
    transaction::{Permission, Transaction},
    utils::HandyRwLock,
};

/// An unordered collection of tuples of one schema, stored as a
/// sequence of fixed-size pages in a single file. All page access goes
/// through the buffer pool; the only direct write this file performs on
/// its own is appending a fresh empty page.
pub struct HeapTable {
    pub name: String,

    // the tuple descriptor of tuples in the file
    pub schema: Schema,

    file: Mutex<File>,

    file_path: PathBuf,

    table_id: u32,
}

impl fmt::Display for HeapTable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "<HeapTable, file: {:?}, id: {}>",
            self.file_path, self.table_id
        )
    }
}

impl HeapTable {
    pub fn new<P: AsRef<Path>>(file_path: P, name: &str, schema: &Schema) -> DbResult<Self> {
        let f = Mutex::new(
            OpenOptions::new()
                .write(true)
                .read(true)
                .create(true)
                .open(&file_path)?,
        );

        // The id is a hash of the canonical path alone, so page ids
        // stay stable across restarts.
        let canonical = file_path.as_ref().canonicalize()?;
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Ok(Self {
            name: name.to_string(),
            schema: schema.clone(),
            file: f,
            file_path: canonical,
            table_id,
        })
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn get_file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    /// Number of pages in the backing file.
    pub fn pages_count(&self) -> usize {
        let page_size = BufferPool::get_page_size();
        let len = self.get_file().metadata().map(|m| m.len()).unwrap_or(0) as usize;
        (len + page_size - 1) / page_size
    }

    /// Read one page worth of bytes straight from disk, bypassing the
    /// buffer pool. The page must already exist.
    pub fn read_page(&self, pid: &HeapPageID) -> DbResult<Vec<u8>> {
        let page_size = BufferPool::get_page_size();
        let start_pos = pid.page_index as usize * page_size;

        let mut file = self.get_file();
        let len = file.metadata()?.len() as usize;
        if start_pos + page_size > len {
            return Err(DbError::Storage(format!(
                "page {} is out of range, file has {} bytes",
                pid, len
            )));
        }

        file.seek(SeekFrom::Start(start_pos as u64))?;
        let mut buf: Vec<u8> = vec![0; page_size];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Write a page image at its slot in the file. The buffer pool
    /// decides when; the heap table never writes a cached page on its
    /// own.
    pub fn write_page_to_disk(&self, pid: &HeapPageID, data: &[u8]) -> DbResult<()> {
        let start_pos = pid.page_index as usize * BufferPool::get_page_size();

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(start_pos as u64))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    /// Grow the file by one empty page, under the file mutex so two
    /// inserters cannot claim the same page index.
    fn append_empty_page(&self) -> DbResult<HeapPageID> {
        let page_size = BufferPool::get_page_size();

        let mut file = self.get_file();
        let len = file.metadata()?.len() as usize;
        let page_index = ((len + page_size - 1) / page_size) as u32;

        file.seek(SeekFrom::Start((page_index as usize * page_size) as u64))?;
        file.write_all(&empty_page_data())?;
        file.flush()?;

        debug!("table {} extended to page {}", self.table_id, page_index);
        Ok(HeapPageID::new(self.table_id, page_index))
    }

    /// Add a tuple on behalf of the transaction: the first page with an
    /// empty slot takes it, extending the file when every page is full.
    /// Returns the ids of the pages that were modified.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> DbResult<Vec<HeapPageID>> {
        if !tuple.conforms_to(&self.schema) {
            return Err(DbError::Storage(format!(
                "tuple {} does not conform to the schema of table {}",
                tuple, self.name
            )));
        }

        for page_index in 0..self.pages_count() {
            let pid = HeapPageID::new(self.table_id, page_index as u32);
            let page_rc = db
                .buffer_pool()
                .get_page(db, tx, Permission::ReadWrite, &pid)?;

            let has_room = page_rc.rl().empty_slots_count() > 0;
            if has_room {
                page_rc.wl().insert_tuple(tuple)?;
                return Ok(vec![pid]);
            }
        }

        // every existing page is full
        let pid = self.append_empty_page()?;
        let page_rc = db
            .buffer_pool()
            .get_page(db, tx, Permission::ReadWrite, &pid)?;
        page_rc.wl().insert_tuple(tuple)?;
        Ok(vec![pid])
    }

    /// Remove the tuple named by its record id. Returns the ids of the
    /// pages that were modified.
    pub fn delete_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> DbResult<Vec<HeapPageID>> {
        let rid = tuple.rid().ok_or_else(|| {
            DbError::Storage(format!("tuple {} carries no record id", tuple))
        })?;
        if rid.pid.table_id != self.table_id {
            return Err(DbError::Storage(format!(
                "record {} does not belong to table {}",
                rid, self.table_id
            )));
        }

        let page_rc = db
            .buffer_pool()
            .get_page(db, tx, Permission::ReadWrite, &rid.pid)?;
        page_rc.wl().delete_tuple(&rid)?;
        Ok(vec![rid.pid])
    }

    pub fn iter<'a>(&self, db: &'a Database, tx: &'a Transaction) -> HeapTableIterator<'a> {
        HeapTableIterator::new(db, tx, self.table_id)
    }

    /// Count the live tuples. Runs its own read-only transaction.
    pub fn tuples_count(&self, db: &Database) -> DbResult<usize> {
        let tx = Transaction::new();
        let mut count = 0;
        let mut iter = self.iter(db, &tx);
        while iter.next_tuple()?.is_some() {
            count += 1;
        }
        tx.commit(db)?;
        Ok(count)
    }
}

/// Walks every occupied slot of a table: pages in page-number order,
/// slots in slot order. Each page is requested with read permission, so
/// a scan can abort on lock timeout like any other page access.
pub struct HeapTableIterator<'a> {
    db: &'a Database,
    tx: &'a Transaction,
    table_id: u32,
    next_page_index: u32,
    page_iter: Option<HeapPageIteratorRc>,
}

impl<'a> HeapTableIterator<'a> {
    pub fn new(db: &'a Database, tx: &'a Transaction, table_id: u32) -> Self {
        Self {
            db,
            tx,
            table_id,
            next_page_index: 0,
            page_iter: None,
        }
    }

    pub fn next_tuple(&mut self) -> DbResult<Option<Tuple>> {
        loop {
            if let Some(it) = self.page_iter.as_mut() {
                if let Some(tuple) = it.next() {
                    return Ok(Some(tuple));
                }
            }

            let pages_count = {
                let table_rc = self.db.catalog().get_table(&self.table_id)?;
                let count = table_rc.rl().pages_count();
                count
            };
            if self.next_page_index as usize >= pages_count {
                return Ok(None);
            }

            let pid = HeapPageID::new(self.table_id, self.next_page_index);
            self.next_page_index += 1;

            let page_rc = self
                .db
                .buffer_pool()
                .get_page(self.db, self.tx, Permission::ReadOnly, &pid)?;
            self.page_iter = Some(HeapPageIteratorRc::new(page_rc));
        }
    }

    pub fn rewind(&mut self) {
        self.next_page_index = 0;
        self.page_iter = None;
    }
}
