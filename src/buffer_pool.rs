use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use log::{debug, error};
use rand::Rng;

use crate::{
    database::Database,
    error::{DbError, DbResult},
    storage::{
        heap::{HeapPage, HeapPageID},
        tuple::Tuple,
    },
    transaction::{Permission, Transaction},
    tx_log::LogManager,
    types::{Pod, ResultPod},
    utils::HandyRwLock,
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the pool holds.
pub const DEFAULT_PAGES: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// The page cache, and the single gateway to pages: every access is
/// mediated by the lock table, dirty pages are tracked here, and
/// eviction never touches a dirty page (NO-STEAL), which is what makes
/// abort-by-discard sound.
pub struct BufferPool {
    buffer: RwLock<HashMap<HeapPageID, Pod<HeapPage>>>,

    capacity: usize,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn size(&self) -> usize {
        self.buffer.rl().len()
    }

    pub fn clear(&self) {
        self.buffer.wl().clear();
    }

    /// Retrieve the specified page with the associated permissions.
    /// Will acquire a lock and may block if that lock is held by
    /// another transaction; a request that outlives the deadlock
    /// window returns `TransactionAborted`.
    ///
    /// The page is served from the cache when present, loaded from the
    /// table file otherwise. A full cache evicts a clean victim first.
    pub fn get_page(
        &self,
        db: &Database,
        tx: &Transaction,
        perm: Permission,
        pid: &HeapPageID,
    ) -> ResultPod<HeapPage> {
        db.lock_table().acquire_lock(tx, &perm.to_lock(), pid)?;

        // fast path: cache hit
        {
            let buffer = self.buffer.rl();
            if let Some(page_rc) = buffer.get(pid) {
                return Ok(page_rc.clone());
            }
        }

        // miss: read the page outside the cache critical section
        let table_rc = db.catalog().get_table(&pid.table_id)?;
        let table = table_rc.rl();
        let bytes = table.read_page(pid)?;
        let page = HeapPage::new(pid, &bytes, &table.schema)?;
        drop(table);

        let mut buffer = self.buffer.wl();
        // another thread may have loaded the page while we read it
        if !buffer.contains_key(pid) {
            if buffer.len() >= self.capacity {
                self.evict_page(db, &mut buffer)?;
            }
            buffer.insert(*pid, Arc::new(RwLock::new(page)));
        }
        Ok(buffer.get(pid).unwrap().clone())
    }

    // Pick a clean victim at random and drop it. Sampling a dirty page
    // records it and retries; once every cached page has been seen
    // dirty the pool is exhausted, because no page can leave before its
    // transaction commits.
    fn evict_page(
        &self,
        db: &Database,
        buffer: &mut HashMap<HeapPageID, Pod<HeapPage>>,
    ) -> DbResult<()> {
        let mut rng = rand::thread_rng();
        let mut dirty_seen: HashSet<HeapPageID> = HashSet::new();

        loop {
            let keys: Vec<HeapPageID> = buffer.keys().cloned().collect();
            if keys.is_empty() {
                return Ok(());
            }

            let pick = keys[rng.gen_range(0, keys.len())];
            let page_rc = buffer.get(&pick).unwrap().clone();

            if page_rc.rl().is_dirty() {
                dirty_seen.insert(pick);
                if dirty_seen.len() >= buffer.len() {
                    return Err(DbError::Storage(
                        "buffer pool exhausted: every cached page is dirty".to_string(),
                    ));
                }
                continue;
            }

            // the victim is clean by construction; flushing it anyway
            // degrades to a plain write and keeps eviction safe should
            // the sampling above ever change
            {
                let mut log_manager = db.log_manager();
                self.flush_page_pod(db, &page_rc, &mut log_manager)?;
            }

            debug!("evicting page {}", pick);
            buffer.remove(&pick);
            return Ok(());
        }
    }

    /// Add a tuple to the specified table on behalf of the transaction.
    /// The pages the heap table touched are marked dirty and attributed
    /// to the transaction.
    pub fn insert_tuple(
        &self,
        db: &Database,
        tx: &Transaction,
        table_id: u32,
        tuple: &Tuple,
    ) -> DbResult<()> {
        let table_rc = db.catalog().get_table(&table_id)?;
        let dirtied = table_rc.rl().insert_tuple(db, tx, tuple)?;
        self.mark_dirty(tx, &dirtied);
        Ok(())
    }

    /// Remove a tuple, located by its record id, from whatever table it
    /// lives in.
    pub fn delete_tuple(&self, db: &Database, tx: &Transaction, tuple: &Tuple) -> DbResult<()> {
        let rid = tuple.rid().ok_or_else(|| {
            DbError::Storage(format!("tuple {} carries no record id", tuple))
        })?;

        let table_rc = db.catalog().get_table(&rid.pid.table_id)?;
        let dirtied = table_rc.rl().delete_tuple(db, tx, tuple)?;
        self.mark_dirty(tx, &dirtied);
        Ok(())
    }

    fn mark_dirty(&self, tx: &Transaction, pids: &[HeapPageID]) {
        let buffer = self.buffer.rl();
        for pid in pids {
            if let Some(page_rc) = buffer.get(pid) {
                page_rc.wl().set_dirty(Some(tx.get_id()));
            }
        }
    }

    /// Commit or roll back the transaction's page-level effects, then
    /// release all its locks (strict 2PL: this is the only place locks
    /// are released in bulk).
    pub fn transaction_complete(
        &self,
        db: &Database,
        tx: &Transaction,
        commit: bool,
    ) -> DbResult<()> {
        let dirty_pods = self.pages_dirtied_by(tx);

        if commit {
            // step 1: flush the transaction's pages, each with an
            // UPDATE record forced ahead of the data write
            //
            // step 2: the surviving image becomes the new rollback
            // point for whoever dirties the page next
            {
                let mut log_manager = db.log_manager();
                for page_rc in &dirty_pods {
                    self.flush_page_pod(db, page_rc, &mut log_manager)?;
                    page_rc.wl().set_before_image();
                }
                log_manager.log_commit(tx.get_id())?;
            }
        } else {
            // a dirty page was never flushed (NO-STEAL), so dropping it
            // from the cache is a complete rollback
            {
                let mut log_manager = db.log_manager();
                log_manager.log_abort(tx.get_id())?;
            }
            for page_rc in &dirty_pods {
                let pid = page_rc.rl().get_pid();
                self.discard_page(&pid);
            }
        }

        db.lock_table().release_all(tx);
        Ok(())
    }

    fn pages_dirtied_by(&self, tx: &Transaction) -> Vec<Pod<HeapPage>> {
        let buffer = self.buffer.rl();
        buffer
            .values()
            .filter(|page_rc| page_rc.rl().dirtier() == Some(tx.get_id()))
            .cloned()
            .collect()
    }

    pub fn holds_lock(&self, db: &Database, tx: &Transaction, pid: &HeapPageID) -> bool {
        db.lock_table().holds_lock(tx, pid)
    }

    /// Release one page lock. Unsafe to call in the middle of a
    /// transaction; exposed for recovery-style callers.
    pub fn release_page(&self, db: &Database, tx: &Transaction, pid: &HeapPageID) {
        db.lock_table().release_lock(tx, pid);
    }

    /// Remove the page from the cache without flushing it. Used by
    /// abort, where the on-disk copy is the one that must survive.
    pub fn discard_page(&self, pid: &HeapPageID) {
        self.buffer.wl().remove(pid);
    }

    /// Write every dirty page to disk. Testing hook; running this in
    /// the middle of transactions breaks the NO-STEAL invariant.
    pub fn flush_all_pages(&self, db: &Database) -> DbResult<()> {
        let pods: Vec<Pod<HeapPage>> = self.buffer.rl().values().cloned().collect();
        let mut log_manager = db.log_manager();
        for page_rc in pods {
            if page_rc.rl().is_dirty() {
                self.flush_page_pod(db, &page_rc, &mut log_manager)?;
            }
        }
        Ok(())
    }

    /// Write one page, log first. The UPDATE record carries the before
    /// and after images and is forced before the data write; only then
    /// is the dirty flag cleared.
    fn flush_page_pod(
        &self,
        db: &Database,
        page_rc: &Pod<HeapPage>,
        log_manager: &mut LogManager,
    ) -> DbResult<()> {
        let (pid, dirtier, before, after) = {
            let page = page_rc.rl();
            (
                page.get_pid(),
                page.dirtier(),
                page.get_before_image(),
                page.get_page_data(),
            )
        };

        if let Some(tid) = dirtier {
            log_manager.log_update(tid, &pid, &before, &after)?;
            log_manager.force()?;
        }

        let table_rc = db.catalog().get_table(&pid.table_id)?;
        if let Err(e) = table_rc.rl().write_page_to_disk(&pid, &after) {
            error!("flush of page {} failed: {}", pid, e);
            return Err(e);
        }

        page_rc.wl().set_dirty(None);
        debug!("flushed page {}", pid);
        Ok(())
    }
}
