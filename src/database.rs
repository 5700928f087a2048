use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    buffer_pool::{BufferPool, DEFAULT_PAGES},
    catalog::Catalog,
    error::DbResult,
    transaction::LockTable,
    tx_log::LogManager,
    utils::HandyRwLock,
};

/// Everything a query needs in one place: the page cache, the lock
/// table, the catalog and the log. There is no process-wide instance;
/// callers construct one per database directory (tests: one per
/// tempdir) and pass it down to operators and heap tables.
pub struct Database {
    path: PathBuf,

    buffer_pool: BufferPool,
    lock_table: LockTable,
    catalog: RwLock<Catalog>,
    log_manager: Mutex<LogManager>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P, pool_capacity: usize) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            fs::create_dir_all(&path)?;
        }

        let log_path = path.join("wal.log");

        Ok(Self {
            path,
            buffer_pool: BufferPool::new(pool_capacity),
            lock_table: LockTable::new(),
            catalog: RwLock::new(Catalog::new()),
            log_manager: Mutex::new(LogManager::new(log_path)?),
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::new(path, DEFAULT_PAGES)
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn lock_table(&self) -> &LockTable {
        &self.lock_table
    }

    pub fn catalog(&self) -> RwLockReadGuard<'_, Catalog> {
        self.catalog.rl()
    }

    pub fn mut_catalog(&self) -> RwLockWriteGuard<'_, Catalog> {
        self.catalog.wl()
    }

    pub fn log_manager(&self) -> MutexGuard<'_, LogManager> {
        self.log_manager.lock().unwrap()
    }

    pub fn get_path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Flush all dirty pages, then cut a checkpoint record.
    pub fn checkpoint(&self) -> DbResult<()> {
        self.buffer_pool.flush_all_pages(self)?;
        self.log_manager().log_checkpoint()
    }
}
