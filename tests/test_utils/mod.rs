#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use rand::Rng;
use tempfile::TempDir;

use minirel::{
    error::{DbError, DbResult},
    execution::{OpIterator, SeqScan},
    storage::schema::small_int_schema,
    utils::{self, HandyRwLock},
    BufferPool, Database, HeapTable, Schema, Transaction, Tuple,
};

/// # Conduct the initialization
///
/// - Setting up log configurations.
/// - Pin the page size every test in this binary agrees on.
pub fn setup(page_size: usize) {
    utils::init_log();
    BufferPool::set_page_size(page_size);
}

/// A fresh database over its own temp directory. Keep the `TempDir`
/// alive for as long as the database is in use.
pub fn new_test_db(pool_capacity: usize) -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("data"), pool_capacity).unwrap();
    (dir, db)
}

/// Create an all-int table under the database directory and register
/// it with the catalog.
pub fn create_int_table(db: &Database, columns: usize, name: &str) -> u32 {
    let schema = small_int_schema(columns, name);
    let path = db.get_path().join(format!("{}.dat", name));
    let table = HeapTable::new(&path, name, &schema).unwrap();
    let table_id = table.get_id();

    db.mut_catalog()
        .add_table(Arc::new(RwLock::new(table)), name, &format!("{}-0", name));
    table_id
}

/// Insert the given rows in one committed transaction.
pub fn insert_rows(db: &Database, table_id: u32, rows: &[Vec<i32>]) {
    let tx = Transaction::new();
    for row in rows {
        db.buffer_pool()
            .insert_tuple(db, &tx, table_id, &Tuple::from_ints(row))
            .unwrap();
    }
    tx.commit(db).unwrap();
}

/// Insert `rows` random tuples in one committed transaction, returning
/// the rows in insertion order.
pub fn insert_random_rows(
    db: &Database,
    table_id: u32,
    rows: usize,
    columns: usize,
) -> Vec<Vec<i32>> {
    let mut rng = rand::thread_rng();
    let mut data = Vec::with_capacity(rows);
    for _ in 0..rows {
        let row: Vec<i32> = (0..columns)
            .map(|_| rng.gen_range(i32::MIN, i32::MAX))
            .collect();
        data.push(row);
    }
    insert_rows(db, table_id, &data);
    data
}

/// Run a sequential scan to completion under its own transaction.
pub fn scan_all(db: &Database, table_id: u32) -> Vec<Tuple> {
    let tx = Transaction::new();
    let mut scan = SeqScan::new(db, &tx, table_id, "").unwrap();
    scan.open().unwrap();

    let mut tuples = Vec::new();
    while let Some(tuple) = scan.next().unwrap() {
        tuples.push(tuple);
    }
    scan.close();
    tx.commit(db).unwrap();
    tuples
}

pub fn table_pages_count(db: &Database, table_id: u32) -> usize {
    let table_rc = db.catalog().get_table(&table_id).unwrap();
    let count = table_rc.rl().pages_count();
    count
}

/// An operator that replays a fixed list of tuples; the leaf under
/// mutation operators in tests.
pub struct TupleSource {
    schema: Schema,
    tuples: Vec<Tuple>,
    cursor: usize,
    open: bool,
}

impl TupleSource {
    pub fn new(schema: Schema, tuples: Vec<Tuple>) -> Self {
        Self {
            schema,
            tuples,
            cursor: 0,
            open: false,
        }
    }
}

impl OpIterator for TupleSource {
    fn open(&mut self) -> DbResult<()> {
        self.cursor = 0;
        self.open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.open {
            return Err(DbError::IllegalState("source is not open".to_string()));
        }
        if self.cursor < self.tuples.len() {
            let tuple = self.tuples[self.cursor].clone();
            self.cursor += 1;
            return Ok(Some(tuple));
        }
        Ok(None)
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
