mod test_utils;

use minirel::{
    execution::{OpIterator, SeqScan},
    DbError, Transaction, Tuple,
};

use crate::test_utils::{create_int_table, insert_rows, new_test_db, scan_all, setup};

// 512-byte pages keep these tables small: 124 one-int tuples per page.
const PAGE_SIZE: usize = 512;
const TUPLES_PER_PAGE: i32 = 124;

#[test]
fn test_cache_never_exceeds_capacity() {
    setup(PAGE_SIZE);

    let capacity = 5;
    let (_dir, db) = new_test_db(capacity);
    let table_id = create_int_table(&db, 1, "t");

    // ten pages of committed (hence clean, evictable) data, inserted
    // one page worth per transaction so no single writer needs more
    // dirty pages than the pool can pin
    let rows: Vec<Vec<i32>> = (0..10 * TUPLES_PER_PAGE).map(|i| vec![i]).collect();
    for chunk in rows.chunks(TUPLES_PER_PAGE as usize) {
        insert_rows(&db, table_id, chunk);
    }

    let scanned = scan_all(&db, table_id);
    assert_eq!(scanned.len(), rows.len());
    assert!(db.buffer_pool().size() <= capacity);
}

#[test]
fn test_pool_exhausted_when_all_pages_dirty() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(2);
    let table_id = create_int_table(&db, 1, "t");

    let tx = Transaction::new();
    let mut result = Ok(());
    for i in 0..3 * TUPLES_PER_PAGE {
        result = db
            .buffer_pool()
            .insert_tuple(&db, &tx, table_id, &Tuple::from_ints(&[i]));
        if result.is_err() {
            break;
        }
    }

    // filling a third page needs an eviction, and both cached pages
    // are dirty
    let err = result.unwrap_err();
    match err {
        DbError::Storage(msg) => assert!(msg.contains("buffer pool exhausted"), "{}", msg),
        other => panic!("expected a storage error, got {:?}", other),
    }
    assert!(db.buffer_pool().size() <= 2);

    tx.abort(&db).unwrap();
    assert_eq!(db.buffer_pool().size(), 0);
}

#[test]
fn test_dirty_page_never_evicted() {
    setup(PAGE_SIZE);

    let capacity = 3;
    let (_dir, db) = new_test_db(capacity);
    let table_id = create_int_table(&db, 1, "t");

    // five pages of committed data
    let rows: Vec<Vec<i32>> = (0..5 * TUPLES_PER_PAGE).map(|i| vec![i]).collect();
    for chunk in rows.chunks(TUPLES_PER_PAGE as usize) {
        insert_rows(&db, table_id, chunk);
    }
    db.buffer_pool().clear();

    // dirty exactly one page, then stream the whole table through the
    // remaining capacity under the same transaction
    let victim = scan_all(&db, table_id).into_iter().next().unwrap();

    let writer = Transaction::new();
    db.buffer_pool()
        .delete_tuple(&db, &writer, &victim)
        .unwrap();

    let mut scan = SeqScan::new(&db, &writer, table_id, "").unwrap();
    scan.open().unwrap();
    let mut seen = 0;
    while scan.next().unwrap().is_some() {
        seen += 1;
    }
    scan.close();

    assert_eq!(seen, rows.len() - 1);
    assert!(db.buffer_pool().size() <= capacity);

    // the dirtied page survived every eviction: rolling back still
    // works
    writer.abort(&db).unwrap();
    assert_eq!(scan_all(&db, table_id).len(), rows.len());
}

#[test]
fn test_commit_cleans_pages_for_eviction() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(2);
    let table_id = create_int_table(&db, 1, "t");

    // dirty two pages and commit; the pages are clean again and a
    // third page can enter the cache
    let tx = Transaction::new();
    for i in 0..2 * TUPLES_PER_PAGE {
        db.buffer_pool()
            .insert_tuple(&db, &tx, table_id, &Tuple::from_ints(&[i]))
            .unwrap();
    }
    tx.commit(&db).unwrap();

    let tx = Transaction::new();
    db.buffer_pool()
        .insert_tuple(&db, &tx, table_id, &Tuple::from_ints(&[-1]))
        .unwrap();
    tx.commit(&db).unwrap();

    assert_eq!(scan_all(&db, table_id).len(), 2 * TUPLES_PER_PAGE as usize + 1);
    assert!(db.buffer_pool().size() <= 2);
}
