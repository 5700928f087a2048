mod test_utils;

use minirel::{Transaction, Tuple};

use crate::test_utils::{create_int_table, insert_rows, new_test_db, setup};

const PAGE_SIZE: usize = 1024;

#[test]
fn test_commit_writes_log_records() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let table_id = create_int_table(&db, 1, "t");

    assert_eq!(db.log_manager().records_count(), 0);

    insert_rows(&db, table_id, &[vec![1], vec![2]]);

    // at least START + UPDATE + COMMIT
    let records = db.log_manager().records_count();
    assert!(records >= 3, "only {} records", records);

    // the log file really grew
    let log_len = std::fs::metadata(db.get_path().join("wal.log"))
        .unwrap()
        .len();
    assert!(log_len > 0);
}

#[test]
fn test_abort_writes_log_record() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let table_id = create_int_table(&db, 1, "t");

    let tx = Transaction::new();
    db.buffer_pool()
        .insert_tuple(&db, &tx, table_id, &Tuple::from_ints(&[1]))
        .unwrap();

    let before = db.log_manager().records_count();
    tx.abort(&db).unwrap();
    assert!(db.log_manager().records_count() > before);
}

#[test]
fn test_checkpoint_flushes_and_logs() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let table_id = create_int_table(&db, 1, "t");
    insert_rows(&db, table_id, &[vec![1]]);

    let before = db.log_manager().records_count();
    db.checkpoint().unwrap();
    assert!(db.log_manager().records_count() > before);
}

#[test]
fn test_reset_clears_counters() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let table_id = create_int_table(&db, 1, "t");
    insert_rows(&db, table_id, &[vec![1]]);

    db.log_manager().reset().unwrap();
    assert_eq!(db.log_manager().records_count(), 0);
}
