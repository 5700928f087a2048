mod test_utils;

use minirel::{
    stats::{StatsRegistry, TableStats, DEFAULT_IO_COST_PER_PAGE},
    Cell, Op,
};

use crate::test_utils::{create_int_table, insert_rows, new_test_db, setup, table_pages_count};

const PAGE_SIZE: usize = 1024;

#[test]
fn test_scan_cost_and_cardinality() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let table_id = create_int_table(&db, 2, "t");

    let rows: Vec<Vec<i32>> = (0..500).map(|i| vec![i, i % 10]).collect();
    insert_rows(&db, table_id, &rows);

    let stats = TableStats::collect(&db, table_id, DEFAULT_IO_COST_PER_PAGE).unwrap();

    let pages = table_pages_count(&db, table_id);
    assert!(pages >= 2);
    assert_eq!(
        stats.estimate_scan_cost(),
        (pages * DEFAULT_IO_COST_PER_PAGE) as f64
    );
    assert_eq!(stats.num_tuples(), 500);
    assert_eq!(stats.estimate_table_cardinality(0.5), 250);
    assert_eq!(stats.estimate_table_cardinality(0.0), 0);
}

#[test]
fn test_selectivity_over_uniform_column() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let table_id = create_int_table(&db, 1, "t");

    let rows: Vec<Vec<i32>> = (1..=100).map(|i| vec![i]).collect();
    insert_rows(&db, table_id, &rows);

    let stats = TableStats::collect(&db, table_id, DEFAULT_IO_COST_PER_PAGE).unwrap();

    let half = stats
        .estimate_selectivity(0, Op::LessThan, &Cell::Int(51))
        .unwrap();
    assert!((half - 0.5).abs() < 0.05, "got {}", half);

    let all = stats
        .estimate_selectivity(0, Op::GreaterThanOrEq, &Cell::Int(1))
        .unwrap();
    assert!(all > 0.95);

    // the complement law holds through the table surface too
    let eq = stats
        .estimate_selectivity(0, Op::Equals, &Cell::Int(42))
        .unwrap();
    let ne = stats
        .estimate_selectivity(0, Op::NotEquals, &Cell::Int(42))
        .unwrap();
    assert!((eq + ne - 1.0).abs() < 1e-9);

    // a constant of the wrong type is refused
    assert!(stats
        .estimate_selectivity(0, Op::Equals, &Cell::String("42".to_string()))
        .is_err());
}

#[test]
fn test_registry_compute_and_reset() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let t1 = create_int_table(&db, 1, "first");
    let t2 = create_int_table(&db, 2, "second");
    insert_rows(&db, t1, &[vec![1], vec![2]]);
    insert_rows(&db, t2, &[vec![1, 2]]);

    let mut registry = StatsRegistry::new();
    registry.compute_all(&db, DEFAULT_IO_COST_PER_PAGE).unwrap();

    assert_eq!(registry.get(&t1).unwrap().num_tuples(), 2);
    assert_eq!(registry.get(&t2).unwrap().num_tuples(), 1);

    registry.reset_stats();
    assert!(registry.get(&t1).is_none());
    assert!(registry.get(&t2).is_none());
}

#[test]
fn test_empty_table_stats() {
    setup(PAGE_SIZE);

    let (_dir, db) = new_test_db(50);
    let table_id = create_int_table(&db, 1, "t");

    let stats = TableStats::collect(&db, table_id, DEFAULT_IO_COST_PER_PAGE).unwrap();
    assert_eq!(stats.num_tuples(), 0);
    assert_eq!(stats.estimate_scan_cost(), 0.0);
    assert_eq!(
        stats
            .estimate_selectivity(0, Op::Equals, &Cell::Int(1))
            .unwrap(),
        0.0
    );
}
