use log::debug;

use crate::{
    database::Database,
    error::{DbError, DbResult},
    predicate::Op,
    stats::histogram::{string_to_int, IntHistogram, StringHistogram},
    storage::{heap::HeapTableIterator, schema::Type, tuple::Cell},
    transaction::Transaction,
    utils::HandyRwLock,
};

pub const DEFAULT_IO_COST_PER_PAGE: usize = 1000;

pub const NUM_HIST_BINS: usize = 100;

enum ColumnHist {
    Int(IntHistogram),
    Str(StringHistogram),
}

/// Statistics over one table: tuple and page counts plus one equi-width
/// histogram per column, collected in two scans (bounds first, then
/// population).
pub struct TableStats {
    table_id: u32,
    io_cost_per_page: usize,
    num_tuples: usize,
    num_pages: usize,
    histograms: Vec<ColumnHist>,
}

impl TableStats {
    pub fn collect(db: &Database, table_id: u32, io_cost_per_page: usize) -> DbResult<Self> {
        let table_rc = db.catalog().get_table(&table_id)?;
        let schema = table_rc.rl().get_schema();
        let num_pages = table_rc.rl().pages_count();

        let tx = Transaction::new();

        // pass 1: per-column bounds, strings projected onto ints
        let field_count = schema.field_count();
        let mut bounds: Vec<Option<(i32, i32)>> = vec![None; field_count];
        let mut num_tuples = 0;

        let mut iter = HeapTableIterator::new(db, &tx, table_id);
        while let Some(tuple) = iter.next_tuple()? {
            num_tuples += 1;
            for i in 0..field_count {
                let v = project(&tuple.get_cell(i))?;
                bounds[i] = Some(match bounds[i] {
                    None => (v, v),
                    Some((min, max)) => (min.min(v), max.max(v)),
                });
            }
        }

        // pass 2: populate the histograms
        let mut histograms: Vec<ColumnHist> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let (min, max) = bounds[i].unwrap_or((0, 0));
                match field.t {
                    Type::Int => ColumnHist::Int(IntHistogram::new(NUM_HIST_BINS, min, max)),
                    Type::String(_) => {
                        ColumnHist::Str(StringHistogram::with_range(NUM_HIST_BINS, min, max))
                    }
                }
            })
            .collect();

        let mut iter = HeapTableIterator::new(db, &tx, table_id);
        while let Some(tuple) = iter.next_tuple()? {
            for (i, hist) in histograms.iter_mut().enumerate() {
                match (hist, &tuple.get_cell(i)) {
                    (ColumnHist::Int(h), Cell::Int(v)) => h.add_value(*v),
                    (ColumnHist::Str(h), Cell::String(s)) => h.add_value(s),
                    _ => {
                        return Err(DbError::Storage(format!(
                            "cell type drifted from the schema of table {}",
                            table_id
                        )))
                    }
                }
            }
        }

        tx.commit(db)?;

        debug!(
            "collected stats for table {}: {} tuples over {} pages",
            table_id, num_tuples, num_pages
        );

        Ok(Self {
            table_id,
            io_cost_per_page,
            num_tuples,
            num_pages,
            histograms,
        })
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    /// Cost of a full scan: every page is one I/O.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page) as f64
    }

    /// Expected result size of a scan with the given selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.num_tuples as f64 * selectivity) as usize
    }

    /// Fraction of tuples whose `field` satisfies `op constant`.
    pub fn estimate_selectivity(&self, field: usize, op: Op, constant: &Cell) -> DbResult<f64> {
        let hist = self.histograms.get(field).ok_or_else(|| {
            DbError::NotFound(format!("field index {} out of range", field))
        })?;

        match (hist, constant) {
            (ColumnHist::Int(h), Cell::Int(v)) => Ok(h.estimate_selectivity(op, *v)),
            (ColumnHist::Str(h), Cell::String(s)) => Ok(h.estimate_selectivity(op, s)),
            _ => Err(DbError::InvalidArgument(format!(
                "constant {:?} does not match the type of field {}",
                constant, field
            ))),
        }
    }
}

fn project(cell: &Cell) -> DbResult<i32> {
    match cell {
        Cell::Int(v) => Ok(*v),
        Cell::String(s) => Ok(string_to_int(s)),
        Cell::Null => Err(DbError::InvalidArgument(
            "null cells do not occur in stored tuples".to_string(),
        )),
    }
}
