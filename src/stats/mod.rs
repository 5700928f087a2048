pub mod histogram;
pub mod table_stats;

pub use histogram::{IntHistogram, StringHistogram};
pub use table_stats::{TableStats, DEFAULT_IO_COST_PER_PAGE, NUM_HIST_BINS};

use std::collections::HashMap;

use crate::{database::Database, error::DbResult};

/// Per-table statistics, keyed by table id. There is no hidden global
/// map: callers own a registry and reset it explicitly.
pub struct StatsRegistry {
    stats: HashMap<u32, TableStats>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self {
            stats: HashMap::new(),
        }
    }

    /// Collect statistics for every table in the catalog.
    pub fn compute_all(&mut self, db: &Database, io_cost_per_page: usize) -> DbResult<()> {
        let table_ids = db.catalog().table_ids();
        for table_id in table_ids {
            let stats = TableStats::collect(db, table_id, io_cost_per_page)?;
            self.stats.insert(table_id, stats);
        }
        Ok(())
    }

    pub fn get(&self, table_id: &u32) -> Option<&TableStats> {
        self.stats.get(table_id)
    }

    pub fn reset_stats(&mut self) {
        self.stats.clear();
    }
}
