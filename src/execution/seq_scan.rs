use crate::{
    database::Database,
    error::{DbError, DbResult},
    execution::OpIterator,
    storage::{
        heap::HeapTableIterator,
        schema::{Field, Schema},
        tuple::Tuple,
    },
    transaction::Transaction,
    utils::HandyRwLock,
};

/// Scans a table in page order on behalf of a transaction. The
/// published schema qualifies every field name with the table alias.
pub struct SeqScan<'a> {
    db: &'a Database,
    tx: &'a Transaction,
    table_id: u32,
    schema: Schema,
    iter: HeapTableIterator<'a>,
    open: bool,
}

impl<'a> SeqScan<'a> {
    pub fn new(
        db: &'a Database,
        tx: &'a Transaction,
        table_id: u32,
        alias: &str,
    ) -> DbResult<Self> {
        let table_schema = db.catalog().get_table(&table_id)?.rl().get_schema();

        let alias = if alias.is_empty() {
            db.catalog().get_table_name(&table_id)?
        } else {
            alias.to_string()
        };

        let fields = table_schema
            .fields()
            .iter()
            .map(|f| Field::new(&format!("{}.{}", alias, f.name), f.t, f.is_primary))
            .collect();

        Ok(Self {
            db,
            tx,
            table_id,
            schema: Schema::new(fields),
            iter: HeapTableIterator::new(db, tx, table_id),
            open: false,
        })
    }
}

impl OpIterator for SeqScan<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.iter = HeapTableIterator::new(self.db, self.tx, self.table_id);
        self.open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.open {
            return Err(DbError::IllegalState("scan is not open".to_string()));
        }
        self.iter.next_tuple()
    }

    fn rewind(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::IllegalState("scan is not open".to_string()));
        }
        self.iter.rewind();
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
