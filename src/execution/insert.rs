use crate::{
    database::Database,
    error::{DbError, DbResult},
    execution::OpIterator,
    storage::{
        schema::{Field, Schema, Type},
        tuple::Tuple,
    },
    transaction::Transaction,
    utils::HandyRwLock,
};

/// Routes every tuple of its child into a table through the buffer
/// pool. Single-shot: the first pull does all the work and yields one
/// tuple holding the insert count; later pulls see end-of-stream.
pub struct Insert<'a> {
    db: &'a Database,
    tx: &'a Transaction,
    child: Box<dyn OpIterator + 'a>,
    table_id: u32,
    schema: Schema,
    called: bool,
    open: bool,
}

impl<'a> Insert<'a> {
    pub fn new(
        db: &'a Database,
        tx: &'a Transaction,
        child: Box<dyn OpIterator + 'a>,
        table_id: u32,
    ) -> DbResult<Self> {
        let table_schema = db.catalog().get_table(&table_id)?.rl().get_schema();
        if !child.schema().same_types(&table_schema) {
            return Err(DbError::Storage(format!(
                "child schema does not match the schema of table {}",
                table_id
            )));
        }

        Ok(Self {
            db,
            tx,
            child,
            table_id,
            schema: Schema::new(vec![Field::new("inserted", Type::Int, false)]),
            called: false,
            open: false,
        })
    }
}

impl OpIterator for Insert<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.open {
            return Err(DbError::IllegalState("insert is not open".to_string()));
        }
        if self.called {
            return Ok(None);
        }

        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.db
                .buffer_pool()
                .insert_tuple(self.db, self.tx, self.table_id, &tuple)?;
            count += 1;
        }

        self.called = true;
        Ok(Some(Tuple::from_ints(&[count])))
    }

    fn rewind(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::IllegalState("insert is not open".to_string()));
        }
        self.child.rewind()?;
        self.called = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.open = false;
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
