use crate::{
    database::Database,
    error::{DbError, DbResult},
    execution::OpIterator,
    storage::{
        schema::{Field, Schema, Type},
        tuple::Tuple,
    },
    transaction::Transaction,
};

/// Deletes every tuple its child produces. Single-shot like `Insert`:
/// one count tuple, then end-of-stream.
pub struct Delete<'a> {
    db: &'a Database,
    tx: &'a Transaction,
    child: Box<dyn OpIterator + 'a>,
    schema: Schema,
    called: bool,
    open: bool,
}

impl<'a> Delete<'a> {
    pub fn new(db: &'a Database, tx: &'a Transaction, child: Box<dyn OpIterator + 'a>) -> Self {
        Self {
            db,
            tx,
            child,
            schema: Schema::new(vec![Field::new("deleted", Type::Int, false)]),
            called: false,
            open: false,
        }
    }
}

impl OpIterator for Delete<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.open {
            return Err(DbError::IllegalState("delete is not open".to_string()));
        }
        if self.called {
            return Ok(None);
        }

        let mut count = 0;
        while let Some(tuple) = self.child.next()? {
            self.db.buffer_pool().delete_tuple(self.db, self.tx, &tuple)?;
            count += 1;
        }

        self.called = true;
        Ok(Some(Tuple::from_ints(&[count])))
    }

    fn rewind(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::IllegalState("delete is not open".to_string()));
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
