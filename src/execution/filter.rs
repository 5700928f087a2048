use crate::{
    error::{DbError, DbResult},
    execution::OpIterator,
    predicate::Predicate,
    storage::{schema::Schema, tuple::Tuple},
};

/// Passes through the tuples of its child that satisfy the predicate.
pub struct Filter<'a> {
    predicate: Predicate,
    child: Box<dyn OpIterator + 'a>,
    open: bool,
}

impl<'a> Filter<'a> {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator + 'a>) -> Self {
        Self {
            predicate,
            child,
            open: false,
        }
    }

    pub fn set_child(&mut self, child: Box<dyn OpIterator + 'a>) {
        self.child = child;
    }
}

impl OpIterator for Filter<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;
        self.open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.open {
            return Err(DbError::IllegalState("filter is not open".to_string()));
        }

        while let Some(tuple) = self.child.next()? {
            if self.predicate.matches(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }

    fn rewind(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::IllegalState("filter is not open".to_string()));
        }
        self.child.rewind()
    }

    fn close(&mut self) {
        self.child.close();
        self.open = false;
    }

    fn schema(&self) -> &Schema {
        self.child.schema()
    }
}
