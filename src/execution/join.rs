use crate::{
    error::{DbError, DbResult},
    execution::OpIterator,
    predicate::JoinPredicate,
    storage::{schema::Schema, tuple::Tuple},
};

/// Nested-loops join: the left child is the outer loop, the right child
/// is rewound once per outer tuple. Output is the concatenation of the
/// two rows under the merged schema.
pub struct Join<'a> {
    predicate: JoinPredicate,
    left: Box<dyn OpIterator + 'a>,
    right: Box<dyn OpIterator + 'a>,
    schema: Schema,
    current_left: Option<Tuple>,
    open: bool,
}

impl<'a> Join<'a> {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn OpIterator + 'a>,
        right: Box<dyn OpIterator + 'a>,
    ) -> Self {
        let schema = Schema::merge(left.schema(), right.schema());
        Self {
            predicate,
            left,
            right,
            schema,
            current_left: None,
            open: false,
        }
    }

    fn merged(&self, left: &Tuple, right: &Tuple) -> Tuple {
        let mut cells = left.cells().to_vec();
        cells.extend(right.cells().iter().cloned());
        Tuple::new(cells)
    }
}

impl OpIterator for Join<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.left.open()?;
        self.right.open()?;
        self.current_left = None;
        self.open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.open {
            return Err(DbError::IllegalState("join is not open".to_string()));
        }

        loop {
            if self.current_left.is_none() {
                self.current_left = self.left.next()?;
                if self.current_left.is_none() {
                    return Ok(None);
                }
                self.right.rewind()?;
            }

            let left = self.current_left.clone().unwrap();
            while let Some(right) = self.right.next()? {
                if self.predicate.matches(&left, &right) {
                    return Ok(Some(self.merged(&left, &right)));
                }
            }

            // inner exhausted; advance the outer row
            self.current_left = None;
        }
    }

    fn rewind(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::IllegalState("join is not open".to_string()));
        }
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.open = false;
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
