use std::collections::HashMap;

use crate::{
    error::{DbError, DbResult},
    execution::OpIterator,
    storage::{
        schema::{Field, Schema, Type},
        tuple::{Cell, Tuple},
    },
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

// Running state of one group. Avg keeps both legs and divides (integer
// truncation) only when the result is read.
enum AggState {
    Min(i32),
    Max(i32),
    Sum(i32),
    Count(i32),
    AvgSumCount(i32, i32),
}

impl AggState {
    fn new(op: AggregateOp, v: i32) -> Self {
        match op {
            AggregateOp::Min => AggState::Min(v),
            AggregateOp::Max => AggState::Max(v),
            AggregateOp::Sum => AggState::Sum(v),
            AggregateOp::Count => AggState::Count(1),
            AggregateOp::Avg => AggState::AvgSumCount(v, 1),
        }
    }

    fn merge(&mut self, v: i32) {
        match self {
            AggState::Min(cur) => *cur = (*cur).min(v),
            AggState::Max(cur) => *cur = (*cur).max(v),
            AggState::Sum(cur) => *cur += v,
            AggState::Count(cur) => *cur += 1,
            AggState::AvgSumCount(sum, count) => {
                *sum += v;
                *count += 1;
            }
        }
    }

    fn result(&self) -> i32 {
        match self {
            AggState::Min(v) | AggState::Max(v) | AggState::Sum(v) | AggState::Count(v) => *v,
            AggState::AvgSumCount(sum, count) => sum / count,
        }
    }
}

/// Folds a stream of tuples into one row per group. `Cell::Null` keys
/// the single bucket of an ungrouped aggregation, so grouped and
/// ungrouped runs share one code path.
pub struct Aggregator {
    op: AggregateOp,
    agg_type: Type,
    groups: HashMap<Cell, AggState>,
    // insertion order of the group keys, so results are stable
    order: Vec<Cell>,
}

impl Aggregator {
    pub fn new(op: AggregateOp, agg_type: Type) -> DbResult<Self> {
        if let Type::String(_) = agg_type {
            if op != AggregateOp::Count {
                return Err(DbError::InvalidArgument(format!(
                    "{:?} is not supported over string fields",
                    op
                )));
            }
        }

        Ok(Self {
            op,
            agg_type,
            groups: HashMap::new(),
            order: Vec::new(),
        })
    }

    pub fn merge(&mut self, group_key: Cell, value: &Cell) -> DbResult<()> {
        let v = match (&self.agg_type, value) {
            (Type::Int, Cell::Int(v)) => *v,
            // counting is the only operation over strings, and it does
            // not look at the payload
            (Type::String(_), Cell::String(_)) => 0,
            _ => {
                return Err(DbError::InvalidArgument(format!(
                    "cell {:?} does not match the aggregated column type",
                    value
                )))
            }
        };

        match self.groups.get_mut(&group_key) {
            Some(state) => state.merge(v),
            None => {
                self.order.push(group_key.clone());
                self.groups.insert(group_key, AggState::new(self.op, v));
            }
        }
        Ok(())
    }

    /// One tuple per group: `(group, value)` keyed runs, `(value)` for
    /// the ungrouped sentinel.
    pub fn results(&self) -> Vec<Tuple> {
        self.order
            .iter()
            .map(|key| {
                let value = Cell::Int(self.groups[key].result());
                match key {
                    Cell::Null => Tuple::new(vec![value]),
                    _ => Tuple::new(vec![key.clone(), value]),
                }
            })
            .collect()
    }
}

/// Blocking aggregation operator: drains its child on `open`, then
/// streams the per-group results.
pub struct Aggregate<'a> {
    child: Box<dyn OpIterator + 'a>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    schema: Schema,
    results: Vec<Tuple>,
    cursor: usize,
    open: bool,
}

impl<'a> Aggregate<'a> {
    pub fn new(
        child: Box<dyn OpIterator + 'a>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> DbResult<Self> {
        let child_schema = child.schema();
        let agg_column = child_schema.get_field(agg_field)?.clone();

        // reject unsupported op/type combinations up front
        Aggregator::new(op, agg_column.t)?;

        let value_field = Field::new(
            &format!("{:?}({})", op, agg_column.name),
            Type::Int,
            false,
        );
        let schema = match group_field {
            Some(g) => {
                let group_column = child_schema.get_field(g)?;
                Schema::new(vec![
                    Field::new(&group_column.name, group_column.t, false),
                    value_field,
                ])
            }
            None => Schema::new(vec![value_field]),
        };

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            schema,
            results: Vec::new(),
            cursor: 0,
            open: false,
        })
    }
}

impl OpIterator for Aggregate<'_> {
    fn open(&mut self) -> DbResult<()> {
        self.child.open()?;

        let agg_type = self.child.schema().get_field(self.agg_field)?.t;
        let mut aggregator = Aggregator::new(self.op, agg_type)?;

        while let Some(tuple) = self.child.next()? {
            let key = match self.group_field {
                Some(g) => tuple.get_cell(g),
                None => Cell::Null,
            };
            aggregator.merge(key, &tuple.get_cell(self.agg_field))?;
        }

        self.results = aggregator.results();
        self.cursor = 0;
        self.open = true;
        Ok(())
    }

    fn next(&mut self) -> DbResult<Option<Tuple>> {
        if !self.open {
            return Err(DbError::IllegalState("aggregate is not open".to_string()));
        }

        if self.cursor < self.results.len() {
            let tuple = self.results[self.cursor].clone();
            self.cursor += 1;
            return Ok(Some(tuple));
        }
        Ok(None)
    }

    fn rewind(&mut self) -> DbResult<()> {
        if !self.open {
            return Err(DbError::IllegalState("aggregate is not open".to_string()));
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.results.clear();
        self.open = false;
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
