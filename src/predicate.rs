use std::fmt;

use crate::storage::tuple::{Cell, Tuple};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Op {
    Equals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    Like,
    NotEquals,
}

/// Compares one field of a tuple against a constant.
#[derive(Clone)]
pub struct Predicate {
    pub field_index: usize,
    pub op: Op,
    pub cell: Cell,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, cell: &Cell) -> Self {
        Self {
            field_index,
            op,
            cell: cell.clone(),
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        let cell = tuple.get_cell(self.field_index);
        compare(&cell, self.op, &self.cell)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "field_index: {}, op: {:?}, cell: {:?}",
            self.field_index, self.op, self.cell
        )
    }
}

/// Compares a field of one tuple against a field of another; what a
/// nested-loops join evaluates per pair.
#[derive(Clone)]
pub struct JoinPredicate {
    pub field_index1: usize,
    pub op: Op,
    pub field_index2: usize,
}

impl JoinPredicate {
    pub fn new(field_index1: usize, op: Op, field_index2: usize) -> Self {
        Self {
            field_index1,
            op,
            field_index2,
        }
    }

    pub fn matches(&self, left: &Tuple, right: &Tuple) -> bool {
        compare(
            &left.get_cell(self.field_index1),
            self.op,
            &right.get_cell(self.field_index2),
        )
    }
}

// Cells of different types never match; `Like` is substring
// containment on strings.
fn compare(lhs: &Cell, op: Op, rhs: &Cell) -> bool {
    match op {
        Op::Equals => lhs == rhs,
        Op::NotEquals => match (lhs, rhs) {
            (Cell::Int(_), Cell::Int(_)) | (Cell::String(_), Cell::String(_)) => lhs != rhs,
            _ => false,
        },
        Op::GreaterThan => matches!(
            lhs.partial_cmp(rhs),
            Some(std::cmp::Ordering::Greater)
        ),
        Op::GreaterThanOrEq => matches!(
            lhs.partial_cmp(rhs),
            Some(std::cmp::Ordering::Greater) | Some(std::cmp::Ordering::Equal)
        ),
        Op::LessThan => matches!(lhs.partial_cmp(rhs), Some(std::cmp::Ordering::Less)),
        Op::LessThanOrEq => matches!(
            lhs.partial_cmp(rhs),
            Some(std::cmp::Ordering::Less) | Some(std::cmp::Ordering::Equal)
        ),
        Op::Like => match (lhs, rhs) {
            (Cell::String(s), Cell::String(pattern)) => s.contains(pattern.as_str()),
            _ => false,
        },
    }
}
