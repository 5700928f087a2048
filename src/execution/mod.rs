pub mod aggregate;
pub mod delete;
pub mod filter;
pub mod insert;
pub mod join;
pub mod seq_scan;

pub use aggregate::{Aggregate, AggregateOp};
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use seq_scan::SeqScan;

use crate::{error::DbResult, storage::schema::Schema, storage::tuple::Tuple};

/// The pull contract every operator implements. A parent opens its
/// children before reading and closes them on teardown; `next` yields
/// `None` at end-of-stream. Pulling a closed operator is an error, and
/// a `TransactionAborted` from below is never swallowed.
pub trait OpIterator {
    fn open(&mut self) -> DbResult<()>;

    fn next(&mut self) -> DbResult<Option<Tuple>>;

    fn rewind(&mut self) -> DbResult<()>;

    fn close(&mut self);

    fn schema(&self) -> &Schema;
}
