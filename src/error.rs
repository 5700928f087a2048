use std::io;

use thiserror::Error;

use crate::transaction::TransactionID;

#[derive(Error, Debug)]
pub enum DbError {
    /// A lock request could not be granted within the deadlock-detection
    /// window. The owning transaction must be rolled back by the caller.
    #[error("transaction {0} aborted: lock wait timed out")]
    TransactionAborted(TransactionID),

    #[error("storage: {0}")]
    Storage(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DbError {
    pub fn is_abort(&self) -> bool {
        matches!(self, DbError::TransactionAborted(_))
    }
}

pub type DbResult<T> = Result<T, DbError>;
