use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{database::Database, error::DbResult};

pub type TransactionID = u32;

static TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

/// A transaction token. Ids increase monotonically by 1 and are never
/// reused within a process.
#[derive(Eq, PartialEq, Clone)]
pub struct Transaction {
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        let id = TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        Self { id }
    }

    pub fn commit(&self, db: &Database) -> DbResult<()> {
        db.buffer_pool().transaction_complete(db, self, true)
    }

    pub fn abort(&self, db: &Database) -> DbResult<()> {
        db.buffer_pool().transaction_complete(db, self, false)
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }
}

impl std::hash::Hash for Transaction {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
