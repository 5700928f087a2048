use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{
    error::DbResult,
    io::{Encodeable, LogFile},
    storage::heap::HeapPageID,
    transaction::TransactionID,
};

#[derive(Debug, Copy, Clone, PartialEq)]
#[repr(u8)]
enum RecordType {
    Abort,
    Commit,
    Update,
    Start,
    Checkpoint,
}

impl Encodeable for RecordType {
    fn encode(&self) -> Vec<u8> {
        vec![*self as u8]
    }
}

/// The write-ahead log. An UPDATE record carries a page's before and
/// after images; `force` makes everything written so far durable. The
/// buffer pool forces the log before it writes a page (log before
/// data). Replay is out of scope: rollback happens by cache discard,
/// so ABORT and COMMIT records exist for the file format, not for a
/// recovery pass.
pub struct LogManager {
    file: LogFile,

    file_path: PathBuf,

    /// Byte position of each live transaction's START record.
    tx_start_position: HashMap<TransactionID, u64>,

    /// The absolute position of the file descriptor cursor; every
    /// record trails the offset of the record before it.
    current_offset: u64,

    total_records: usize,
}

impl LogManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> DbResult<Self> {
        Ok(Self {
            file: LogFile::new(&file_path)?,
            file_path: file_path.as_ref().to_path_buf(),
            tx_start_position: HashMap::new(),
            current_offset: 0,
            total_records: 0,
        })
    }

    /// Forget all in-memory state and start appending from the top of
    /// the file again. Testing hook.
    pub fn reset(&mut self) -> DbResult<()> {
        self.file = LogFile::new(&self.file_path)?;
        self.tx_start_position.clear();
        self.current_offset = 0;
        self.total_records = 0;
        Ok(())
    }

    pub fn records_count(&self) -> usize {
        self.total_records
    }

    fn log_start(&mut self, tid: TransactionID) -> DbResult<()> {
        self.file.write(&RecordType::Start)?;
        self.file.write(&tid)?;
        self.file.write(&self.current_offset)?;

        self.tx_start_position.insert(tid, self.current_offset);
        self.advance()
    }

    // There is no hook at transaction birth, so the first update a
    // transaction logs writes its START record.
    fn ensure_started(&mut self, tid: TransactionID) -> DbResult<()> {
        if self.tx_start_position.contains_key(&tid) {
            return Ok(());
        }
        self.log_start(tid)
    }

    /// Record one page update: the page's before image and its current
    /// image. Durable only after `force`.
    pub fn log_update(
        &mut self,
        tid: TransactionID,
        pid: &HeapPageID,
        before: &[u8],
        after: &[u8],
    ) -> DbResult<()> {
        self.ensure_started(tid)?;

        self.file.write(&RecordType::Update)?;
        self.file.write(&tid)?;
        self.file.write(&pid.table_id)?;
        self.file.write(&pid.page_index)?;
        self.file.write(&before.to_vec())?;
        self.file.write(&after.to_vec())?;
        self.file.write(&self.current_offset)?;

        debug!("logged update of page {} by tx_{}", pid, tid);
        self.advance()
    }

    pub fn log_commit(&mut self, tid: TransactionID) -> DbResult<()> {
        self.ensure_started(tid)?;

        self.file.write(&RecordType::Commit)?;
        self.file.write(&tid)?;
        self.file.write(&self.current_offset)?;
        self.advance()?;

        self.force()?;
        self.tx_start_position.remove(&tid);
        Ok(())
    }

    pub fn log_abort(&mut self, tid: TransactionID) -> DbResult<()> {
        self.ensure_started(tid)?;

        self.file.write(&RecordType::Abort)?;
        self.file.write(&tid)?;
        self.file.write(&self.current_offset)?;
        self.advance()?;

        self.force()?;
        self.tx_start_position.remove(&tid);
        Ok(())
    }

    /// Write a checkpoint record naming the outstanding transactions.
    /// The caller flushes the buffer pool first.
    pub fn log_checkpoint(&mut self) -> DbResult<()> {
        self.force()?;

        self.file.write(&RecordType::Checkpoint)?;
        self.file.write(&self.tx_start_position.len())?;
        let entries: Vec<(TransactionID, u64)> = self
            .tx_start_position
            .iter()
            .map(|(tid, pos)| (*tid, *pos))
            .collect();
        for (tid, start_position) in entries {
            self.file.write(&tid)?;
            self.file.write(&start_position)?;
        }
        self.file.write(&self.current_offset)?;
        self.advance()?;

        self.force()
    }

    /// Durably persist all pending records.
    pub fn force(&mut self) -> DbResult<()> {
        self.file.force()
    }

    fn advance(&mut self) -> DbResult<()> {
        self.current_offset = self.file.get_current_position()?;
        self.total_records += 1;
        Ok(())
    }
}
