use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use prefwatch::output::{CommandSink, Cycle};
use prefwatch::txn::Transaction;

#[derive(Debug, Default)]
struct Recorded {
    cycles: Vec<Cycle>,
    transactions: Vec<Transaction>,
}

/// `CommandSink` that keeps everything it is given.
///
/// Clones share the recording, so a test can keep one handle while the
/// runtime owns the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cycles(&self) -> Vec<Cycle> {
        self.inner.lock().unwrap().cycles.clone()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.lock().unwrap().transactions.clone()
    }

    /// Every primary command line emitted so far, in order.
    pub fn primaries(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap()
            .cycles
            .iter()
            .flat_map(|c| c.commands.iter().map(|cmd| cmd.primary.clone()))
            .collect()
    }
}

impl CommandSink for RecordingSink {
    fn emit(&mut self, cycle: &Cycle) -> anyhow::Result<()> {
        self.inner.lock().unwrap().cycles.push(cycle.clone());
        Ok(())
    }

    fn flush(&mut self, txn: &Transaction) -> anyhow::Result<Option<PathBuf>> {
        self.inner.lock().unwrap().transactions.push(txn.clone());
        Ok(None)
    }
}
