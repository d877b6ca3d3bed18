//! Local append-only log writer.
//!
//! [`LogWriter`] serializes each record on the caller's thread and hands the
//! line to a dedicated worker over a bounded queue. The worker owns the open
//! files, picks the file for every line from the clock and the size limit,
//! and optionally mirrors each line into a second directory.
//!
//! `add` blocks while the queue is full. Once the worker hits a write error
//! it stops, and later calls report [`DeliveryError::WriterFailed`].

mod clock;
mod config;
mod rotation;
mod worker;


use std::{fs, sync::Arc, thread::JoinHandle};

use crossbeam_channel::{Sender, bounded};
use log::warn;
use parking_lot::{Mutex, RwLock};

use crate::{
    deliverer::Deliverer,
    error::{ConfigError, DeliveryError},
    record::Record,
};

use worker::{Streams, WriterCommand, spawn_worker};

#[cfg(any(test, feature = "test-util"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
pub use config::{DEFAULT_QUEUE_CAPACITY, LogConfig, LogWriterBuilder, RotateMode};

/// Lifecycle of the writer thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriterState {
    Running,
    /// Closed cleanly.
    Stopped,
    /// Stopped after an I/O error; holds the error text.
    Failed(String),
}

/// Deliverer appending JSON lines to rotating local files.
pub struct LogWriter {
    tx: Mutex<Option<Sender<WriterCommand>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    state: Arc<RwLock<WriterState>>,
}

impl LogWriter {
    /// Start a writer for `config` using the local system clock.
    pub fn with_config(config: LogConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, SystemClock)
    }

    /// Start a writer reading bucket times from `clock`.
    pub fn with_clock<C: Clock>(config: LogConfig, clock: C) -> Result<Self, ConfigError> {
        config.validate()?;
        fs::create_dir_all(&config.directory)?;
        if let Some(mirror) = config.mirror() {
            fs::create_dir_all(mirror)?;
        }

        let (tx, rx) = bounded(config.effective_queue_capacity());
        let state = Arc::new(RwLock::new(WriterState::Running));
        let handle = spawn_worker(rx, Streams::new(&config), clock, Arc::clone(&state))?;
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            state,
        })
    }

    pub fn builder() -> LogWriterBuilder {
        LogWriterBuilder::new()
    }

    pub fn state(&self) -> WriterState {
        self.state.read().clone()
    }

    fn sender(&self) -> Result<Sender<WriterCommand>, DeliveryError> {
        self.tx.lock().clone().ok_or_else(|| self.stopped_error())
    }

    fn stopped_error(&self) -> DeliveryError {
        match &*self.state.read() {
            WriterState::Failed(reason) => DeliveryError::WriterFailed(reason.clone()),
            _ => DeliveryError::Closed,
        }
    }
}

impl Deliverer for LogWriter {
    fn add(&self, record: Record) -> Result<(), DeliveryError> {
        let tx = self.sender()?;
        let line = record.to_json_line()?;
        tx.send(WriterCommand::Line(line))
            .map_err(|_| self.stopped_error())
    }

    /// Wait until every line queued before this call is on disk.
    fn flush(&self) -> Result<(), DeliveryError> {
        let tx = self.sender()?;
        let (ack_tx, ack_rx) = bounded(1);
        tx.send(WriterCommand::Flush(ack_tx))
            .map_err(|_| self.stopped_error())?;
        drop(tx);
        match ack_rx.recv() {
            Ok(result) => result.map_err(DeliveryError::from),
            Err(_) => Err(self.stopped_error()),
        }
    }

    /// Drain the queue, close the files, and stop the worker.
    fn close(&self) -> Result<(), DeliveryError> {
        self.tx.lock().take();
        if let Some(handle) = self.handle.lock().take()
            && handle.join().is_err()
        {
            warn!("LogWriter: worker thread panicked");
        }
        match self.state() {
            WriterState::Failed(reason) => Err(DeliveryError::WriterFailed(reason)),
            _ => Ok(()),
        }
    }
}

impl Drop for LogWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("LogWriter: close failed: {err}");
        }
    }
}

impl std::fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogWriter")
            .field("state", &self.state())
            .finish()
    }
}
