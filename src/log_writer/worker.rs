//! Background writer thread for [`LogWriter`](super::LogWriter).
//!
//! The worker drains [`WriterCommand`] values in queue order, writing every
//! line to the primary stream and then to the mirror. A write failure marks
//! the writer as failed and ends the thread; queued commands are dropped
//! with the receiver, which releases any caller waiting on a flush ack.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};
use log::error;
use parking_lot::RwLock;

use super::{
    clock::Clock,
    config::LogConfig,
    rotation::{FileNamer, LogStream},
    WriterState,
};

/// Commands sent to the worker thread.
pub(crate) enum WriterCommand {
    /// One serialized record, without the trailing newline.
    Line(String),
    /// Flush and sync both streams, then report the result.
    Flush(Sender<io::Result<()>>),
}

/// Primary and optional mirror streams sharing one naming rule.
pub(crate) struct Streams {
    namer: FileNamer,
    primary: LogStream,
    mirror: Option<LogStream>,
}

impl Streams {
    pub(crate) fn new(config: &LogConfig) -> Self {
        Self {
            namer: FileNamer::new(config),
            primary: LogStream::new(&config.directory, config.max_file_bytes),
            mirror: config
                .mirror()
                .map(|dir| LogStream::new(dir, config.max_file_bytes)),
        }
    }

    fn write(&mut self, bucket: &str, line: &str) -> io::Result<()> {
        self.primary.write_line(&self.namer, bucket, line)?;
        if let Some(mirror) = self.mirror.as_mut() {
            mirror.write_line(&self.namer, bucket, line)?;
        }
        Ok(())
    }

    fn sync(&mut self) -> io::Result<()> {
        self.primary.sync()?;
        if let Some(mirror) = self.mirror.as_mut() {
            mirror.sync()?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        let primary = self.primary.close();
        let mirror = self.mirror.as_mut().map_or(Ok(()), LogStream::close);
        primary.and(mirror)
    }
}

pub(crate) fn spawn_worker<C>(
    rx: Receiver<WriterCommand>,
    mut streams: Streams,
    clock: C,
    state: Arc<RwLock<WriterState>>,
) -> io::Result<JoinHandle<()>>
where
    C: Clock,
{
    thread::Builder::new()
        .name("eventline-log-writer".into())
        .spawn(move || {
            for cmd in rx.iter() {
                match cmd {
                    WriterCommand::Line(line) => {
                        let bucket = streams.namer.bucket(clock.now());
                        if let Err(err) = streams.write(&bucket, &line) {
                            error!("LogWriter write error, stopping writer: {err}");
                            if let Err(close_err) = streams.close() {
                                error!("LogWriter close error: {close_err}");
                            }
                            *state.write() = WriterState::Failed(err.to_string());
                            return;
                        }
                    }
                    WriterCommand::Flush(ack) => {
                        let result = streams.sync();
                        if let Err(err) = &result {
                            error!("LogWriter flush error: {err}");
                        }
                        let _ = ack.send(result);
                    }
                }
            }
            let next = match streams.close() {
                Ok(()) => WriterState::Stopped,
                Err(err) => {
                    error!("LogWriter close error: {err}");
                    WriterState::Failed(err.to_string())
                }
            };
            *state.write() = next;
        })
}
