//! Periodic flush thread tied to a deliverer's lifetime.

use std::{
    io,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Sender, bounded, select, tick};
use log::{debug, warn};

use super::Core;

/// Handle to the timer thread. Dropping the handle stops the thread.
pub(crate) struct AutoFlush {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutoFlush {
    /// Spawn a thread calling [`Core::flush`] every `interval`.
    pub(crate) fn spawn(core: Arc<Core>, interval: Duration) -> io::Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("eventline-auto-flush".into())
            .spawn(move || {
                let ticker = tick(interval);
                loop {
                    select! {
                        recv(stop_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if let Err(err) = core.flush() {
                                debug!("BatchDeliverer auto flush failed: {err}");
                            }
                        }
                    }
                }
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stop the timer and wait for an in-flight flush to finish.
    pub(crate) fn stop(&mut self) {
        // Disconnecting the channel wakes the select.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("BatchDeliverer: auto flush thread panicked");
        }
    }
}

impl Drop for AutoFlush {
    fn drop(&mut self) {
        self.stop();
    }
}
