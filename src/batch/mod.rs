//! Networked batch deliverer.
//!
//! [`BatchDeliverer`] collects records into a live buffer, seals full buffers
//! into batches, and keeps undelivered batches in a bounded overflow cache.
//! Each flush sends the batch at the head of the cache, retrying up to
//! [`MAX_ATTEMPTS`] passes over the endpoint list (primary, then secondary).
//!
//! # Locking
//!
//! The live buffer and the cache sit behind separate locks. `add` touches the
//! buffer lock only; `flush` holds the cache lock for its whole run, so
//! concurrent flushes are serialised while producers keep filling the buffer.
//!
//! # Data loss
//!
//! When the cache grows past its capacity the oldest batch is discarded,
//! even if the flush that grew it failed. A persistently unreachable
//! endpoint therefore costs data rather than unbounded memory.

mod auto_flush;
mod cache;
mod config;


use std::{
    mem,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::{
    deliverer::Deliverer,
    error::{ConfigError, DeliveryError, TransportError},
    rate_limited_warner::RateLimitedWarner,
    record::Record,
    transport::{Compressor, HttpTransport, Payload, SendOutcome, Transport, gzip},
};

use auto_flush::AutoFlush;
use cache::OverflowCache;

pub use cache::Batch;
pub use config::{
    BatchConfig, BatchDelivererBuilder, DEFAULT_BATCH_SIZE, DEFAULT_CACHE_CAPACITY,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_TIMEOUT, Endpoint, MAX_ATTEMPTS, MAX_BATCH_SIZE,
    PRIMARY_HEADER_PREFIX, PRIMARY_USER_AGENT, SECONDARY_HEADER_PREFIX, SECONDARY_PATH,
    SECONDARY_USER_AGENT,
};

/// Records accepted by `add` but not yet moved into the cache.
#[derive(Default)]
struct LiveBuffer {
    records: Vec<Record>,
    /// Full buffers sealed by `add` while a flush held the cache lock.
    sealed: Vec<Batch>,
}

impl LiveBuffer {
    fn is_empty(&self) -> bool {
        self.records.is_empty() && self.sealed.is_empty()
    }
}

/// State shared between the deliverer and its auto-flush thread.
pub(crate) struct Core {
    buffer: Mutex<LiveBuffer>,
    cache: Mutex<OverflowCache>,
    /// Mirrors the cache length so `add` can check it without the cache lock.
    cached: AtomicUsize,
    transports: Vec<Box<dyn Transport>>,
    batch_size: usize,
    compressor: Option<Compressor>,
    warner: RateLimitedWarner,
}

impl Core {
    fn new(config: &BatchConfig, transports: Vec<Box<dyn Transport>>) -> Self {
        let batch_size = config.effective_batch_size();
        Self {
            buffer: Mutex::new(LiveBuffer {
                records: Vec::with_capacity(batch_size),
                sealed: Vec::new(),
            }),
            cache: Mutex::new(OverflowCache::new(config.effective_cache_capacity())),
            cached: AtomicUsize::new(0),
            transports,
            batch_size,
            compressor: config.compress.then_some(gzip as Compressor),
            warner: RateLimitedWarner::default(),
        }
    }

    fn add(&self, record: Record) -> Result<(), DeliveryError> {
        let full = {
            let mut buffer = self.buffer.lock();
            buffer.records.push(record);
            if buffer.records.len() >= self.batch_size {
                let records =
                    mem::replace(&mut buffer.records, Vec::with_capacity(self.batch_size));
                buffer.sealed.push(Batch::new(records));
                true
            } else {
                false
            }
        };
        if full || self.cached.load(Ordering::Acquire) > 0 {
            self.flush()
        } else {
            Ok(())
        }
    }

    pub(crate) fn flush(&self) -> Result<(), DeliveryError> {
        let mut cache = self.cache.lock();
        self.stage_buffer(&mut cache);
        let Some(head) = cache.front() else {
            return Ok(());
        };

        let result = self.deliver(head);
        match &result {
            Ok(()) => {
                cache.pop_front();
            }
            Err(err) if consumes_batch(err) => {
                warn!("BatchDeliverer: dropping batch of {} records: {err}", head.len());
                cache.pop_front();
            }
            Err(err) => {
                debug!("BatchDeliverer: batch kept for retry: {err}");
            }
        }

        let evicted = cache.evict_overflow();
        if !evicted.is_empty() {
            let records: usize = evicted.iter().map(Batch::len).sum();
            self.warner.record_drops(records as u64);
            self.warner.warn_if_due(|count| {
                warn!("BatchDeliverer overflow cache full; discarded {count} records");
            });
        }
        self.cached.store(cache.len(), Ordering::Release);
        result
    }

    /// Move sealed batches, and the live buffer when nothing else is queued,
    /// into the cache.
    fn stage_buffer(&self, cache: &mut OverflowCache) {
        let mut buffer = self.buffer.lock();
        for batch in buffer.sealed.drain(..) {
            cache.push_back(batch);
        }
        if cache.is_empty() && !buffer.records.is_empty() {
            let records =
                mem::replace(&mut buffer.records, Vec::with_capacity(self.batch_size));
            cache.push_back(Batch::new(records));
        }
    }

    fn deliver(&self, batch: &Batch) -> Result<(), DeliveryError> {
        let json = serde_json::to_vec(batch.records())?;
        let payload = Payload::encode_with(json, batch.len(), self.compressor)?;
        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            for transport in &self.transports {
                match transport.send(&payload) {
                    Ok(SendOutcome::Accepted) => return Ok(()),
                    Ok(SendOutcome::Rejected(reason)) => {
                        return Err(DeliveryError::Rejected(reason));
                    }
                    Ok(SendOutcome::Failed(status)) => {
                        debug!(
                            "BatchDeliverer attempt {attempt}/{MAX_ATTEMPTS}: \
                             {} returned HTTP {status}",
                            transport.endpoint()
                        );
                        last_error = Some(TransportError::Status {
                            endpoint: transport.endpoint().to_owned(),
                            status,
                        });
                    }
                    Err(err) => {
                        debug!("BatchDeliverer attempt {attempt}/{MAX_ATTEMPTS}: {err}");
                        last_error = Some(err);
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| TransportError::Connection {
                endpoint: String::new(),
                reason: "no endpoints configured".into(),
            })
            .into())
    }

    fn flush_all(&self) -> Result<(), DeliveryError> {
        while !self.is_drained() {
            match self.flush() {
                Ok(()) => {}
                Err(err) if consumes_batch(&err) => {}
                Err(err) => return Err(err),
            }
        }
        self.warner.flush(|count| {
            warn!("BatchDeliverer overflow cache full; discarded {count} records");
        });
        Ok(())
    }

    fn is_drained(&self) -> bool {
        self.cached.load(Ordering::Acquire) == 0 && self.buffer.lock().is_empty()
    }
}

/// Errors after which the head batch is discarded instead of retried.
fn consumes_batch(err: &DeliveryError) -> bool {
    matches!(err, DeliveryError::Rejected(_) | DeliveryError::Serialize(_))
}

/// Deliverer sending batches of records to one or two HTTP endpoints.
///
/// Flushes run on the calling thread: `add` flushes when the buffer fills or
/// when earlier batches are still cached, `flush` sends one batch, and
/// `close` drains everything it can. With auto flush enabled a background
/// thread also calls `flush` on every tick until the deliverer is closed.
pub struct BatchDeliverer {
    core: Arc<Core>,
    auto_flush: Mutex<Option<AutoFlush>>,
    closed: AtomicBool,
}

impl BatchDeliverer {
    /// Build a deliverer posting to the HTTP endpoints in `config`.
    pub fn with_config(config: BatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let transports = config
            .endpoints()
            .map(|endpoint| {
                HttpTransport::new(endpoint.clone(), config.timeout)
                    .map(|transport| Box::new(transport) as Box<dyn Transport>)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_transports(config, transports)
    }

    /// Build a deliverer over caller-supplied transports, tried in order.
    ///
    /// The endpoint fields of `config` are ignored.
    pub fn with_transports(
        config: BatchConfig,
        transports: Vec<Box<dyn Transport>>,
    ) -> Result<Self, ConfigError> {
        if transports.is_empty() {
            return Err(ConfigError::Empty("transports"));
        }
        let core = Arc::new(Core::new(&config, transports));
        let auto_flush = if config.auto_flush {
            Some(AutoFlush::spawn(
                Arc::clone(&core),
                config.effective_flush_interval(),
            )?)
        } else {
            None
        };
        Ok(Self {
            core,
            auto_flush: Mutex::new(auto_flush),
            closed: AtomicBool::new(false),
        })
    }

    /// Create a builder for configuring a deliverer.
    pub fn builder() -> BatchDelivererBuilder {
        BatchDelivererBuilder::new()
    }

    /// Flush repeatedly until the buffer and cache are empty.
    ///
    /// Rejected batches are skipped; the first delivery failure stops the
    /// drain and is returned.
    pub fn flush_all(&self) -> Result<(), DeliveryError> {
        self.core.flush_all()
    }

    /// Records waiting in the live buffer, including sealed batches not yet
    /// moved into the cache.
    pub fn buffered_records(&self) -> usize {
        let buffer = self.core.buffer.lock();
        buffer.records.len() + buffer.sealed.iter().map(Batch::len).sum::<usize>()
    }

    /// Batches currently held in the overflow cache.
    pub fn cached_batches(&self) -> usize {
        self.core.cache.lock().len()
    }

    /// The effective number of records per batch.
    pub fn batch_size(&self) -> usize {
        self.core.batch_size
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Deliverer for BatchDeliverer {
    fn add(&self, record: Record) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        self.core.add(record)
    }

    fn flush(&self) -> Result<(), DeliveryError> {
        self.core.flush()
    }

    fn close(&self) -> Result<(), DeliveryError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        if let Some(mut timer) = self.auto_flush.lock().take() {
            timer.stop();
        }
        self.core.flush_all()
    }
}

impl Drop for BatchDeliverer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("BatchDeliverer: undelivered records remain after close: {err}");
        }
    }
}

impl std::fmt::Debug for BatchDeliverer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchDeliverer")
            .field("batch_size", &self.core.batch_size)
            .field("compress", &self.core.compressor.is_some())
            .field("closed", &self.is_closed())
            .finish()
    }
}
