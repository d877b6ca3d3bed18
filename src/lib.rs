//! Event record deliverers.
//!
//! Producers build [`Record`]s and hand them to a [`Deliverer`]:
//!
//! - [`BatchDeliverer`] groups records into batches and posts them as JSON to
//!   a collector endpoint, with a fallback endpoint and a bounded cache of
//!   undelivered batches.
//! - [`LogWriter`] appends one JSON line per record to local files rotated
//!   by time and size, optionally mirrored into a second directory.
//!
//! Both are safe to share between threads and drain on `close` or drop.

mod batch;
mod deliverer;
mod error;
mod file_config;
mod log_writer;
mod rate_limited_warner;
mod record;
#[cfg(test)]
mod test_support;
mod transport;

pub use batch::{
    Batch, BatchConfig, BatchDeliverer, BatchDelivererBuilder, DEFAULT_BATCH_SIZE,
    DEFAULT_CACHE_CAPACITY, DEFAULT_FLUSH_INTERVAL, DEFAULT_TIMEOUT, Endpoint, MAX_ATTEMPTS,
    MAX_BATCH_SIZE, PRIMARY_HEADER_PREFIX, PRIMARY_USER_AGENT, SECONDARY_HEADER_PREFIX,
    SECONDARY_PATH, SECONDARY_USER_AGENT,
};
pub use deliverer::Deliverer;
pub use error::{ConfigError, DeliveryError, RejectReason, TransportError};
pub use file_config::{deliverer_from_ini_file, deliverer_from_ini_str};
#[cfg(any(test, feature = "test-util"))]
pub use log_writer::ManualClock;
pub use log_writer::{
    Clock, DEFAULT_QUEUE_CAPACITY, LogConfig, LogWriter, LogWriterBuilder, RotateMode,
    SystemClock, WriterState,
};
pub use record::{EventType, PropertyValue, Record, TIME_FORMAT};
pub use transport::{
    Compression, Compressor, HttpTransport, LIB_NAME, Payload, SendOutcome, Transport,
    classify_response, gzip,
};
