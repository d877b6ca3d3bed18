use std::fmt;

use crate::{error::DeliveryError, record::Record};

/// Trait implemented by all deliverers.
///
/// `Deliverer` is `Send + Sync` so one instance can be shared between
/// producer threads behind an `Arc`, and `Debug` so boxed deliverers can be
/// inspected. Implementations take ownership of each
/// record passed to [`add`](Deliverer::add).
pub trait Deliverer: Send + Sync + fmt::Debug {
    /// Hand a record to the deliverer.
    fn add(&self, record: Record) -> Result<(), DeliveryError>;

    /// Push pending records towards their destination.
    fn flush(&self) -> Result<(), DeliveryError>;

    /// Drain pending records and stop background work.
    ///
    /// Calling `close` more than once is safe; later calls do no work.
    fn close(&self) -> Result<(), DeliveryError>;
}

impl<D: Deliverer + ?Sized> Deliverer for Box<D> {
    fn add(&self, record: Record) -> Result<(), DeliveryError> {
        (**self).add(record)
    }

    fn flush(&self) -> Result<(), DeliveryError> {
        (**self).flush()
    }

    fn close(&self) -> Result<(), DeliveryError> {
        (**self).close()
    }
}
