//! Time source for rotation buckets.

use chrono::{Local, NaiveDateTime};

/// Supplies the wall-clock time used to pick the current log file.
pub trait Clock: Send + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Local system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[cfg(any(test, feature = "test-util"))]
mod manual {
    use std::sync::Arc;

    use chrono::{NaiveDateTime, TimeDelta};
    use parking_lot::Mutex;

    use super::Clock;

    /// Clock that only moves when told to. Clones share the same time.
    #[derive(Clone, Debug)]
    pub struct ManualClock {
        now: Arc<Mutex<NaiveDateTime>>,
    }

    impl ManualClock {
        pub fn new(start: NaiveDateTime) -> Self {
            Self {
                now: Arc::new(Mutex::new(start)),
            }
        }

        pub fn set(&self, time: NaiveDateTime) {
            *self.now.lock() = time;
        }

        pub fn advance(&self, delta: TimeDelta) {
            let mut now = self.now.lock();
            *now += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.now.lock()
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use manual::ManualClock;
