//! Capturing `log` backend for unit tests.
//!
//! The logger is global, so tests that assert on captured messages are
//! marked `#[serial]`.

use std::sync::{Once, OnceLock};

use log::{Level, LevelFilter, Log, Metadata, Record as LogRecord};
use parking_lot::Mutex;

#[derive(Clone, Debug)]
pub(crate) struct CapturedLog {
    pub level: Level,
    pub message: String,
}

struct TestLogger;

static LOGGER: TestLogger = TestLogger;
static INIT: Once = Once::new();
static LOGS: OnceLock<Mutex<Vec<CapturedLog>>> = OnceLock::new();

fn logs() -> &'static Mutex<Vec<CapturedLog>> {
    LOGS.get_or_init(|| Mutex::new(Vec::new()))
}

impl Log for TestLogger {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &LogRecord<'_>) {
        logs().lock().push(CapturedLog {
            level: record.level(),
            message: record.args().to_string(),
        });
    }

    fn flush(&self) {}
}

pub(crate) fn install_test_logger() {
    INIT.call_once(|| {
        log::set_logger(&LOGGER).expect("set test logger");
        log::set_max_level(LevelFilter::Trace);
    });
    logs().lock().clear();
}

pub(crate) fn take_logged_messages() -> Vec<CapturedLog> {
    logs().lock().drain(..).collect()
}

/// Captured messages at `level` containing `needle`.
pub(crate) fn logged_at(level: Level, needle: &str) -> Vec<CapturedLog> {
    take_logged_messages()
        .into_iter()
        .filter(|log| log.level == level && log.message.contains(needle))
        .collect()
}
