//! Build a deliverer from an INI file.
//!
//! A file describes exactly one deliverer, chosen by its section name:
//!
//! ```ini
//! [batch]
//! server_url = https://collector.example.com/sync_data
//! app_id = my-app
//! batch_size = 50
//! compress = true
//!
//! [log]
//! directory = /var/log/events
//! rotate_mode = hourly
//! file_size_mb = 64
//! ```
//!
//! When both sections are present `[batch]` wins. Unknown keys are ignored.

use std::{fs, io::ErrorKind, path::Path, str::FromStr};

use ini::{Ini, Properties};

use crate::{
    batch::BatchDelivererBuilder,
    deliverer::Deliverer,
    error::ConfigError,
    log_writer::{LogWriterBuilder, RotateMode},
};

/// Parse `text` and build the deliverer it describes.
///
/// `origin` names the source in error messages.
pub fn deliverer_from_ini_str(
    origin: &str,
    text: &str,
) -> Result<Box<dyn Deliverer>, ConfigError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigError::Parse {
        path: origin.to_owned(),
        reason: err.to_string(),
    })?;
    if let Some(section) = ini.section(Some("batch")) {
        let deliverer = batch_builder(section)?.build()?;
        return Ok(Box::new(deliverer));
    }
    if let Some(section) = ini.section(Some("log")) {
        let writer = log_builder(section)?.build()?;
        return Ok(Box::new(writer));
    }
    Err(ConfigError::MissingSection(origin.to_owned()))
}

/// Read `path` and build the deliverer it describes.
pub fn deliverer_from_ini_file(
    path: impl AsRef<Path>,
) -> Result<Box<dyn Deliverer>, ConfigError> {
    let path = path.as_ref();
    let origin = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ConfigError::Parse {
            path: origin.clone(),
            reason: "file doesn't exist".into(),
        },
        _ => ConfigError::Io(err),
    })?;
    deliverer_from_ini_str(&origin, &text)
}

pub(crate) fn batch_builder(section: &Properties) -> Result<BatchDelivererBuilder, ConfigError> {
    let mut builder = BatchDelivererBuilder::new();
    if let Some(url) = section.get("server_url") {
        builder = builder.with_server(url, section.get("app_id").unwrap_or_default());
    }
    if let Some(url) = section.get("secondary_server_url") {
        builder = builder.with_secondary_server(
            url,
            section.get("secondary_app_id").unwrap_or_default(),
        );
    }
    if let Some(size) = parse_value(section, "batch_size")? {
        builder = builder.with_batch_size(size);
    }
    if let Some(ms) = parse_value(section, "timeout_ms")? {
        builder = builder.with_timeout_ms(ms);
    }
    if let Some(compress) = parse_bool(section, "compress")? {
        builder = builder.with_compress(compress);
    }
    if let Some(capacity) = parse_value(section, "cache_capacity")? {
        builder = builder.with_cache_capacity(capacity);
    }
    if parse_bool(section, "auto_flush")?.unwrap_or(false) {
        let interval = parse_value(section, "interval_secs")?
            .unwrap_or(crate::batch::DEFAULT_FLUSH_INTERVAL.as_secs());
        builder = builder.with_auto_flush(interval);
    }
    Ok(builder)
}

pub(crate) fn log_builder(section: &Properties) -> Result<LogWriterBuilder, ConfigError> {
    let mut builder = LogWriterBuilder::new();
    if let Some(dir) = section.get("directory") {
        builder = builder.with_directory(dir);
    }
    if let Some(mode) = section.get("rotate_mode") {
        builder = builder.with_rotate_mode(RotateMode::from_str(mode)?);
    }
    if let Some(mib) = parse_value(section, "file_size_mb")? {
        builder = builder.with_max_file_size_mb(mib);
    }
    if let Some(prefix) = section.get("file_name_prefix") {
        builder = builder.with_file_name_prefix(prefix);
    }
    if let Some(dir) = section.get("mirror_directory") {
        builder = builder.with_mirror_directory(dir);
    }
    if let Some(capacity) = parse_value(section, "capacity")? {
        builder = builder.with_queue_capacity(capacity);
    }
    Ok(builder)
}

fn parse_value<T: FromStr>(section: &Properties, key: &str) -> Result<Option<T>, ConfigError> {
    section
        .get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key: key.to_owned(),
                value: raw.to_owned(),
            })
        })
        .transpose()
}

fn parse_bool(section: &Properties, key: &str) -> Result<Option<bool>, ConfigError> {
    section
        .get(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_owned(),
                value: raw.to_owned(),
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::{io::Write, time::Duration};
    use tempfile::{NamedTempFile, tempdir};

    fn section(text: &str, name: &str) -> Properties {
        let ini = Ini::load_from_str(text).expect("valid ini");
        ini.section(Some(name)).cloned().expect("section present")
    }

    #[test]
    fn reads_batch_options() {
        let props = section(
            "[batch]\n\
             server_url = https://collector.example.com/sync\n\
             app_id = app\n\
             secondary_server_url = https://backup.example.com/sync\n\
             secondary_app_id = backup\n\
             batch_size = 75\n\
             timeout_ms = 1500\n\
             compress = no\n\
             cache_capacity = 8\n\
             auto_flush = true\n\
             interval_secs = 10\n",
            "batch",
        );
        let config = batch_builder(&props).expect("builder").config().expect("config");
        assert_eq!(config.primary.app_id, "app");
        assert_eq!(config.secondary.as_ref().map(|e| e.app_id.as_str()), Some("backup"));
        assert_eq!(config.effective_batch_size(), 75);
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert!(!config.compress);
        assert_eq!(config.effective_cache_capacity(), 8);
        assert!(config.auto_flush);
        assert_eq!(config.flush_interval, Duration::from_secs(10));
    }

    #[test]
    fn reads_log_options() {
        let props = section(
            "[log]\n\
             directory = /tmp/events\n\
             rotate_mode = Hourly\n\
             file_size_mb = 3\n\
             file_name_prefix = event\n\
             mirror_directory = /tmp/events-copy\n\
             capacity = 64\n",
            "log",
        );
        let config = log_builder(&props).expect("builder").config().expect("config");
        assert_eq!(config.rotate_mode, RotateMode::Hourly);
        assert_eq!(config.max_file_bytes, 3 * 1024 * 1024);
        assert_eq!(config.file_name_prefix.as_deref(), Some("event"));
        assert_eq!(config.effective_queue_capacity(), 64);
    }

    #[rstest]
    #[case("[batch]\nserver_url = http://localhost\nbatch_size = lots\n", "batch_size")]
    #[case("[batch]\nserver_url = http://localhost\ncompress = maybe\n", "compress")]
    #[case("[log]\ndirectory = /tmp/x\nfile_size_mb = -1\n", "file_size_mb")]
    fn rejects_invalid_values(#[case] text: &str, #[case] bad_key: &str) {
        let err = deliverer_from_ini_str("test.ini", text).expect_err("invalid value");
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == bad_key));
    }

    #[test]
    fn rejects_unknown_rotate_mode() {
        let text = "[log]\ndirectory = /tmp/x\nrotate_mode = weekly\n";
        let err = deliverer_from_ini_str("test.ini", text).expect_err("unknown mode");
        assert!(matches!(err, ConfigError::UnknownRotateMode(_)));
    }

    #[test]
    fn requires_a_known_section() {
        let err = deliverer_from_ini_str("test.ini", "[other]\nkey = value\n")
            .expect_err("no section");
        assert!(matches!(err, ConfigError::MissingSection(origin) if origin == "test.ini"));
    }

    #[test]
    fn reports_missing_file() {
        let dir = tempdir().expect("tempdir");
        let err = deliverer_from_ini_file(dir.path().join("absent.ini")).expect_err("missing");
        assert!(matches!(
            err,
            ConfigError::Parse { reason, .. } if reason.contains("doesn't exist")
        ));
    }

    #[test]
    fn builds_log_writer_from_file() {
        let dir = tempdir().expect("tempdir");
        let events = dir.path().join("events");
        let mut file = NamedTempFile::new().expect("temp ini");
        writeln!(file, "[log]\ndirectory = {}\n", events.display()).expect("write ini");

        let deliverer = deliverer_from_ini_file(file.path()).expect("deliverer");
        assert!(format!("{deliverer:?}").starts_with("LogWriter"));
        deliverer.close().expect("close");
        assert!(events.is_dir());
    }
}
