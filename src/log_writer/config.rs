//! Configuration structures for [`LogWriter`](super::LogWriter).

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::ConfigError;

/// Default bounded queue size between producers and the writer thread.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// Time bucket that selects the current log file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RotateMode {
    /// One file per calendar day.
    #[default]
    Daily,
    /// One file per hour.
    Hourly,
}

impl RotateMode {
    /// `chrono` format string rendering the bucket part of a file name.
    pub fn bucket_format(&self) -> &'static str {
        match self {
            Self::Daily => "%Y-%m-%d",
            Self::Hourly => "%Y-%m-%d-%H",
        }
    }
}

impl FromStr for RotateMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "hourly" => Ok(Self::Hourly),
            _ => Err(ConfigError::UnknownRotateMode(value.trim().to_owned())),
        }
    }
}

/// Options for a log writer.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Directory receiving the primary files. Created if missing.
    pub directory: PathBuf,
    /// Time bucket used in file names.
    pub rotate_mode: RotateMode,
    /// Size in bytes above which the next record opens a new shard.
    /// `0` disables size-based rotation and the shard suffix.
    pub max_file_bytes: u64,
    /// Optional file name prefix, joined to the name with a `.`.
    pub file_name_prefix: Option<String>,
    /// Directory receiving a verbatim copy of every line.
    pub mirror_directory: Option<PathBuf>,
    /// Bounded queue capacity; `0` selects [`DEFAULT_QUEUE_CAPACITY`].
    pub queue_capacity: usize,
}

impl LogConfig {
    /// Daily rotation into `directory` with no size limit or mirror.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            rotate_mode: RotateMode::default(),
            max_file_bytes: 0,
            file_name_prefix: None,
            mirror_directory: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Queue capacity after applying the default.
    pub fn effective_queue_capacity(&self) -> usize {
        match self.queue_capacity {
            0 => DEFAULT_QUEUE_CAPACITY,
            capacity => capacity,
        }
    }

    /// Mirror directory, ignoring an empty path.
    pub fn mirror(&self) -> Option<&Path> {
        self.mirror_directory
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    /// Check required fields and the primary/mirror distinction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.as_os_str().is_empty() {
            return Err(ConfigError::Empty("directory"));
        }
        if let Some(mirror) = self.mirror()
            && same_directory(&self.directory, mirror)
        {
            return Err(ConfigError::SameDirectories);
        }
        Ok(())
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    if a.components().eq(b.components()) {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Builder for constructing [`LogWriter`](super::LogWriter) instances.
#[derive(Clone, Debug, Default)]
pub struct LogWriterBuilder {
    directory: Option<PathBuf>,
    rotate_mode: RotateMode,
    max_file_bytes: u64,
    file_name_prefix: Option<String>,
    mirror_directory: Option<PathBuf>,
    queue_capacity: Option<usize>,
}

impl LogWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary directory (required).
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn with_rotate_mode(mut self, mode: RotateMode) -> Self {
        self.rotate_mode = mode;
        self
    }

    /// Start a new shard once a file exceeds `bytes`.
    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    /// Start a new shard once a file exceeds `mib` mebibytes.
    pub fn with_max_file_size_mb(self, mib: u64) -> Self {
        self.with_max_file_bytes(mib.saturating_mul(BYTES_PER_MIB))
    }

    pub fn with_file_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_name_prefix = Some(prefix.into());
        self
    }

    /// Duplicate every line into `directory`.
    pub fn with_mirror_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.mirror_directory = Some(directory.into());
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    /// Resolve the builder into a validated configuration.
    pub fn config(&self) -> Result<LogConfig, ConfigError> {
        let directory = self.directory.clone().ok_or(ConfigError::Empty("directory"))?;
        let config = LogConfig {
            rotate_mode: self.rotate_mode,
            max_file_bytes: self.max_file_bytes,
            file_name_prefix: self.file_name_prefix.clone().filter(|p| !p.is_empty()),
            mirror_directory: self.mirror_directory.clone(),
            queue_capacity: self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY),
            ..LogConfig::new(directory)
        };
        config.validate()?;
        Ok(config)
    }

    /// Build a writer using the system clock.
    pub fn build(&self) -> Result<super::LogWriter, ConfigError> {
        super::LogWriter::with_config(self.config()?)
    }
}
