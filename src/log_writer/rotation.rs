//! Time- and size-based file selection for the log writer.
//!
//! A [`LogStream`] owns the open file for one directory. Before each line it
//! checks the time bucket and, when a size limit is set, the current file
//! length; either change opens a different file. Old files are never renamed
//! or removed.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;

use super::config::{LogConfig, RotateMode};

/// Renders file names of the form `[prefix.]log.<bucket>[_<shard>]`.
#[derive(Clone, Debug)]
pub(crate) struct FileNamer {
    prefix: Option<String>,
    mode: RotateMode,
    sharded: bool,
}

impl FileNamer {
    pub(crate) fn new(config: &LogConfig) -> Self {
        Self {
            prefix: config.file_name_prefix.clone(),
            mode: config.rotate_mode,
            sharded: config.max_file_bytes > 0,
        }
    }

    pub(crate) fn bucket(&self, now: NaiveDateTime) -> String {
        now.format(self.mode.bucket_format()).to_string()
    }

    pub(crate) fn file_name(&self, bucket: &str, shard: u32) -> String {
        let mut name = match &self.prefix {
            Some(prefix) => format!("{prefix}.log.{bucket}"),
            None => format!("log.{bucket}"),
        };
        if self.sharded {
            name.push_str(&format!("_{shard}"));
        }
        name
    }
}

struct OpenFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl OpenFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    /// Bytes on disk plus bytes still buffered.
    fn len(&self) -> io::Result<u64> {
        let on_disk = self.writer.get_ref().metadata()?.len();
        Ok(on_disk + self.writer.buffer().len() as u64)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}

/// The rotating output for a single directory.
pub(crate) struct LogStream {
    directory: PathBuf,
    max_bytes: u64,
    bucket: String,
    shard: u32,
    current: Option<OpenFile>,
}

impl LogStream {
    pub(crate) fn new(directory: &Path, max_bytes: u64) -> Self {
        Self {
            directory: directory.to_path_buf(),
            max_bytes,
            bucket: String::new(),
            shard: 0,
            current: None,
        }
    }

    /// Append `line` and a newline to the file selected for `bucket`.
    pub(crate) fn write_line(
        &mut self,
        namer: &FileNamer,
        bucket: &str,
        line: &str,
    ) -> io::Result<()> {
        self.select_file(namer, bucket)?;
        let open = self
            .current
            .as_mut()
            .ok_or_else(|| io::Error::other("no log file open"))?;
        open.writer.write_all(line.as_bytes())?;
        open.writer.write_all(b"\n")
    }

    fn select_file(&mut self, namer: &FileNamer, bucket: &str) -> io::Result<()> {
        if self.bucket != bucket {
            self.bucket = bucket.to_owned();
            self.shard = 0;
            return self.open_next(namer);
        }
        let full = match &self.current {
            None => return self.open_next(namer),
            Some(open) => self.over_limit(open)?,
        };
        if full {
            self.shard += 1;
            self.open_next(namer)?;
        }
        Ok(())
    }

    fn over_limit(&self, open: &OpenFile) -> io::Result<bool> {
        if self.max_bytes == 0 {
            return Ok(false);
        }
        Ok(open.len()? > self.max_bytes)
    }

    /// Close the current file and open the first shard of the current bucket
    /// that is not already over the limit.
    fn open_next(&mut self, namer: &FileNamer) -> io::Result<()> {
        self.close()?;
        loop {
            let path = self.directory.join(namer.file_name(&self.bucket, self.shard));
            let open = OpenFile::open(path)?;
            if self.over_limit(&open)? {
                self.shard += 1;
                continue;
            }
            self.current = Some(open);
            return Ok(());
        }
    }

    /// Flush buffered lines and sync the file to disk.
    pub(crate) fn sync(&mut self) -> io::Result<()> {
        match self.current.as_mut() {
            Some(open) => open.sync(),
            None => Ok(()),
        }
    }

    pub(crate) fn close(&mut self) -> io::Result<()> {
        match self.current.take() {
            Some(mut open) => open.sync(),
            None => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|open| open.path.as_path())
    }
}
