use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::models::Record;
use crate::utils;

/// Where emitted records go.
pub trait RecordSink {
    fn append(&mut self, record: &Record) -> Result<()>;
}

impl RecordSink for Vec<Record> {
    fn append(&mut self, record: &Record) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Appends one JSON object per line, flushed after every record.
pub struct JsonlStore {
    path: PathBuf,
    writer: BufWriter<File>,
    written: usize,
}

impl JsonlStore {
    pub fn open(path: &Path) -> Result<Self> {
        utils::ensure_parent(path)
            .with_context(|| format!("unable to create parent directory of {}", path.display()))?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("unable to open {} for appending", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl RecordSink for JsonlStore {
    fn append(&mut self, record: &Record) -> Result<()> {
        let line = serde_json::to_string(record)
            .with_context(|| format!("unable to serialize record {}", record.url))?;
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush())
            .with_context(|| format!("unable to write to {}", self.path.display()))?;
        self.written += 1;
        Ok(())
    }
}
