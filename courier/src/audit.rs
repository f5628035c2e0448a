//! Append-only, crash-safe record of attempt outcomes
//!
//! The log is a CSV file with a fixed header. It is created with its header
//! when absent and only ever appended to afterwards; every record is flushed
//! and synced before [`AuditLog::append`] returns.

use crate::errors::AuditError;
use crate::outcome::{AttemptOutcome, OutcomeKind};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const HEADER: [&str; 4] = ["PhoneNumber", "Message", "Status", "FailureReason"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    #[serde(rename = "PhoneNumber")]
    pub phone: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Status")]
    pub status: OutcomeKind,
    #[serde(rename = "FailureReason")]
    pub reason: String,
}

impl AuditRecord {
    pub fn new(
        phone: impl Into<String>,
        message: impl Into<String>,
        outcome: &AttemptOutcome,
    ) -> Self {
        Self {
            phone: phone.into(),
            message: message.into(),
            status: outcome.kind(),
            reason: outcome.reason().to_string(),
        }
    }
}

pub struct AuditLog {
    path: PathBuf,
    writer: csv::Writer<File>,
    appended: usize,
}

impl AuditLog {
    /// Open `path` for appending, creating it with the header if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| AuditError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        Self::from_file(path, file)
    }

    /// Wrap an already opened handle to the log at `path`.
    ///
    /// `file` must write at the end of the log, i.e. be opened in append mode.
    pub fn from_file(path: impl AsRef<Path>, mut file: File) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| AuditError::Io {
            path: path.display().to_string(),
            source,
        };
        let len = file.metadata().map_err(io_err)?.len();

        if len > 0 {
            check_existing(&path).map_err(io_err)?;
            // a crash mid-write can leave an unterminated last line
            if !ends_with_newline(&path).map_err(io_err)? {
                warn!(path = %path.display(), "Audit log ends mid-line; terminating it");
                file.write_all(b"\n").map_err(io_err)?;
            }
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if len == 0 {
            writer.write_record(HEADER).map_err(|source| AuditError::Encode {
                path: path.display().to_string(),
                source,
            })?;
            info!(path = %path.display(), "Created audit log");
        } else {
            debug!(path = %path.display(), bytes = len, "Appending to existing audit log");
        }

        let mut log = Self {
            path,
            writer,
            appended: 0,
        };
        log.sync()?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records appended through this handle.
    pub fn appended(&self) -> usize {
        self.appended
    }

    pub fn append(&mut self, record: &AuditRecord) -> Result<(), AuditError> {
        self.writer
            .serialize(record)
            .map_err(|source| AuditError::Encode {
                path: self.path.display().to_string(),
                source,
            })?;
        self.sync()?;
        self.appended += 1;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), AuditError> {
        let io_err = |source| AuditError::Io {
            path: self.path.display().to_string(),
            source,
        };
        self.writer.flush().map_err(io_err)?;
        self.writer.get_ref().sync_data().map_err(io_err)
    }

    /// Read every record of an audit log file.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<AuditRecord>, AuditError> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path).map_err(|source| AuditError::Encode {
            path: path.display().to_string(),
            source,
        })?;
        reader
            .deserialize()
            .collect::<Result<Vec<AuditRecord>, _>>()
            .map_err(|source| AuditError::Encode {
                path: path.display().to_string(),
                source,
            })
    }
}

fn check_existing(path: &Path) -> std::io::Result<()> {
    let mut first_line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first_line)?;
    let found: Vec<&str> = first_line.trim_end().split(',').map(str::trim).collect();
    if found != HEADER {
        // never rewrite an existing log, just flag it
        warn!(
            path = %path.display(),
            found = %first_line.trim_end(),
            expected = %HEADER.join(","),
            "Existing audit log has an unexpected header"
        );
    }
    Ok(())
}

fn ends_with_newline(path: &Path) -> std::io::Result<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}
