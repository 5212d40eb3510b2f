//! CSV export sinks with fixed per-workflow schemas.
//!
//! Every workflow writes one file with one ordered column list. A missing
//! field is written as an explicit empty value, never dropped or
//! reordered. Sinks shared across worker tasks serialize writes behind a
//! mutex, so rows arrive whole in whatever order tasks complete.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::InventoryError;

pub const DNS_EXPORT_COLUMNS: &[&str] =
    &["AccountID", "HostedZoneName", "Name", "Type", "Value"];
pub const LB_EXPORT_COLUMNS: &[&str] = &[
    "AccountID",
    "LoadBalancerArn",
    "LoadBalancerName",
    "DNSName",
    "Type",
];
pub const ACL_EXPORT_COLUMNS: &[&str] = &["AccountID", "Region", "NetworkAclID", "IsDefault"];
pub const DKIM_EXPORT_COLUMNS: &[&str] = &["AccountID", "HostedZoneId", "DKIM_CNAME_Record"];
pub const CORRELATION_EXPORT_COLUMNS: &[&str] = &[
    "AccountID",
    "HostedZoneName",
    "RecordName",
    "RecordType",
    "LoadBalancerARNs",
];

/// A CSV sink bound to one fixed, ordered column schema.
pub struct CsvSink {
    writer: csv::Writer<File>,
    columns: &'static [&'static str],
}

impl CsvSink {
    /// Truncate the file and write the header row. An empty result set
    /// therefore still leaves a header-only file behind.
    pub fn create(path: &Path, columns: &'static [&'static str]) -> Result<Self, InventoryError> {
        let file = File::create(path)
            .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record(columns)
            .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
        writer
            .flush()
            .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Self { writer, columns })
    }

    /// Append without a header unless the file is empty or new.
    pub fn append(path: &Path, columns: &'static [&'static str]) -> Result<Self, InventoryError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
        let empty = file
            .metadata()
            .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?
            .len()
            == 0;

        let mut writer = csv::Writer::from_writer(file);
        if empty {
            writer
                .write_record(columns)
                .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
            writer
                .flush()
                .map_err(|e| InventoryError::Config(format!("{}: {}", path.display(), e)))?;
        }
        Ok(Self { writer, columns })
    }

    /// Write one row, padding missing trailing fields with explicit empty
    /// values so the schema never shifts.
    pub fn write_row<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<(), InventoryError> {
        let mut row: Vec<&str> = fields.iter().map(AsRef::as_ref).collect();
        while row.len() < self.columns.len() {
            row.push("");
        }
        self.writer
            .write_record(&row)
            .map_err(|e| InventoryError::Transient(format!("csv write: {e}")))
    }

    pub fn flush(&mut self) -> Result<(), InventoryError> {
        self.writer
            .flush()
            .map_err(|e| InventoryError::Transient(format!("csv flush: {e}")))
    }
}

/// A sink shared between concurrent enumeration tasks. One writer at a
/// time; rows are never interleaved.
pub type SharedSink = Arc<Mutex<CsvSink>>;

pub fn shared(sink: CsvSink) -> SharedSink {
    Arc::new(Mutex::new(sink))
}

pub fn write_shared<S: AsRef<str>>(sink: &SharedSink, fields: &[S]) -> Result<(), InventoryError> {
    let mut guard = sink.lock().unwrap_or_else(PoisonError::into_inner);
    guard.write_row(fields)
}

pub fn flush_shared(sink: &SharedSink) -> Result<(), InventoryError> {
    let mut guard = sink.lock().unwrap_or_else(PoisonError::into_inner);
    guard.flush()
}
