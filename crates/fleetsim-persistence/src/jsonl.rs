//! ---
//! fleetsim_section: "03-persistence-logging"
//! fleetsim_subsection: "module"
//! fleetsim_type: "source"
//! fleetsim_scope: "code"
//! fleetsim_description: "Append-only JSONL sink with per-stream files."
//! fleetsim_version: "v0.0.0-prealpha"
//! fleetsim_owner: "tbd"
//! ---
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleetsim_common::records::{AlertRecord, TelemetryRecord};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{Result, TelemetrySink};

/// On-disk format version written to every stream header.
pub const STREAM_VERSION: u16 = 1;

/// File name of the telemetry stream inside the sink directory.
pub const TELEMETRY_STREAM: &str = "telemetry.jsonl";

/// File name of the alert stream inside the sink directory.
pub const ALERT_STREAM: &str = "alerts.jsonl";

/// Stream file header stored as the first line of each file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StreamHeader {
    version: u16,
    created_at: DateTime<Utc>,
}

impl StreamHeader {
    fn new() -> Self {
        Self {
            version: STREAM_VERSION,
            created_at: Utc::now(),
        }
    }
}

struct StreamWriter {
    writer: BufWriter<File>,
}

impl StreamWriter {
    fn open(path: &Path) -> Result<Self> {
        let exists = path.exists() && fs::metadata(path)?.len() > 0;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if !exists {
            let line = serde_json::to_string(&StreamHeader::new())?;
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok(Self { writer })
    }

    fn append<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Append-only sink writing one JSONL file per record stream. Each file
/// starts with a version header line; every record is flushed on append so a
/// crash loses at most the record being written.
pub struct JsonlSink {
    directory: PathBuf,
    telemetry: Mutex<StreamWriter>,
    alerts: Mutex<StreamWriter>,
}

impl JsonlSink {
    /// Open (or create) the sink directory and both stream files.
    pub fn open(directory: &Path) -> Result<Self> {
        fs::create_dir_all(directory)?;
        let telemetry = StreamWriter::open(&directory.join(TELEMETRY_STREAM))?;
        let alerts = StreamWriter::open(&directory.join(ALERT_STREAM))?;
        Ok(Self {
            directory: directory.to_path_buf(),
            telemetry: Mutex::new(telemetry),
            alerts: Mutex::new(alerts),
        })
    }

    /// Directory the stream files live in.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the telemetry stream file.
    pub fn telemetry_path(&self) -> PathBuf {
        self.directory.join(TELEMETRY_STREAM)
    }

    /// Path of the alert stream file.
    pub fn alert_path(&self) -> PathBuf {
        self.directory.join(ALERT_STREAM)
    }
}

#[async_trait]
impl TelemetrySink for JsonlSink {
    async fn store_telemetry(&self, record: &TelemetryRecord) -> Result<()> {
        self.telemetry.lock().append(record)
    }

    async fn store_alert(&self, record: &AlertRecord) -> Result<()> {
        self.alerts.lock().append(record)
    }
}

/// Read every record of a stream file in append order, skipping the header.
pub fn read_stream<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut records = Vec::new();
    for line in reader.lines().skip(1) {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}
