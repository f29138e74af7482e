use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
    sync::Mutex,
};

use log::{LevelFilter, Log, Metadata, Record};

use super::LogEntry;

/// Appends every record as a JSON line to a file.
pub struct BackgroundLog {
    target: Mutex<File>,
    max_level: LevelFilter,
}

impl BackgroundLog {
    /// Opens `target` for appending, creating it when missing.
    pub fn open(target: impl AsRef<Path>) -> Result<Self, io::Error> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(target.as_ref())?;

        Ok(Self {
            target: Mutex::new(file),
            max_level: LevelFilter::Trace,
        })
    }

    pub fn with_max_level(self, max_level: LevelFilter) -> Self {
        Self { max_level, ..self }
    }

    pub fn into_logger(self) -> Box<dyn Log> {
        Box::new(self)
    }

    fn write_entry(&self, record: &Record) -> Result<(), Box<dyn std::error::Error + '_>> {
        let mut line = serde_json::to_string(&LogEntry::from(record))?;
        line.push('\n');

        let mut file = self.target.lock()?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl Log for BackgroundLog {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        // Best effort, a failed write must not take the driver down
        let _ = self.write_entry(record);
    }

    fn flush(&self) {
        if let Ok(mut file) = self.target.lock() {
            let _ = file.flush();
        }
    }
}
