use serde::{Deserialize, Serialize};

pub(crate) mod background_log;
pub(crate) mod multilog;

/// One line of the JSON log file.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    pub target: String,
    pub module: String,
    pub file: String,
    pub line: u32,
}

#[derive(Debug, Serialize, Deserialize, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl From<log::Level> for Level {
    fn from(value: log::Level) -> Self {
        match value {
            log::Level::Error => Level::Error,
            log::Level::Warn => Level::Warn,
            log::Level::Info => Level::Info,
            log::Level::Debug => Level::Debug,
            log::Level::Trace => Level::Trace,
        }
    }
}

impl From<&log::Record<'_>> for LogEntry {
    fn from(record: &log::Record) -> Self {
        Self {
            level: record.level().into(),
            message: record.args().to_string(),
            target: record.target().into(),
            module: record.module_path().unwrap_or_default().into(),
            file: record.file().unwrap_or_default().into(),
            line: record.line().unwrap_or_default(),
        }
    }
}
