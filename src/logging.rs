/// Structured logging for the propagation service
///
/// Provides context-rich logging with data-source tags, optional station
/// identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for CGI/daemon operation.
///
/// Map and band endpoints write their payload to stdout, so every log line
/// goes to stderr or the log file, never stdout.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Ionosonde,
    SpaceWeather,
    Model,
    Render,
    Cache,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Ionosonde => write!(f, "IONO"),
            DataSource::SpaceWeather => write!(f, "SWX"),
            DataSource::Model => write!(f, "MODEL"),
            DataSource::Render => write!(f, "RENDER"),
            DataSource::Cache => write!(f, "CACHE"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Routine: scraper file not written yet, feed between cycles.
    Expected,
    /// The upstream is broken or changed format.
    Unexpected,
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Process-wide sink. `None` until `init_logger` runs; logging before that
/// is silently dropped.
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    min_level: LogLevel,
    /// Appended to in addition to stderr.
    log_file: Option<String>,
    /// Full timestamped lines on stderr, or the short interactive form.
    console_timestamps: bool,
}

/// One formatted log line: `{ts} {LEVEL} {SOURCE}[ {id}]: {message}`.
pub fn format_entry(
    timestamp: &str,
    level: LogLevel,
    source: &DataSource,
    id: Option<&str>,
    message: &str,
) -> String {
    match id {
        Some(id) => format!("{} {} {} [{}]: {}", timestamp, level, source, id, message),
        None => format!("{} {} {}: {}", timestamp, level, source, message),
    }
}

impl Logger {
    fn write(&self, level: LogLevel, source: &DataSource, id: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let entry = format_entry(&timestamp, level, source, id, message);

        if self.console_timestamps {
            eprintln!("{}", entry);
        } else {
            let tag = id.map(|i| format!("{}/{}", source, i)).unwrap_or_else(|| source.to_string());
            eprintln!("{:<5} {:<12} {}", level, tag, message);
        }

        if let Some(path) = &self.log_file {
            let appended = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .and_then(|mut file| writeln!(file, "{}", entry));
            if let Err(e) = appended {
                eprintln!("hfprop: cannot append to log file {}: {}", path, e);
            }
        }
    }
}

fn dispatch(level: LogLevel, source: DataSource, id: Option<&str>, message: &str) {
    let guard = match LOGGER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(logger) = guard.as_ref() {
        logger.write(level, &source, id, message);
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Installs the process-wide logger, replacing any earlier one.
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    let logger = Logger {
        min_level,
        log_file: log_file.map(String::from),
        console_timestamps,
    };
    let mut slot = match LOGGER.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *slot = Some(logger);
}

/// Log a general informational message
pub fn info(source: DataSource, station: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, source, station, message);
}

/// Log a warning message
pub fn warn(source: DataSource, station: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, source, station, message);
}

/// Log an error message
pub fn error(source: DataSource, station: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, source, station, message);
}

/// Log a debug message
pub fn debug(source: DataSource, station: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, source, station, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an ionosonde feed failure based on the error text.
///
/// An empty station list happens between sounding cycles. HTTP errors and
/// unparseable bodies mean the feed itself is broken or has changed shape.
pub fn classify_feed_failure(error_message: &str) -> FailureType {
    if error_message.contains("No stations") {
        FailureType::Expected
    } else if error_message.contains("HTTP error") || error_message.contains("Parse error") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

/// Classify a space-weather flat-file failure.
///
/// A missing file usually means the scraper job has not run yet on a fresh
/// install, which is expected; malformed content is not.
pub fn classify_space_weather_failure(error_message: &str) -> FailureType {
    if error_message.contains("No such file") || error_message.contains("not found") {
        FailureType::Expected
    } else if error_message.contains("malformed") || error_message.contains("invalid") {
        FailureType::Unexpected
    } else {
        FailureType::Unknown
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an ionosonde feed failure with automatic classification
pub fn log_feed_failure(operation: &str, err: &dyn std::error::Error) {
    let error_msg = err.to_string();
    let failure_type = classify_feed_failure(&error_msg);

    let message = format!("{} failed [{}]: {}", operation, failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(DataSource::Ionosonde, None, &message),
        FailureType::Unexpected => error(DataSource::Ionosonde, None, &message),
        FailureType::Unknown => warn(DataSource::Ionosonde, None, &message),
    }
}

/// Log a space-weather read failure with classification
pub fn log_space_weather_failure(file: &str, error_msg: &str) {
    let failure_type = classify_space_weather_failure(error_msg);
    let message = format!("read failed [{}]: {}", failure_type, error_msg);

    match failure_type {
        FailureType::Expected => debug(DataSource::SpaceWeather, Some(file), &message),
        FailureType::Unexpected => error(DataSource::SpaceWeather, Some(file), &message),
        FailureType::Unknown => warn(DataSource::SpaceWeather, Some(file), &message),
    }
}

// ---------------------------------------------------------------------------
// Ingest Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of an ionosonde ingest pass
pub fn log_ingest_summary(total: usize, kept: usize, dropped: usize) {
    let message = format!(
        "Ingest complete: {}/{} stations kept, {} dropped",
        kept, total, dropped
    );

    if total == 0 || kept == 0 {
        warn(DataSource::Ionosonde, None, &message);
    } else {
        info(DataSource::Ionosonde, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_log_level_parses_config_spellings() {
        assert_eq!("info".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warning));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_entry_format() {
        let line = format_entry(
            "2024-05-01T12:00:00Z",
            LogLevel::Warning,
            &DataSource::Ionosonde,
            Some("RL052"),
            "stale",
        );
        assert_eq!(line, "2024-05-01T12:00:00Z WARN IONO [RL052]: stale");
        let line = format_entry("t", LogLevel::Info, &DataSource::Render, None, "done");
        assert_eq!(line, "t INFO RENDER: done");
    }

    #[test]
    fn test_feed_failure_classification() {
        assert_eq!(classify_feed_failure("HTTP error: 503"), FailureType::Unexpected);
        assert_eq!(
            classify_feed_failure("Parse error: expected value at line 1"),
            FailureType::Unexpected
        );
        assert_eq!(classify_feed_failure("No stations in feed response"), FailureType::Expected);
        assert_eq!(classify_feed_failure("Transport error: timed out"), FailureType::Unknown);
    }

    #[test]
    fn test_space_weather_failure_classification() {
        assert_eq!(
            classify_space_weather_failure("No such file or directory (os error 2)"),
            FailureType::Expected
        );
        assert_eq!(
            classify_space_weather_failure("malformed line: 'abc'"),
            FailureType::Unexpected
        );
    }
}
