//! Logging for the Galaxy3D GPU core
//!
//! Entries go through a replaceable global `Logger`. The frame loop runs on
//! two threads, so every entry records the name of the thread that emitted
//! it (`main`, `galaxy3d-render`, ...). Only `gpu_error!` captures its call
//! site.
//!
//! The logger is the only process-wide state in this crate. Descriptor
//! tables, pools and frame slots live in an explicit `GpuContext`.

use std::sync::OnceLock;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use colored::*;
use parking_lot::RwLock;

/// Destination of every log entry
///
/// ```no_run
/// use galaxy_3d_gpu_core::galaxy3d::log::{set_logger, LogEntry, LogSeverity, Logger};
///
/// struct ErrorsOnly;
///
/// impl Logger for ErrorsOnly {
///     fn log(&self, entry: &LogEntry) {
///         if entry.severity == LogSeverity::Error {
///             eprintln!("{}: {}", entry.source, entry.message);
///         }
///     }
/// }
///
/// set_logger(ErrorsOnly);
/// ```
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// One log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Emitting component, e.g. `"galaxy3d::FramePipeline"`
    pub source: String,
    pub message: String,
    /// Name of the emitting thread, `None` for unnamed threads
    pub thread: Option<String>,
    /// Call site file (`gpu_error!` only)
    pub file: Option<&'static str>,
    /// Call site line (`gpu_error!` only)
    pub line: Option<u32>,
}

impl LogEntry {
    fn new(
        severity: LogSeverity,
        source: &str,
        message: String,
        call_site: Option<(&'static str, u32)>,
    ) -> Self {
        Self {
            severity,
            timestamp: SystemTime::now(),
            source: source.to_string(),
            message,
            thread: std::thread::current().name().map(str::to_string),
            file: call_site.map(|(file, _)| file),
            line: call_site.map(|(_, line)| line),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    /// Per-frame detail (slot waits, pool hits)
    Trace,
    /// Evictions, deferred destructions, thread start/stop
    Debug,
    /// Lifecycle
    Info,
    /// Recoverable (transient present failure)
    Warn,
    /// Device lost, initialization failure
    Error,
}

impl LogSeverity {
    fn label(self) -> ColoredString {
        match self {
            LogSeverity::Trace => "TRACE".dimmed(),
            LogSeverity::Debug => "DEBUG".blue(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow().bold(),
            LogSeverity::Error => "ERROR".white().on_red().bold(),
        }
    }
}

/// Prints to stdout, errors to stderr:
///
/// ```text
/// 14:02:11.084 INFO  [main] galaxy3d::Device: 'demo' initialized ...
/// 14:02:19.310 ERROR [galaxy3d-render] galaxy3d::FramePipeline: GPU device removed ... (frame_pipeline.rs:212)
/// ```
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let time: DateTime<Local> = entry.timestamp.into();
        let mut line = format!(
            "{} {} [{}] {}: {}",
            time.format("%H:%M:%S%.3f"),
            entry.severity.label(),
            entry.thread.as_deref().unwrap_or("?"),
            entry.source.cyan(),
            entry.message
        );
        if let (Some(file), Some(number)) = (entry.file, entry.line) {
            line.push_str(&format!(" ({}:{})", file, number).dimmed().to_string());
        }

        if entry.severity >= LogSeverity::Error {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    }
}

// ===== GLOBAL LOGGER =====

static LOGGER: OnceLock<RwLock<Box<dyn Logger>>> = OnceLock::new();

fn logger() -> &'static RwLock<Box<dyn Logger>> {
    LOGGER.get_or_init(|| RwLock::new(Box::new(DefaultLogger)))
}

/// Replace the active logger
pub fn set_logger<L: Logger + 'static>(logger_impl: L) {
    *logger().write() = Box::new(logger_impl);
}

/// Restore the `DefaultLogger`
pub fn reset_logger() {
    *logger().write() = Box::new(DefaultLogger);
}

/// Log without call-site information (`gpu_trace!` to `gpu_warn!`)
pub fn log(severity: LogSeverity, source: &str, message: String) {
    logger().read().log(&LogEntry::new(severity, source, message, None));
}

/// Log with the caller's file and line (`gpu_error!`)
pub fn log_detailed(
    severity: LogSeverity,
    source: &str,
    message: String,
    file: &'static str,
    line: u32,
) {
    logger()
        .read()
        .log(&LogEntry::new(severity, source, message, Some((file, line))));
}

// ===== LOGGING MACROS =====

/// Log a TRACE message
#[macro_export]
macro_rules! gpu_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! gpu_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
///
/// # Example
///
/// ```ignore
/// gpu_info!("galaxy3d::Device", "Initialized with {} frames in flight", count);
/// ```
#[macro_export]
macro_rules! gpu_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! gpu_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log(
            $crate::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! gpu_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::log::log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
