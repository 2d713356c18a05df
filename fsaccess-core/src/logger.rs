//! Bridge from the `log` facade to a host-provided logger.

use std::fmt;
use std::sync::{Arc, OnceLock};

use web_time::Instant;

/// Trait representing a sink for diagnostic messages emitted by the adapter.
///
/// The host application implements this to route adapter diagnostics into
/// its own logging. Messages are fire-and-forget: nothing the logger does
/// can affect the outcome of a storage operation.
///
/// # Examples
///
/// ```rust
/// use fsaccess_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Per-operation diagnostics (handle state, timings).
    Debug,
    /// Informational messages.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Failed operations.
    Error,
}

impl LogLevel {
    /// Lowercase name, as used by browser consoles.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Forwards `log` records to the user-provided [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        let is_record_from_fsaccess = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("fsaccess"));

        let is_debug_or_trace_level =
            record.level() == log::Level::Debug || record.level() == log::Level::Trace;

        // Other crates' debug chatter stays out of the host log.
        if is_debug_or_trace_level && !is_record_from_fsaccess {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Only the first call takes effect; later calls are ignored. If another
/// `log` implementation is already installed the adapter's records go to
/// that one instead.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        log::debug!("Logger already set");
        return;
    }

    static LOGGER: ForeignLogger = ForeignLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}

/// Timing helper for diagnostic messages.
///
/// Displays as the elapsed time since [`Stopwatch::start`], e.g. `12ms`.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Starts timing now.
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Whole milliseconds elapsed since the stopwatch started.
    #[must_use]
    pub fn elapsed_ms(&self) -> u128 {
        self.started.elapsed().as_millis()
    }
}

impl fmt::Display for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.elapsed_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopwatch_display() {
        let ts = Stopwatch::start();
        let shown = ts.to_string();
        assert!(shown.ends_with("ms"));
        assert!(shown.trim_end_matches("ms").parse::<u128>().is_ok());
    }

    #[test]
    fn test_level_names() {
        assert_eq!(log_level(log::Level::Warn), LogLevel::Warn);
        assert_eq!(LogLevel::Debug.as_str(), "debug");
    }
}
