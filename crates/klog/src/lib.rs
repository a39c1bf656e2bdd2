//! Kernel logging backend.
//!
//! Implements the `log` facade on top of a [`Sink`]: anything that accepts
//! text (a UART, a framebuffer console, a test buffer). Records are written
//! as one coloured line each. A failing sink never propagates an error to
//! the code that logged.
#![cfg_attr(not(test), no_std)]

use core::fmt::{self, Write};
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => " INFO",
            Level::Warn => " WARN",
            Level::Error => "ERROR",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Level::Trace => "\x1b[90m", // Gray
            Level::Debug => "\x1b[36m", // Cyan
            Level::Info => "\x1b[32m",  // Green
            Level::Warn => "\x1b[33m",  // Yellow
            Level::Error => "\x1b[31m", // Red
        }
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Trace => Level::Trace,
            log::Level::Debug => Level::Debug,
            log::Level::Info => Level::Info,
            log::Level::Warn => Level::Warn,
            log::Level::Error => Level::Error,
        }
    }
}

/// Destination for formatted log text.
///
/// `Send + Sync` because the logger behind it is installed process-wide.
pub trait Sink: Sync + Send {
    fn write_str(&self, s: &str) -> fmt::Result;
}

impl<S: Sink + ?Sized> Sink for &S {
    fn write_str(&self, s: &str) -> fmt::Result {
        (**self).write_str(s)
    }
}

/// Adapts a shared sink to `fmt::Write` for the duration of one record.
struct SinkWriter<'a, S: ?Sized>(&'a S);

impl<S: Sink + ?Sized> Write for SinkWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s)
    }
}

/// `log::Log` implementation writing to a [`Sink`].
pub struct Logger<S> {
    sink: S,
    level: LevelFilter,
    color: bool,
    /// Keeps records from interleaving. Only ever try-locked: a record
    /// logged from an interrupt that preempted another record is dropped
    /// rather than deadlocking.
    line: Mutex<()>,
    dropped: AtomicUsize,
}

impl<S: Sink> Logger<S> {
    pub const fn new(sink: S, level: LevelFilter) -> Self {
        Self {
            sink,
            level,
            color: true,
            line: Mutex::new(()),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Disables ANSI colour sequences (for sinks that are not terminals).
    pub const fn without_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Records discarded because another record was being written.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    fn write_record(&self, record: &Record) -> fmt::Result {
        let level = Level::from(record.level());
        let mut out = SinkWriter(&self.sink);
        if self.color {
            write!(out, "{}[{}]\x1b[0m ", level.color(), level.as_str())?;
        } else {
            write!(out, "[{}] ", level.as_str())?;
        }
        writeln!(out, "{}: {}", record.target(), record.args())
    }
}

impl<S: Sink> Log for Logger<S> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(_line) = self.line.try_lock() else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        // Sink failures are not the caller's problem.
        let _ = self.write_record(record);
    }

    fn flush(&self) {}
}

/// Installs `logger` as the global `log` backend.
pub fn init<S: Sink + 'static>(logger: &'static Logger<S>) -> Result<(), SetLoggerError> {
    log::set_logger(logger)?;
    log::set_max_level(logger.level);
    Ok(())
}
