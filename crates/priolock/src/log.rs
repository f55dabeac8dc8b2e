//! # Event Log
//!
//! The run's human-readable trace on stdout:
//!
//! ```text
//! Time[s] Thread Msg
//!   0.000 main   Restricted execution to a single core (cpu 1)
//!   0.001 aux    Locked mutex
//!   1.002 main   timedlock done (1.000815 seconds)
//! ```
//!
//! One line per event: elapsed seconds (7 wide, 3 decimals), the thread tag
//! padded to 6, then the message. The thread that created the log is
//! `main`, every other thread is `aux`. Lines from the two threads never
//! interleave mid-line.
//!
//! Every line is also emitted as a `tracing` event under target `priolock`.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use priolock_core::ProcessClock;

/// First line of every run.
pub const LOG_HEADER: &str = "Time[s] Thread Msg";

/// Tag of the thread that owns the log.
pub const MAIN_TAG: &str = "main";

/// Tag of every other thread.
pub const AUX_TAG: &str = "aux";

/// Formats one log line (without the newline).
#[must_use]
pub fn format_line(elapsed_secs: f64, tag: &str, message: &dyn fmt::Display) -> String {
    format!("{elapsed_secs:7.3} {tag:<6} {message}")
}

/// Timestamped, thread-tagged log shared by main and aux.
pub struct EventLog {
    clock: ProcessClock,
    main_thread: ThreadId,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl EventLog {
    /// Log writing to stdout, owned by the calling thread.
    #[must_use]
    pub fn stdout() -> Self {
        Self::with_sink(io::stdout())
    }

    /// Log writing to `sink`, owned by the calling thread.
    ///
    /// The process clock starts now.
    #[must_use]
    pub fn with_sink(sink: impl Write + Send + 'static) -> Self {
        Self {
            clock: ProcessClock::start(),
            main_thread: thread::current().id(),
            sink: Mutex::new(Box::new(sink)),
        }
    }

    /// Clock all timestamps are relative to.
    #[inline]
    #[must_use]
    pub const fn clock(&self) -> &ProcessClock {
        &self.clock
    }

    /// Tag for the calling thread.
    #[must_use]
    pub fn thread_tag(&self) -> &'static str {
        if thread::current().id() == self.main_thread {
            MAIN_TAG
        } else {
            AUX_TAG
        }
    }

    /// Writes the column header.
    pub fn header(&self) {
        self.write_line(LOG_HEADER);
    }

    /// Records one event from the calling thread.
    pub fn record(&self, message: impl fmt::Display) {
        let elapsed = self.clock.elapsed_secs();
        let tag = self.thread_tag();
        tracing::info!(target: "priolock", thread = tag, elapsed_s = elapsed, "{message}");
        self.write_line(&format_line(elapsed, tag, &message));
    }

    /// Header plus one fatal line, for a run rejected before it started.
    pub fn record_startup_failure(&self, err: impl fmt::Display) {
        self.header();
        tracing::error!(target: "priolock", error = %err, "run rejected before start");
        self.record(err);
    }

    fn write_line(&self, line: &str) {
        let mut sink = self.sink.lock();
        // A closed stdout must not take the scenario down with it.
        let _ = writeln!(sink, "{line}");
        let _ = sink.flush();
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLog")
            .field("clock", &self.clock)
            .field("main_thread", &self.main_thread)
            .finish_non_exhaustive()
    }
}

/// One parsed log line.
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    /// Seconds since the log was created.
    pub elapsed_secs: f64,
    /// `main` or `aux`.
    pub tag: String,
    /// Free text.
    pub message: String,
}

impl LogEntry {
    /// Parses a line produced by [`EventLog::record`].
    ///
    /// Returns `None` for the header and anything else not in that shape.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let (time, rest) = line.trim_start().split_once(' ')?;
        let elapsed_secs = time.parse().ok()?;
        let (tag, message) = rest.trim_start().split_once(' ')?;
        Some(Self {
            elapsed_secs,
            tag: tag.to_owned(),
            message: message.trim_start().to_owned(),
        })
    }
}

/// In-memory sink that can be read back while the log is still in use.
#[derive(Clone, Debug, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Parsed event lines, header excluded.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.contents().lines().filter_map(LogEntry::parse).collect()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_shape() {
        let line = format_line(1.23456, "aux", &"Locked mutex");
        assert_eq!(line, "  1.235 aux    Locked mutex");
    }

    #[test]
    fn test_header_then_tagged_lines() {
        let buffer = CaptureBuffer::new();
        let log = EventLog::with_sink(buffer.clone());

        log.header();
        log.record("from main");
        std::thread::scope(|s| {
            s.spawn(|| log.record(format_args!("from aux {}", 7)));
        });

        let contents = buffer.contents();
        assert_eq!(contents.lines().next(), Some(LOG_HEADER));

        let entries = buffer.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tag, MAIN_TAG);
        assert_eq!(entries[0].message, "from main");
        assert_eq!(entries[1].tag, AUX_TAG);
        assert_eq!(entries[1].message, "from aux 7");
        assert!(entries[1].elapsed_secs >= entries[0].elapsed_secs);
    }

    #[test]
    fn test_parse_rejects_header() {
        assert!(LogEntry::parse(LOG_HEADER).is_none());
        assert!(LogEntry::parse("").is_none());
    }

    #[test]
    fn test_parse_keeps_message_spaces() {
        let entry = LogEntry::parse("  0.500 main   timedlock done (0.2 seconds)").unwrap();
        assert_eq!(entry.tag, "main");
        assert_eq!(entry.message, "timedlock done (0.2 seconds)");
        assert!((entry.elapsed_secs - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_startup_failure_goes_to_the_log() {
        let buffer = CaptureBuffer::new();
        let log = EventLog::with_sink(buffer.clone());

        log.record_startup_failure("cpu 9999 is outside the cpu set");

        let contents = buffer.contents();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(LOG_HEADER));
        let entry = LogEntry::parse(lines.next().unwrap()).unwrap();
        assert_eq!(entry.tag, MAIN_TAG);
        assert_eq!(entry.message, "cpu 9999 is outside the cpu set");
        assert!(lines.next().is_none());
    }
}
