//! Progress reporting for long-running loads
//!
//! Loading a multi-gigabyte model can take minutes, so decoders report
//! labelled phases and periodic messages to a [`ProgressSink`]. Sinks are
//! best-effort: none of their methods can fail, and a sink that writes to
//! a broken pipe simply drops the message.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Receives progress from decoders
pub trait ProgressSink: Send + Sync {
    /// Begin a labelled phase. Phases nest.
    fn start(&self, label: &str);

    /// End the innermost open phase.
    fn end(&self);

    /// Free-form progress message.
    fn log(&self, message: &str);

    /// End the innermost phase and immediately start another.
    fn end_and_start(&self, label: &str) {
        self.end();
        self.start(label);
    }
}

/// Open phase that ends when dropped, on success and error paths alike
pub(crate) struct Phase<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> Phase<'a> {
    pub(crate) fn start(sink: &'a dyn ProgressSink, label: &str) -> Self {
        sink.start(label);
        Self { sink }
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        self.sink.end();
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&self, _label: &str) {}
    fn end(&self) {}
    fn log(&self, _message: &str) {}
}

/// Stack of open phases with their start times
#[derive(Default)]
struct PhaseStack {
    phases: Mutex<Vec<(String, Instant)>>,
}

impl PhaseStack {
    fn push(&self, label: &str) -> usize {
        let mut phases = self.phases.lock();
        phases.push((label.to_string(), Instant::now()));
        phases.len() - 1
    }

    fn pop(&self) -> Option<(String, Duration, usize)> {
        let mut phases = self.phases.lock();
        let (label, started) = phases.pop()?;
        Some((label, started.elapsed(), phases.len()))
    }

    fn depth(&self) -> usize {
        self.phases.lock().len()
    }
}

/// Sends progress to the `log` facade at info level, with phase timings
#[derive(Default)]
pub struct LogProgress {
    stack: PhaseStack,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn start(&self, label: &str) {
        let depth = self.stack.push(label);
        log::info!("{:indent$}{}", "", label, indent = depth * 2);
    }

    fn end(&self) {
        if let Some((label, elapsed, depth)) = self.stack.pop() {
            log::info!(
                "{:indent$}{} took {:.3}s",
                "",
                label,
                elapsed.as_secs_f64(),
                indent = depth * 2
            );
        }
    }

    fn log(&self, message: &str) {
        let depth = self.stack.depth();
        log::info!("{:indent$}{}", "", message, indent = depth * 2);
    }
}

/// Writes progress lines to any `Write`, ignoring write failures
pub struct WriterProgress<W: Write + Send> {
    out: Mutex<W>,
    stack: PhaseStack,
}

impl<W: Write + Send> WriterProgress<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            stack: PhaseStack::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, depth: usize, line: std::fmt::Arguments<'_>) {
        let mut out = self.out.lock();
        if let Err(e) = write_line(&mut *out, depth, line) {
            log::debug!("dropping progress message: {}", e);
        }
    }
}

fn write_line(
    out: &mut impl Write,
    depth: usize,
    line: std::fmt::Arguments<'_>,
) -> io::Result<()> {
    write!(out, "{:indent$}", "", indent = depth * 2)?;
    out.write_fmt(line)?;
    out.write_all(b"\n")
}

impl<W: Write + Send> ProgressSink for WriterProgress<W> {
    fn start(&self, label: &str) {
        let depth = self.stack.push(label);
        self.emit(depth, format_args!("{}", label));
    }

    fn end(&self) {
        if let Some((label, elapsed, depth)) = self.stack.pop() {
            self.emit(
                depth,
                format_args!("{} took {:.3}s", label, elapsed.as_secs_f64()),
            );
        }
    }

    fn log(&self, message: &str) {
        self.emit(self.stack.depth(), format_args!("{}", message));
    }
}

/// Rate limiter for periodic progress messages
#[derive(Debug)]
pub(crate) struct Throttle {
    interval: Duration,
    last: Instant,
}

impl Throttle {
    pub(crate) fn every(interval: Duration) -> Self {
        Self {
            interval,
            last: Instant::now(),
        }
    }

    /// True at most once per interval
    pub(crate) fn ready(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last) > self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
