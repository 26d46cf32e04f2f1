use std::io::{ErrorKind, Read};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::foundation::core::Deadline;
use crate::foundation::error::{FfpipeError, FfpipeResult};
use crate::stream::descriptor::{StreamDescriptor, extract_output_stream};
use crate::stream::state::{StateCell, ThreadState};

/// Options for [`LogReader`].
#[derive(Clone, Debug, Default)]
pub struct LogReaderOpts {
    /// Echo each line through `tracing` (target `ffpipe::ffmpeg`, level `info`).
    pub echo: bool,
}

impl LogReaderOpts {
    /// Options with echo toggled.
    pub fn new(echo: bool) -> Self {
        Self { echo }
    }
}

/// Outcome of one search over the collected log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogSearch {
    /// Index of the first matching line.
    Found(usize),
    /// No match yet; more lines may arrive.
    NotYetAvailable,
    /// No match and the stream has ended.
    TerminalNoMatch,
}

#[derive(Debug, Default)]
struct LogBook {
    lines: Vec<String>,
    closed: bool,
}

impl LogBook {
    fn search(&self, prefix: &str, start: usize) -> LogSearch {
        let hit = self
            .lines
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, l)| l.starts_with(prefix));
        match hit {
            Some((i, _)) => LogSearch::Found(i),
            None if self.closed => LogSearch::TerminalNoMatch,
            None => LogSearch::NotYetAvailable,
        }
    }
}

type SharedLog = Arc<(Mutex<LogBook>, Condvar)>;

fn lock(shared: &SharedLog) -> MutexGuard<'_, LogBook> {
    shared.0.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Background reader of ffmpeg's diagnostic stream.
///
/// Collects non-blank lines in arrival order and lets callers wait for a line with a given
/// prefix.
pub struct LogReader {
    opts: LogReaderOpts,
    shared: SharedLog,
    state: StateCell<ThreadState>,
    handle: Option<JoinHandle<()>>,
}

impl LogReader {
    /// Reader that has not been started.
    pub fn new(opts: LogReaderOpts) -> Self {
        Self {
            opts,
            shared: Arc::new((Mutex::new(LogBook::default()), Condvar::new())),
            state: StateCell::new(ThreadState::Idle),
            handle: None,
        }
    }

    /// Start pumping `source` on a background thread.
    pub fn start<R: Read + Send + 'static>(&mut self, source: R) -> FfpipeResult<()> {
        if self.state.get() != ThreadState::Idle {
            return Err(FfpipeError::validation("log reader was already started"));
        }
        let shared = Arc::clone(&self.shared);
        let state = self.state.clone();
        let echo = self.opts.echo;
        self.state.advance(ThreadState::Running);
        let handle = std::thread::Builder::new()
            .name("ffpipe-log".to_string())
            .spawn(move || {
                pump_lines(source, &shared, echo);
                let (_, cvar) = &*shared;
                lock(&shared).closed = true;
                cvar.notify_all();
                state.advance(ThreadState::Finished);
            })?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ThreadState {
        self.state.get()
    }

    /// `true` while the thread is reading.
    pub fn is_running(&self) -> bool {
        self.state.get() == ThreadState::Running
    }

    /// Snapshot of the lines collected so far.
    pub fn lines(&self) -> Vec<String> {
        lock(&self.shared).lines.clone()
    }

    /// Index of the first line at or after `start` that begins with `prefix`.
    ///
    /// With `block`, waits for new lines until a match arrives, the stream ends (not found) or
    /// `timeout` expires.
    pub fn index(
        &self,
        prefix: &str,
        start: usize,
        block: bool,
        timeout: Option<Duration>,
    ) -> FfpipeResult<usize> {
        let deadline = Deadline::after(timeout);
        let idle = self.state.get() == ThreadState::Idle;
        let (_, cvar) = &*self.shared;
        let mut book = lock(&self.shared);

        match book.search(prefix, start) {
            LogSearch::Found(i) => return Ok(i),
            LogSearch::TerminalNoMatch => {
                return Err(FfpipeError::not_running("log reader is not running"));
            }
            LogSearch::NotYetAvailable if idle => {
                return Err(FfpipeError::not_running("log reader is not running"));
            }
            LogSearch::NotYetAvailable if !block => {
                return Err(FfpipeError::not_found(format!("no log line starts with '{prefix}'")));
            }
            LogSearch::NotYetAvailable => {}
        }

        let mut from = book.lines.len().max(start);
        loop {
            book = match deadline.remaining() {
                None => cvar.wait(book).unwrap_or_else(PoisonError::into_inner),
                Some(left) => {
                    cvar.wait_timeout(book, left)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
            match book.search(prefix, from) {
                LogSearch::Found(i) => return Ok(i),
                LogSearch::TerminalNoMatch => {
                    return Err(FfpipeError::not_found(format!(
                        "ffmpeg log ended without a line starting with '{prefix}'"
                    )));
                }
                LogSearch::NotYetAvailable if deadline.expired() => {
                    return Err(FfpipeError::timeout(format!(
                        "waiting for a log line starting with '{prefix}'"
                    )));
                }
                LogSearch::NotYetAvailable => from = book.lines.len().max(start),
            }
        }
    }

    /// Descriptor of output stream `stream_id` of output file `file_id`.
    pub fn output_stream(
        &self,
        file_id: usize,
        stream_id: usize,
        block: bool,
        timeout: Option<Duration>,
    ) -> FfpipeResult<StreamDescriptor> {
        let deadline = Deadline::after(timeout);
        let not_found = || FfpipeError::not_found(format!("output stream #{file_id}:{stream_id}"));
        let classify = |e: FfpipeError| match e {
            FfpipeError::Timeout(_) => {
                FfpipeError::timeout(format!("output stream #{file_id}:{stream_id}"))
            }
            FfpipeError::NotRunning(_) => e,
            _ => not_found(),
        };

        let hint = self
            .index(&format!("Output #{file_id}"), 0, block, deadline.remaining())
            .map_err(classify)?;
        self.index(
            &format!("  Stream #{file_id}:{stream_id}"),
            hint,
            block,
            deadline.remaining(),
        )
        .map_err(classify)?;

        let book = lock(&self.shared);
        extract_output_stream(&book.lines, hint, file_id, stream_id).ok_or_else(not_found)
    }

    /// ffmpeg failure carrying the collected log.
    pub fn error_report(&self) -> FfpipeError {
        FfpipeError::ffmpeg(lock(&self.shared).lines.join("\n"))
    }

    /// Wait for the stream to end.
    pub fn join(&mut self, timeout: Option<Duration>) -> FfpipeResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if !self.state.wait_terminal(timeout) {
            self.handle = Some(handle);
            return Err(FfpipeError::timeout("log reader did not finish in time"));
        }
        handle
            .join()
            .map_err(|_| FfpipeError::not_running("log reader thread panicked"))
    }
}

fn pump_lines<R: Read>(mut source: R, shared: &SharedLog, echo: bool) {
    let mut buf = [0u8; 4096];
    let mut pending = Vec::new();
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "log stream closed");
                break;
            }
        };
        for &b in &buf[..n] {
            if b == b'\n' || b == b'\r' {
                push_line(shared, &mut pending, echo);
            } else {
                pending.push(b);
            }
        }
    }
    push_line(shared, &mut pending, echo);
}

fn push_line(shared: &SharedLog, pending: &mut Vec<u8>, echo: bool) {
    let line = String::from_utf8_lossy(pending).into_owned();
    pending.clear();
    if line.trim().is_empty() {
        return;
    }
    if echo {
        tracing::info!(target: "ffpipe::ffmpeg", "{line}");
    }
    let (_, cvar) = &**shared;
    lock(shared).lines.push(line);
    cvar.notify_all();
}

#[cfg(test)]
#[path = "../../tests/unit/stream/logger.rs"]
mod tests;
