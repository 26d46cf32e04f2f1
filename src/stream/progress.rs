use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use tempfile::TempDir;

use crate::foundation::error::{FfpipeError, FfpipeResult};
use crate::stream::state::{ProgressState, StateCell};

/// One value of a progress report, typed by what it parses as.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum ProgressValue {
    /// Integer value (`frame=42`).
    Int(i64),
    /// Floating point value (`fps=24.5`).
    Float(f64),
    /// Anything else (`out_time=00:00:01.000000`, `bitrate=N/A`).
    Text(String),
}

impl ProgressValue {
    /// Integer first, then float, then text.
    pub fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<i64>() {
            Self::Int(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            Self::Float(v)
        } else {
            Self::Text(raw.to_string())
        }
    }

    /// Integer view.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Text(_) => None,
        }
    }
}

/// Key/value pairs of one report block and whether it was the last one.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct ProgressSnapshot {
    /// Reported fields, excluding the terminating `progress` key.
    pub values: BTreeMap<String, ProgressValue>,
    /// `true` when the block ended with `progress=end`.
    pub done: bool,
}

impl ProgressSnapshot {
    /// Field `key`, if reported.
    pub fn get(&self, key: &str) -> Option<&ProgressValue> {
        self.values.get(key)
    }

    /// Frames processed so far.
    pub fn frame(&self) -> Option<i64> {
        self.get("frame").and_then(ProgressValue::as_i64)
    }

    /// Output position in microseconds.
    pub fn out_time_us(&self) -> Option<i64> {
        self.get("out_time_us")
            .or_else(|| self.get("out_time_ms"))
            .and_then(ProgressValue::as_i64)
    }
}

/// Progress callback. Returning `Ok(true)` requests cancellation of the operation.
pub type ProgressCallback = Box<dyn FnMut(&ProgressSnapshot) -> anyhow::Result<bool> + Send>;

/// Action run when the callback requests cancellation.
pub type CancelAction = Box<dyn FnMut() + Send>;

/// Options for [`ProgressMonitor`].
#[derive(Clone, Debug)]
pub struct ProgressOpts {
    /// Progress file to watch. A private temporary file is used when unset.
    pub url: Option<PathBuf>,
    /// Poll interval while waiting for the file and for new data.
    pub interval: Duration,
}

impl Default for ProgressOpts {
    fn default() -> Self {
        Self {
            url: None,
            interval: Duration::from_millis(10),
        }
    }
}

impl ProgressOpts {
    /// Watch `url` with the default interval.
    pub fn new(url: impl Into<PathBuf>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }
}

/// Incremental `key=value` parser that turns report blocks into snapshots.
#[derive(Debug, Default)]
pub(crate) struct ProgressParser {
    current: BTreeMap<String, ProgressValue>,
    partial: Vec<u8>,
}

impl ProgressParser {
    /// Consume `chunk`. Incomplete trailing lines are held for the next call unless `flush`.
    pub(crate) fn feed(&mut self, chunk: &[u8], flush: bool) -> Vec<ProgressSnapshot> {
        self.partial.extend_from_slice(chunk);
        let mut out = Vec::new();
        let mut consumed = 0;
        while let Some(nl) = self.partial[consumed..].iter().position(|&b| b == b'\n') {
            let line = String::from_utf8_lossy(&self.partial[consumed..consumed + nl]).into_owned();
            consumed += nl + 1;
            out.extend(self.line(&line));
        }
        self.partial.drain(..consumed);
        if flush && !self.partial.is_empty() {
            let line = String::from_utf8_lossy(&self.partial).into_owned();
            self.partial.clear();
            out.extend(self.line(&line));
        }
        out
    }

    fn line(&mut self, line: &str) -> Option<ProgressSnapshot> {
        let (key, value) = line.trim_end_matches('\r').split_once('=')?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return None;
        }
        if key != "progress" {
            self.current.insert(key.to_string(), ProgressValue::parse(value));
            return None;
        }
        Some(ProgressSnapshot {
            values: std::mem::take(&mut self.current),
            done: value == "end",
        })
    }
}

struct MonitorTask {
    url: PathBuf,
    callback: ProgressCallback,
    cancel: Option<CancelAction>,
    tempdir: Option<TempDir>,
    interval: Duration,
    stop: Arc<AtomicBool>,
    state: StateCell<ProgressState>,
}

/// Background thread that tails ffmpeg's `-progress` file and reports each block.
///
/// Disabled (no thread, no file) when constructed without a callback.
pub struct ProgressMonitor {
    url: Option<PathBuf>,
    task: Option<MonitorTask>,
    stop: Arc<AtomicBool>,
    state: StateCell<ProgressState>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressMonitor {
    /// Prepare a monitor. Creates the private temp directory when no URL is configured.
    pub fn new(
        callback: Option<ProgressCallback>,
        cancel: Option<CancelAction>,
        opts: ProgressOpts,
    ) -> FfpipeResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let state = StateCell::new(ProgressState::Idle);
        let Some(callback) = callback else {
            return Ok(Self {
                url: None,
                task: None,
                stop,
                state,
                handle: None,
            });
        };

        let (url, tempdir) = match opts.url {
            Some(url) => (url, None),
            None => {
                let dir = tempfile::Builder::new().prefix("ffpipe-progress-").tempdir()?;
                (dir.path().join("progress.txt"), Some(dir))
            }
        };

        Ok(Self {
            url: Some(url.clone()),
            task: Some(MonitorTask {
                url,
                callback,
                cancel,
                tempdir,
                interval: opts.interval,
                stop: Arc::clone(&stop),
                state: state.clone(),
            }),
            stop,
            state,
            handle: None,
        })
    }

    /// Disabled monitor.
    pub fn disabled() -> Self {
        Self {
            url: None,
            task: None,
            stop: Arc::new(AtomicBool::new(false)),
            state: StateCell::new(ProgressState::Idle),
            handle: None,
        }
    }

    /// Path ffmpeg should write progress to (`-progress <url>`); `None` when disabled.
    pub fn url(&self) -> Option<&Path> {
        self.url.as_deref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProgressState {
        self.state.get()
    }

    /// Spawn the monitor thread. No-op when disabled or already started.
    pub fn start(&mut self) -> FfpipeResult<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        self.state.advance(ProgressState::WaitingForFile);
        let handle = std::thread::Builder::new()
            .name("ffpipe-progress".to_string())
            .spawn(move || task.run())?;
        self.handle = Some(handle);
        Ok(())
    }

    /// Ask the thread to stop after one final drain and wait for it.
    pub fn join(&mut self, timeout: Option<Duration>) -> FfpipeResult<()> {
        self.stop.store(true, Ordering::Release);
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if !self.state.wait_terminal(timeout) {
            self.handle = Some(handle);
            return Err(FfpipeError::timeout("progress monitor did not stop in time"));
        }
        handle
            .join()
            .map_err(|_| FfpipeError::not_running("progress monitor thread panicked"))
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl MonitorTask {
    fn run(mut self) {
        tracing::debug!(url = %self.url.display(), "monitoring progress file");
        while !self.stop.load(Ordering::Acquire) && !self.url.is_file() {
            std::thread::sleep(self.interval);
        }

        // ffmpeg may have created the file and exited while we slept.
        if self.url.is_file() {
            match File::open(&self.url) {
                Ok(file) => {
                    self.state.advance(ProgressState::Tailing);
                    tracing::debug!("progress file found");
                    self.tail(file);
                }
                Err(e) => tracing::debug!(error = %e, "failed to open progress file"),
            }
        }

        self.state.advance(ProgressState::Stopped);
        if let Some(dir) = self.tempdir.take()
            && let Err(e) = dir.close()
        {
            tracing::debug!(error = %e, "failed to remove progress directory");
        }
        tracing::debug!("progress monitor terminated");
    }

    fn tail(&mut self, mut file: File) {
        let mut parser = ProgressParser::default();
        let mut chunk = Vec::new();
        loop {
            let stopping = self.stop.load(Ordering::Acquire);
            chunk.clear();
            let n = match file.read_to_end(&mut chunk) {
                Ok(n) => n,
                Err(e) => {
                    tracing::debug!(error = %e, "progress file read failed");
                    break;
                }
            };
            for snapshot in parser.feed(&chunk, stopping) {
                self.deliver(&snapshot);
            }
            if stopping {
                break;
            }
            if n == 0 {
                std::thread::sleep(self.interval);
            }
        }
    }

    fn deliver(&mut self, snapshot: &ProgressSnapshot) {
        let callback = &mut self.callback;
        match panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))) {
            Ok(Ok(false)) => {}
            Ok(Ok(true)) => {
                tracing::debug!("operation canceled by progress callback");
                if let Some(cancel) = self.cancel.as_mut() {
                    cancel();
                }
            }
            Ok(Err(e)) => tracing::error!(error = %e, "progress callback failed"),
            Err(_) => tracing::error!("progress callback panicked"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stream/progress.rs"]
mod tests;
