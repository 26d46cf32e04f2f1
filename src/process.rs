use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::foundation::error::{FfpipeError, FfpipeResult};

const WAIT_POLL: Duration = Duration::from_millis(5);

/// Options for launching ffmpeg.
#[derive(Clone, Debug)]
pub struct ProcessOpts {
    /// Executable to run.
    pub ffmpeg_path: PathBuf,
    /// Prepend `-hide_banner`.
    pub hide_banner: bool,
}

impl Default for ProcessOpts {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            hide_banner: false,
        }
    }
}

impl ProcessOpts {
    /// Run `ffmpeg_path` instead of `ffmpeg` from `PATH`.
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ..Self::default()
        }
    }
}

/// Cloneable handle that can kill the process from any thread.
#[derive(Clone, Debug)]
pub struct ProcessHandle {
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle {
    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Kill the process. Killing an exited process is not an error.
    pub fn kill(&self) -> FfpipeResult<()> {
        let mut child = self.lock();
        match child.kill() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Exit status if the process has ended.
    pub fn try_wait(&self) -> FfpipeResult<Option<ExitStatus>> {
        Ok(self.lock().try_wait()?)
    }

    pub fn id(&self) -> u32 {
        self.lock().id()
    }
}

/// A spawned ffmpeg with piped stdin, stdout and stderr.
///
/// Each stream can be taken once and handed to the worker that owns it.
pub struct FfmpegProcess {
    handle: ProcessHandle,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    args: Vec<OsString>,
}

impl FfmpegProcess {
    /// Spawn `opts.ffmpeg_path` with `args`.
    #[tracing::instrument(level = "debug", skip_all, fields(ffmpeg = %opts.ffmpeg_path.display()))]
    pub fn spawn<I, S>(opts: &ProcessOpts, args: I) -> FfpipeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut all: Vec<OsString> = Vec::new();
        if opts.hide_banner {
            all.push("-hide_banner".into());
        }
        all.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        tracing::debug!(args = ?all, "spawning ffmpeg");

        let mut child = Command::new(&opts.ffmpeg_path)
            .args(&all)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                FfpipeError::not_running(format!(
                    "failed to spawn '{}' (is it installed and on PATH?): {e}",
                    opts.ffmpeg_path.display()
                ))
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        Ok(Self {
            handle: ProcessHandle {
                child: Arc::new(Mutex::new(child)),
            },
            stdin,
            stdout,
            stderr,
            args: all,
        })
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn handle(&self) -> ProcessHandle {
        self.handle.clone()
    }

    pub fn take_stdin(&mut self) -> FfpipeResult<ChildStdin> {
        self.stdin
            .take()
            .ok_or_else(|| FfpipeError::not_running("ffmpeg stdin was already taken"))
    }

    pub fn take_stdout(&mut self) -> FfpipeResult<ChildStdout> {
        self.stdout
            .take()
            .ok_or_else(|| FfpipeError::not_running("ffmpeg stdout was already taken"))
    }

    pub fn take_stderr(&mut self) -> FfpipeResult<ChildStderr> {
        self.stderr
            .take()
            .ok_or_else(|| FfpipeError::not_running("ffmpeg stderr was already taken"))
    }

    pub fn kill(&self) -> FfpipeResult<()> {
        self.handle.kill()
    }

    /// Exit status if the process has ended.
    pub fn try_wait(&self) -> FfpipeResult<Option<ExitStatus>> {
        self.handle.try_wait()
    }

    /// Wait for exit. stdin is closed first if it was never taken.
    ///
    /// Polls so that [`ProcessHandle::kill`] stays usable from other threads meanwhile.
    pub fn wait(&mut self) -> FfpipeResult<ExitStatus> {
        drop(self.stdin.take());
        let status = loop {
            if let Some(status) = self.handle.try_wait()? {
                break status;
            }
            std::thread::sleep(WAIT_POLL);
        };
        tracing::debug!(%status, "ffmpeg exited");
        Ok(status)
    }
}

/// `true` when `ffmpeg -version` runs successfully.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../tests/unit/process.rs"]
mod tests;
