use std::ffi::{OsStr, OsString};
use std::process::{ChildStdout, ExitStatus};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::foundation::error::{FfpipeError, FfpipeResult};
use crate::process::{FfmpegProcess, ProcessHandle, ProcessOpts};
use crate::stream::descriptor::StreamDescriptor;
use crate::stream::logger::{LogReader, LogReaderOpts};
use crate::stream::progress::{CancelAction, ProgressCallback, ProgressMonitor, ProgressOpts};
use crate::stream::reader::{FrameReader, ReaderOpts};
use crate::stream::state::ProgressState;
use crate::stream::writer::{FrameWriter, WriterOpts};

const FINISH_POLL: Duration = Duration::from_millis(10);

/// Options for [`PipedSession`].
#[derive(Clone, Debug, Default)]
pub struct SessionOpts {
    /// How to launch ffmpeg.
    pub process: ProcessOpts,
    /// Diagnostic log reader options.
    pub log: LogReaderOpts,
    /// Progress monitor options (used only with a callback).
    pub progress: ProgressOpts,
    /// Frame reader options. Without an element format, use
    /// [`PipedSession::start_reader_auto`].
    pub reader: ReaderOpts,
    /// Frame writer options.
    pub writer: WriterOpts,
    /// Feed caller data to stdin through a [`FrameWriter`]; stdin is closed otherwise.
    pub pipe_stdin: bool,
    /// Collect stdout through a [`FrameReader`]; stdout is closed otherwise.
    pub pipe_stdout: bool,
}

/// One ffmpeg invocation with its four I/O workers.
pub struct PipedSession {
    process: FfmpegProcess,
    logger: LogReader,
    progress: ProgressMonitor,
    reader: FrameReader,
    writer: FrameWriter,
    pending_stdout: Option<ChildStdout>,
    finished: bool,
}

impl PipedSession {
    /// Launch ffmpeg with `args` and start the workers.
    ///
    /// With a progress callback, `-progress <url>` is prepended to `args` and the callback may
    /// cancel the run by returning `Ok(true)`.
    pub fn spawn<I, S>(
        args: I,
        opts: SessionOpts,
        progress: Option<ProgressCallback>,
    ) -> FfpipeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let target: Arc<Mutex<Option<ProcessHandle>>> = Arc::new(Mutex::new(None));
        let cancel: Option<CancelAction> = progress.as_ref().map(|_| {
            let target = Arc::clone(&target);
            Box::new(move || {
                let guard = target.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(handle) = guard.as_ref()
                    && let Err(e) = handle.kill()
                {
                    tracing::warn!(error = %e, "failed to cancel ffmpeg");
                }
            }) as CancelAction
        });
        let mut monitor = ProgressMonitor::new(progress, cancel, opts.progress)?;

        let mut argv: Vec<OsString> = Vec::new();
        if let Some(url) = monitor.url() {
            argv.push("-progress".into());
            argv.push(url.as_os_str().to_os_string());
        }
        argv.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));

        let mut process = FfmpegProcess::spawn(&opts.process, &argv)?;
        *target.lock().unwrap_or_else(PoisonError::into_inner) = Some(process.handle());

        let mut logger = LogReader::new(opts.log);
        logger.start(process.take_stderr()?)?;

        let mut writer = FrameWriter::new(opts.writer);
        let stdin = process.take_stdin()?;
        if opts.pipe_stdin {
            writer.start(stdin)?;
        } else {
            drop(stdin);
        }

        let mut reader = FrameReader::new(opts.reader);
        let stdout = process.take_stdout()?;
        let pending_stdout = match (opts.pipe_stdout, reader.is_configured()) {
            (false, _) => None,
            (true, true) => {
                reader.start(stdout)?;
                None
            }
            (true, false) => Some(stdout),
        };

        monitor.start()?;
        Ok(Self {
            process,
            logger,
            progress: monitor,
            reader,
            writer,
            pending_stdout,
            finished: false,
        })
    }

    /// Learn the output element format from the log's `Output #0` / `Stream #0:0` block and
    /// start the frame reader with it.
    pub fn start_reader_auto(&mut self, timeout: Option<Duration>) -> FfpipeResult<StreamDescriptor> {
        let Some(stdout) = self.pending_stdout.take() else {
            return Err(FfpipeError::not_running(
                "stdout is not piped or the frame reader has already started",
            ));
        };
        let format = self
            .logger
            .output_stream(0, 0, true, timeout)
            .and_then(|d| d.element_format().map(|f| (d, f)));
        let (descriptor, (shape, dtype)) = match format {
            Ok(found) => found,
            Err(e) => {
                self.pending_stdout = Some(stdout);
                return Err(e);
            }
        };
        tracing::debug!(?shape, %dtype, "output format from ffmpeg log");
        self.reader.configure(shape, dtype);
        self.reader.start(stdout)?;
        Ok(descriptor)
    }

    /// Frame reader attached to stdout.
    pub fn reader(&mut self) -> &mut FrameReader {
        &mut self.reader
    }

    /// Frame writer attached to stdin.
    pub fn writer(&self) -> &FrameWriter {
        &self.writer
    }

    /// Log reader attached to stderr.
    pub fn logger(&self) -> &LogReader {
        &self.logger
    }

    /// Progress monitor state.
    pub fn progress_state(&self) -> ProgressState {
        self.progress.state()
    }

    /// Kill handle for the process.
    pub fn handle(&self) -> ProcessHandle {
        self.process.handle()
    }

    /// Kill ffmpeg.
    pub fn cancel(&self) -> FfpipeResult<()> {
        tracing::debug!("canceling ffmpeg");
        self.process.kill()
    }

    /// Close stdin, wait for ffmpeg and every worker, and report a failed exit as
    /// [`FfpipeError::Ffmpeg`].
    ///
    /// Unread frames stay readable through [`reader`](Self::reader) unless the queue filled
    /// up while stdin was still being written or while waiting for the reader.
    pub fn finish(&mut self) -> FfpipeResult<ExitStatus> {
        drop(self.pending_stdout.take());
        // ffmpeg stops reading stdin while its stdout is blocked on a full reader queue
        self.writer.close();
        while !self.writer.wait(Some(FINISH_POLL)) {
            self.reader.discard_if_full();
        }
        self.writer.join(None)?;
        self.reader.join(None)?;
        let status = self.process.wait()?;
        self.finished = true;
        self.logger.join(None)?;
        self.progress.join(None)?;

        if !status.success() {
            return Err(FfpipeError::ffmpeg(format!(
                "ffmpeg exited with {status}\n{}",
                self.logger.lines().join("\n")
            )));
        }
        Ok(status)
    }
}

impl Drop for PipedSession {
    fn drop(&mut self) {
        if !self.finished
            && let Ok(None) = self.process.try_wait()
        {
            tracing::debug!("killing unfinished ffmpeg");
            let _ = self.process.kill();
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/session.rs"]
mod tests;
