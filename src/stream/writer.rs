use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

use crate::buffer::codec::RawDataCodec;
use crate::foundation::error::{FfpipeError, FfpipeResult};
use crate::stream::state::{StateCell, ThreadState};

const WRITE_CHUNK: usize = 64 * 1024;

/// Options for [`FrameWriter`].
#[derive(Clone, Debug, Default)]
pub struct WriterOpts {
    /// Queue depth in buffers; unbounded when unset or zero.
    pub queue_size: Option<usize>,
}

impl WriterOpts {
    /// Bounded queue of `queue_size` buffers.
    pub fn new(queue_size: usize) -> Self {
        Self {
            queue_size: Some(queue_size),
        }
    }
}

/// Background writer feeding byte buffers to ffmpeg's stdin.
///
/// `None` on the queue is the end-of-stream sentinel.
pub struct FrameWriter {
    opts: WriterOpts,
    tx: Option<Sender<Option<Vec<u8>>>>,
    abort: Arc<AtomicBool>,
    state: StateCell<ThreadState>,
    handle: Option<JoinHandle<()>>,
}

impl FrameWriter {
    /// Writer that has not been started.
    pub fn new(opts: WriterOpts) -> Self {
        Self {
            opts,
            tx: None,
            abort: Arc::new(AtomicBool::new(false)),
            state: StateCell::new(ThreadState::Idle),
            handle: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ThreadState {
        self.state.get()
    }

    /// Start draining the queue into `sink` on a background thread.
    pub fn start<W: Write + Send + 'static>(&mut self, sink: W) -> FfpipeResult<()> {
        if self.state.get() != ThreadState::Idle {
            return Err(FfpipeError::validation("frame writer was already started"));
        }
        let (tx, rx) = match self.opts.queue_size {
            Some(n) if n > 0 => crossbeam_channel::bounded(n),
            _ => crossbeam_channel::unbounded(),
        };
        let state = self.state.clone();
        let abort = Arc::clone(&self.abort);
        self.state.advance(ThreadState::Running);
        let handle = std::thread::Builder::new()
            .name("ffpipe-writer".to_string())
            .spawn(move || {
                drain_queue(&rx, sink, &abort);
                state.advance(ThreadState::Finished);
            })?;
        self.tx = Some(tx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Queue `data` for writing.
    pub fn write(&self, data: Vec<u8>, timeout: Option<Duration>) -> FfpipeResult<()> {
        let tx = match &self.tx {
            Some(tx) if self.state.get() == ThreadState::Running => tx,
            _ => return Err(FfpipeError::not_running("frame writer is not running")),
        };
        let sent = match timeout {
            Some(t) => tx.send_timeout(Some(data), t),
            None => tx.send(Some(data)).map_err(|e| SendTimeoutError::Disconnected(e.0)),
        };
        match sent {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(_)) => {
                Err(FfpipeError::timeout("frame writer queue stayed full"))
            }
            Err(SendTimeoutError::Disconnected(_)) => {
                Err(FfpipeError::not_running("frame writer stopped"))
            }
        }
    }

    /// Encode `item` with `codec` and queue it.
    pub fn write_with<C: RawDataCodec>(
        &self,
        codec: &C,
        item: &C::Item,
        timeout: Option<Duration>,
    ) -> FfpipeResult<()> {
        self.write(codec.to_buffer(item)?, timeout)
    }

    /// Signal end of stream. Buffers already queued are still written; later `write` calls
    /// fail with not-running.
    pub fn close(&mut self) {
        if let Some(tx) = self.tx.take() {
            // a full queue still ends once the sender is gone
            let _ = tx.try_send(None);
        }
    }

    /// Wait up to `timeout` for the thread to finish; `true` when it has (or never started).
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        self.handle.is_none() || self.state.wait_terminal(timeout)
    }

    /// Close the queue, let it drain and wait for the thread (which closes stdin).
    ///
    /// When `timeout` expires the thread is told to abort: it drops the rest of the queue and
    /// closes the sink as soon as the write in flight returns.
    pub fn join(&mut self, timeout: Option<Duration>) -> FfpipeResult<()> {
        self.close();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        if !self.state.wait_terminal(timeout) {
            self.abort.store(true, Ordering::Release);
            self.handle = Some(handle);
            return Err(FfpipeError::timeout("frame writer did not finish in time"));
        }
        handle
            .join()
            .map_err(|_| FfpipeError::not_running("frame writer thread panicked"))
    }
}

fn drain_queue<W: Write>(rx: &Receiver<Option<Vec<u8>>>, mut sink: W, abort: &AtomicBool) {
    let mut written = 0usize;
    'queue: while let Ok(Some(data)) = rx.recv() {
        for chunk in data.chunks(WRITE_CHUNK) {
            if abort.load(Ordering::Acquire) {
                tracing::debug!("frame writer aborted");
                break 'queue;
            }
            if let Err(e) = sink.write_all(chunk) {
                tracing::debug!(error = %e, "frame sink closed");
                break 'queue;
            }
            written += chunk.len();
        }
        if let Err(e) = sink.flush() {
            tracing::debug!(error = %e, "frame sink closed");
            break;
        }
    }
    tracing::debug!(bytes = written, "frame writer done");
    drop(sink);
}

#[cfg(test)]
#[path = "../../tests/unit/stream/writer.rs"]
mod tests;
