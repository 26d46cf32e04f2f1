use std::io::{ErrorKind, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::buffer::codec::RawDataCodec;
use crate::buffer::raw::{Buffer, itemsize};
use crate::foundation::core::{DataType, Deadline};
use crate::foundation::error::{FfpipeError, FfpipeResult};
use crate::stream::state::{StateCell, ThreadState};

const SMALL_ELEMENT_BYTES: usize = 1024;
const ELEMENTS_PER_SMALL_BLOCK: usize = 1024;
const JOIN_POLL: Duration = Duration::from_millis(10);

/// Options for [`FrameReader`].
#[derive(Clone, Debug, Default)]
pub struct ReaderOpts {
    /// Element shape; required before `start`.
    pub shape: Option<Vec<usize>>,
    /// Element data type; required before `start`.
    pub dtype: Option<DataType>,
    /// Elements per pipe read. Derived from the element size when unset.
    pub nmin: Option<usize>,
    /// Queue depth in blocks; unbounded when unset or zero.
    pub queue_size: Option<usize>,
}

impl ReaderOpts {
    /// Options for elements of `shape` x `dtype`.
    pub fn new(shape: Vec<usize>, dtype: DataType) -> Self {
        Self {
            shape: Some(shape),
            dtype: Some(dtype),
            ..Self::default()
        }
    }
}

/// How many elements a [`FrameReader::read`] call should return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadCount {
    /// Block until exactly this many elements are available (fewer only at end of stream).
    Exact(usize),
    /// Block for the next block, then take everything queued.
    Drain,
    /// Never block; take whatever is queued.
    Available,
}

/// Signed count convention: positive is exact, negative drains, zero takes what is available.
impl From<i64> for ReadCount {
    fn from(n: i64) -> Self {
        match n {
            0 => Self::Available,
            n if n < 0 => Self::Drain,
            n => Self::Exact(usize::try_from(n).unwrap_or(usize::MAX)),
        }
    }
}

enum Recv {
    Block(Vec<u8>),
    Closed,
    TimedOut,
}

/// Background reader of fixed-stride elements from ffmpeg's stdout.
pub struct FrameReader {
    opts: ReaderOpts,
    format: Option<(Vec<usize>, DataType)>,
    rx: Option<Receiver<Vec<u8>>>,
    collect: Arc<AtomicBool>,
    state: StateCell<ThreadState>,
    handle: Option<JoinHandle<()>>,
    carryover: Option<Buffer>,
}

impl FrameReader {
    /// Reader that has not been started.
    pub fn new(opts: ReaderOpts) -> Self {
        Self {
            opts,
            format: None,
            rx: None,
            collect: Arc::new(AtomicBool::new(true)),
            state: StateCell::new(ThreadState::Idle),
            handle: None,
            carryover: None,
        }
    }

    /// Set the element format; only effective before `start`.
    pub fn configure(&mut self, shape: Vec<usize>, dtype: DataType) {
        self.opts.shape = Some(shape);
        self.opts.dtype = Some(dtype);
    }

    /// `true` when both shape and data type are known.
    pub fn is_configured(&self) -> bool {
        self.opts.shape.is_some() && self.opts.dtype.is_some()
    }

    /// Element shape and data type in use, once started.
    pub fn element_format(&self) -> Option<(&[usize], DataType)> {
        self.format.as_ref().map(|(s, d)| (s.as_slice(), *d))
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ThreadState {
        self.state.get()
    }

    /// Start pumping `source` on a background thread.
    pub fn start<R: Read + Send + 'static>(&mut self, source: R) -> FfpipeResult<()> {
        if self.state.get() != ThreadState::Idle {
            return Err(FfpipeError::validation("frame reader was already started"));
        }
        let (Some(shape), Some(dtype)) = (self.opts.shape.clone(), self.opts.dtype) else {
            return Err(FfpipeError::validation(
                "frame reader needs an element shape and data type before it starts",
            ));
        };
        let size = itemsize(&shape, dtype);
        if size == 0 {
            return Err(FfpipeError::validation(format!(
                "element shape {shape:?} has zero size"
            )));
        }
        let per_read = match self.opts.nmin {
            Some(n) => n.max(1),
            None if size > SMALL_ELEMENT_BYTES => 1,
            None => ELEMENTS_PER_SMALL_BLOCK,
        };

        let (tx, rx) = match self.opts.queue_size {
            Some(n) if n > 0 => crossbeam_channel::bounded(n),
            _ => crossbeam_channel::unbounded(),
        };
        let collect = Arc::clone(&self.collect);
        let state = self.state.clone();
        self.state.advance(ThreadState::Running);
        let handle = std::thread::Builder::new()
            .name("ffpipe-reader".to_string())
            .spawn(move || {
                pump_elements(source, &tx, size, per_read * size, &collect);
                state.advance(ThreadState::Finished);
            })?;

        tracing::debug!(?shape, %dtype, itemsize = size, per_read, "frame reader started");
        self.format = Some((shape, dtype));
        self.rx = Some(rx);
        self.handle = Some(handle);
        Ok(())
    }

    /// Stop enqueueing and free one queue slot so a blocked producer can notice.
    ///
    /// The thread keeps draining the pipe so ffmpeg is never blocked on stdout.
    pub fn cool_down(&mut self) {
        self.collect.store(false, Ordering::Release);
        if let Some(rx) = &self.rx {
            let _ = rx.try_recv();
        }
    }

    /// Read elements; see [`ReadCount`].
    ///
    /// Returns a zero-length buffer once the stream has ended. On timeout, whatever was
    /// collected is kept for the next call.
    pub fn read(&mut self, count: ReadCount, timeout: Option<Duration>) -> FfpipeResult<Buffer> {
        let (rx, shape, dtype) = self.channel()?;
        let deadline = Deadline::after(timeout);
        let mut parts: Vec<Buffer> = self.carryover.take().into_iter().collect();
        let mut have: usize = parts.iter().map(Buffer::count).sum();

        let mut timed_out = false;
        match count {
            ReadCount::Available => {}
            ReadCount::Exact(n) => {
                while have < n {
                    match recv(&rx, deadline) {
                        Recv::Block(b) => {
                            let b = Buffer::new(b, shape.clone(), dtype)?;
                            have += b.count();
                            parts.push(b);
                        }
                        Recv::Closed => break,
                        Recv::TimedOut => {
                            timed_out = true;
                            break;
                        }
                    }
                }
            }
            ReadCount::Drain => match recv(&rx, deadline) {
                Recv::Block(b) => parts.push(Buffer::new(b, shape.clone(), dtype)?),
                Recv::Closed => {}
                Recv::TimedOut => timed_out = true,
            },
        }
        if !timed_out && matches!(count, ReadCount::Available | ReadCount::Drain) {
            while let Ok(b) = rx.try_recv() {
                parts.push(Buffer::new(b, shape.clone(), dtype)?);
            }
        }

        let mut out = Buffer::concat(parts, shape, dtype)?;
        if timed_out {
            self.carryover = (!out.is_empty()).then_some(out);
            return Err(FfpipeError::timeout("waiting for frame data"));
        }
        if let ReadCount::Exact(n) = count
            && out.count() > n
        {
            self.carryover = Some(out.split_off(n));
        }
        Ok(out)
    }

    /// Read everything until the stream ends.
    pub fn read_all(&mut self, timeout: Option<Duration>) -> FfpipeResult<Buffer> {
        let (rx, shape, dtype) = self.channel()?;
        let deadline = Deadline::after(timeout);
        let mut parts: Vec<Buffer> = self.carryover.take().into_iter().collect();
        loop {
            match recv(&rx, deadline) {
                Recv::Block(b) => parts.push(Buffer::new(b, shape.clone(), dtype)?),
                Recv::Closed => break,
                Recv::TimedOut => {
                    let kept = Buffer::concat(parts, shape, dtype)?;
                    self.carryover = (!kept.is_empty()).then_some(kept);
                    return Err(FfpipeError::timeout("waiting for the frame stream to end"));
                }
            }
        }
        Buffer::concat(parts, shape, dtype)
    }

    /// [`read`](Self::read) followed by `codec.from_buffer`.
    pub fn read_with<C: RawDataCodec>(
        &mut self,
        codec: &C,
        count: ReadCount,
        timeout: Option<Duration>,
    ) -> FfpipeResult<C::Item> {
        codec.from_buffer(self.read(count, timeout)?)
    }

    /// Wait for the thread to exit.
    ///
    /// Without a timeout a full queue is discarded (and collection stopped) so the producer
    /// cannot stay blocked; with one, a producer still stuck at the deadline is a timeout.
    pub fn join(&mut self, timeout: Option<Duration>) -> FfpipeResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let deadline = Deadline::after(timeout);
        loop {
            let slice = deadline.remaining().map_or(JOIN_POLL, |left| left.min(JOIN_POLL));
            if self.state.wait_terminal(Some(slice)) {
                break;
            }
            if deadline.expired() {
                self.handle = Some(handle);
                return Err(FfpipeError::timeout("frame reader did not finish in time"));
            }
            if timeout.is_none() {
                self.discard_if_full();
            }
        }
        handle
            .join()
            .map_err(|_| FfpipeError::not_running("frame reader thread panicked"))
    }

    /// Stop collecting and empty the queue if it is full, so the thread can keep draining
    /// stdout. Returns `true` when blocks were discarded.
    pub(crate) fn discard_if_full(&self) -> bool {
        let Some(rx) = &self.rx else {
            return false;
        };
        if !rx.is_full() {
            return false;
        }
        tracing::debug!(queued = rx.len(), "discarding unread frame blocks");
        self.collect.store(false, Ordering::Release);
        while rx.try_recv().is_ok() {}
        true
    }

    fn channel(&self) -> FfpipeResult<(Receiver<Vec<u8>>, Vec<usize>, DataType)> {
        match (&self.rx, &self.format) {
            (Some(rx), Some((shape, dtype))) => Ok((rx.clone(), shape.clone(), *dtype)),
            _ => Err(FfpipeError::not_running("frame reader was never started")),
        }
    }
}

fn recv(rx: &Receiver<Vec<u8>>, deadline: Deadline) -> Recv {
    match deadline.remaining() {
        None => rx.recv().map_or(Recv::Closed, Recv::Block),
        Some(left) => match rx.recv_timeout(left) {
            Ok(b) => Recv::Block(b),
            Err(RecvTimeoutError::Timeout) => Recv::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Recv::Closed,
        },
    }
}

fn pump_elements<R: Read>(
    mut source: R,
    tx: &Sender<Vec<u8>>,
    itemsize: usize,
    blocksize: usize,
    collect: &AtomicBool,
) {
    let mut buf = vec![0u8; blocksize];
    let mut pending: Vec<u8> = Vec::with_capacity(blocksize);
    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::debug!(error = %e, "frame stream closed");
                break;
            }
        };
        pending.extend_from_slice(&buf[..n]);
        let whole = pending.len() - pending.len() % itemsize;
        if whole == 0 {
            continue;
        }
        let block: Vec<u8> = pending.drain(..whole).collect();
        if collect.load(Ordering::Acquire) && tx.send(block).is_err() {
            tracing::debug!("frame consumer went away");
            break;
        }
    }
    if !pending.is_empty() {
        tracing::debug!(bytes = pending.len(), "dropping trailing partial element");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/stream/reader.rs"]
mod tests;
