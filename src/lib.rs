//! ffpipe drives the `ffmpeg` command-line tool as a subprocess.
//!
//! It has two halves:
//!
//! - [`filtergraph`]: compose and parse filter expressions, chains and complex filtergraphs
//! - [`stream`]: background workers that pump raw frames to stdin and from stdout, collect the
//!   diagnostic log from stderr and tail the `-progress` report file
//!
//! [`PipedSession`] ties them to one [`FfmpegProcess`].
#![forbid(unsafe_code)]

mod foundation;

pub mod buffer;
pub mod filtergraph;
pub mod process;
pub mod session;
pub mod stream;

pub use crate::foundation::core::DataType;
pub use crate::foundation::error::{FfpipeError, FfpipeResult};

pub use crate::buffer::codec::{BytesCodec, F32SamplesCodec, RawDataCodec, RawFrames};
pub use crate::buffer::raw::Buffer;
pub use crate::filtergraph::chain::{FilterSpec, compose_chain};
pub use crate::filtergraph::filter::{Filter, FilterValue, compose_filter, parse_filter};
pub use crate::filtergraph::graph::{
    ChainSpec, Filtergraph, GraphLabels, LabelMap, PadRef, PadRegistry, compose_graph,
    extend_chain, get_chain_labels, parse_graph, trace_graph_downstream,
};
pub use crate::process::{FfmpegProcess, ProcessHandle, ProcessOpts, is_ffmpeg_on_path};
pub use crate::session::{PipedSession, SessionOpts};
pub use crate::stream::descriptor::{MediaKind, StreamDescriptor};
pub use crate::stream::logger::{LogReader, LogReaderOpts, LogSearch};
pub use crate::stream::progress::{
    CancelAction, ProgressCallback, ProgressMonitor, ProgressOpts, ProgressSnapshot,
    ProgressValue,
};
pub use crate::stream::reader::{FrameReader, ReadCount, ReaderOpts};
pub use crate::stream::state::{ProgressState, ThreadState};
pub use crate::stream::writer::{FrameWriter, WriterOpts};
