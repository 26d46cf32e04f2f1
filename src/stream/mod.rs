//! Background workers attached to a running ffmpeg process.
//!
//! One thread per channel: progress file, stderr, stdout and stdin. Each worker owns its
//! stream and reports its lifecycle through a [`state::StateCell`].

/// Stream descriptors parsed from ffmpeg's diagnostic output.
pub mod descriptor;
pub mod logger;
/// `-progress` file monitor.
pub mod progress;
pub mod reader;
/// Worker lifecycle state machines.
pub mod state;
pub mod writer;
