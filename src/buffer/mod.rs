//! Raw element buffers and codecs converting them to caller-side data.

pub mod codec;
pub mod raw;
