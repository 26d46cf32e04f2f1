//! Conversion between caller-side data objects and raw element buffers.

use crate::buffer::raw::{Buffer, itemsize};
use crate::foundation::core::DataType;
use crate::foundation::error::{FfpipeError, FfpipeResult};

/// Converts a caller-side data object to and from raw pipe bytes.
///
/// The codec is picked when a reader or writer is configured; workers only ever see bytes.
pub trait RawDataCodec {
    /// Caller-side data object.
    type Item;

    /// Element shape and data type carried by `item`.
    fn shape_info(&self, item: &Self::Item) -> FfpipeResult<(Vec<usize>, DataType)>;

    /// Packed bytes of `item`.
    fn to_buffer(&self, item: &Self::Item) -> FfpipeResult<Vec<u8>>;

    /// Build a data object from raw elements.
    fn from_buffer(&self, buffer: Buffer) -> FfpipeResult<Self::Item>;
}

/// Raw bytes with their full shape (`[count, element shape...]`) and numpy-style dtype string.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RawFrames {
    /// Packed element bytes.
    pub buffer: Vec<u8>,
    /// Data type string, e.g. `|u1` or `<f4`.
    pub dtype: String,
    /// Full shape including the leading element count.
    pub shape: Vec<usize>,
}

/// Pass-through codec over [`RawFrames`].
#[derive(Clone, Copy, Debug, Default)]
pub struct BytesCodec;

impl RawDataCodec for BytesCodec {
    type Item = RawFrames;

    fn shape_info(&self, item: &RawFrames) -> FfpipeResult<(Vec<usize>, DataType)> {
        let dtype: DataType = item.dtype.parse()?;
        let Some((_, element)) = item.shape.split_first() else {
            return Err(FfpipeError::validation("raw frames need a leading count dimension"));
        };
        Ok((element.to_vec(), dtype))
    }

    fn to_buffer(&self, item: &RawFrames) -> FfpipeResult<Vec<u8>> {
        let (element, dtype) = self.shape_info(item)?;
        let expected = item.shape[0] * itemsize(&element, dtype);
        if item.buffer.len() != expected {
            return Err(FfpipeError::validation(format!(
                "raw frames hold {} bytes but shape {:?} needs {expected}",
                item.buffer.len(),
                item.shape
            )));
        }
        Ok(item.buffer.clone())
    }

    fn from_buffer(&self, buffer: Buffer) -> FfpipeResult<RawFrames> {
        let shape = buffer.full_shape();
        let dtype = buffer.dtype().as_str().to_string();
        Ok(RawFrames {
            buffer: buffer.into_data(),
            dtype,
            shape,
        })
    }
}

/// Interleaved `f32` audio samples.
#[derive(Clone, Copy, Debug)]
pub struct F32SamplesCodec {
    /// Interleaved channel count.
    pub channels: usize,
}

impl F32SamplesCodec {
    /// Codec for `channels` interleaved channels.
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl RawDataCodec for F32SamplesCodec {
    type Item = Vec<f32>;

    fn shape_info(&self, item: &Vec<f32>) -> FfpipeResult<(Vec<usize>, DataType)> {
        if self.channels == 0 || !item.len().is_multiple_of(self.channels) {
            return Err(FfpipeError::validation(format!(
                "{} samples do not split into {} channel(s)",
                item.len(),
                self.channels
            )));
        }
        Ok((vec![self.channels], DataType::F32))
    }

    fn to_buffer(&self, item: &Vec<f32>) -> FfpipeResult<Vec<u8>> {
        self.shape_info(item)?;
        Ok(item.iter().flat_map(|s| s.to_le_bytes()).collect())
    }

    fn from_buffer(&self, buffer: Buffer) -> FfpipeResult<Vec<f32>> {
        if buffer.dtype() != DataType::F32 || buffer.shape() != [self.channels] {
            return Err(FfpipeError::validation(format!(
                "expected {} channel(s) of <f4, got {:?} of {}",
                self.channels,
                buffer.shape(),
                buffer.dtype()
            )));
        }
        Ok(buffer
            .data()
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffer/codec.rs"]
mod tests;
