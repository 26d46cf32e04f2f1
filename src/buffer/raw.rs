use crate::foundation::core::DataType;
use crate::foundation::error::{FfpipeError, FfpipeResult};

/// Byte width of one element of `shape` x `dtype`.
pub fn itemsize(shape: &[usize], dtype: DataType) -> usize {
    shape.iter().product::<usize>() * dtype.size()
}

/// Headerless run of fixed-stride elements (video frames or audio sample frames).
///
/// `shape` is the per-element shape; the element count is implied by the payload length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
    shape: Vec<usize>,
    dtype: DataType,
}

impl Buffer {
    /// Wrap `data`, which must hold a whole number of elements.
    pub fn new(data: Vec<u8>, shape: Vec<usize>, dtype: DataType) -> FfpipeResult<Self> {
        let size = itemsize(&shape, dtype);
        if size == 0 {
            return Err(FfpipeError::validation(format!(
                "element shape {shape:?} has zero size"
            )));
        }
        if !data.len().is_multiple_of(size) {
            return Err(FfpipeError::validation(format!(
                "{} bytes is not a whole number of {size}-byte elements",
                data.len()
            )));
        }
        Ok(Self { data, shape, dtype })
    }

    /// Zero-length buffer with the given element format.
    pub fn empty(shape: Vec<usize>, dtype: DataType) -> Self {
        Self {
            data: Vec::new(),
            shape,
            dtype,
        }
    }

    /// Concatenate `parts` in order. All parts must share `shape` and `dtype`.
    pub fn concat(
        parts: impl IntoIterator<Item = Buffer>,
        shape: Vec<usize>,
        dtype: DataType,
    ) -> FfpipeResult<Self> {
        let mut out = Self::empty(shape, dtype);
        for part in parts {
            if part.shape != out.shape || part.dtype != out.dtype {
                return Err(FfpipeError::validation(format!(
                    "cannot concatenate {:?}/{} onto {:?}/{}",
                    part.shape, part.dtype, out.shape, out.dtype
                )));
            }
            if out.data.is_empty() {
                out.data = part.data;
            } else {
                out.data.extend_from_slice(&part.data);
            }
        }
        Ok(out)
    }

    /// Per-element shape.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element data type.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Bytes per element.
    pub fn itemsize(&self) -> usize {
        itemsize(&self.shape, self.dtype)
    }

    /// Number of elements.
    pub fn count(&self) -> usize {
        match self.itemsize() {
            0 => 0,
            size => self.data.len() / size,
        }
    }

    /// `[count, shape...]`.
    pub fn full_shape(&self) -> Vec<usize> {
        std::iter::once(self.count())
            .chain(self.shape.iter().copied())
            .collect()
    }

    /// `true` when no element is held.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the raw payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Keep the first `n` elements and return the rest. `n` past the end returns an empty buffer.
    pub fn split_off(&mut self, n: usize) -> Buffer {
        let at = (n * self.itemsize()).min(self.data.len());
        Buffer {
            data: self.data.split_off(at),
            shape: self.shape.clone(),
            dtype: self.dtype,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/buffer/raw.rs"]
mod tests;
