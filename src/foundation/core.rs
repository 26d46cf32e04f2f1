use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::foundation::error::{FfpipeError, FfpipeResult};

/// Element data type of a raw buffer.
///
/// Byte order is always little-endian, matching the `*le` raw formats ffmpeg writes to pipes.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    I64,
    F32,
    F64,
}

impl DataType {
    /// Width of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::U8 | Self::I8 => 1,
            Self::U16 | Self::I16 => 2,
            Self::U32 | Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }

    /// Numpy-style type string (`|u1`, `<i2`, `<f4`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "|u1",
            Self::I8 => "|i1",
            Self::U16 => "<u2",
            Self::I16 => "<i2",
            Self::U32 => "<u4",
            Self::I32 => "<i4",
            Self::I64 => "<i8",
            Self::F32 => "<f4",
            Self::F64 => "<f8",
        }
    }

    /// Data type and component count of a packed ffmpeg pixel format.
    ///
    /// Planar and sub-sampled formats have no fixed per-pixel stride and return `None`.
    pub fn from_pix_fmt(pix_fmt: &str) -> Option<(Self, usize)> {
        let out = match pix_fmt {
            "gray" | "pal8" => (Self::U8, 1),
            "ya8" => (Self::U8, 2),
            "rgb24" | "bgr24" => (Self::U8, 3),
            "rgba" | "bgra" | "argb" | "abgr" | "rgb0" | "bgr0" | "0rgb" | "0bgr" => (Self::U8, 4),
            "gray16le" => (Self::U16, 1),
            "ya16le" => (Self::U16, 2),
            "rgb48le" | "bgr48le" => (Self::U16, 3),
            "rgba64le" | "bgra64le" => (Self::U16, 4),
            "grayf32le" => (Self::F32, 1),
            "rgbf32le" => (Self::F32, 3),
            "rgbaf32le" => (Self::F32, 4),
            _ => return None,
        };
        Some(out)
    }

    /// Data type of an ffmpeg sample format. Planar variants map to their packed counterpart.
    pub fn from_sample_fmt(sample_fmt: &str) -> Option<Self> {
        let packed = sample_fmt.strip_suffix('p').unwrap_or(sample_fmt);
        let out = match packed {
            "u8" => Self::U8,
            "s16" => Self::I16,
            "s32" => Self::I32,
            "s64" => Self::I64,
            "flt" => Self::F32,
            "dbl" => Self::F64,
            _ => return None,
        };
        Some(out)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = FfpipeError;

    fn from_str(s: &str) -> FfpipeResult<Self> {
        // Byte-order prefix is optional; big-endian is rejected.
        let body = match s.as_bytes().first() {
            Some(b'<') | Some(b'|') | Some(b'=') => &s[1..],
            Some(b'>') => {
                return Err(FfpipeError::validation(format!(
                    "big-endian data type '{s}' is not supported"
                )));
            }
            _ => s,
        };
        let out = match body {
            "u1" | "uint8" => Self::U8,
            "i1" | "int8" => Self::I8,
            "u2" | "uint16" => Self::U16,
            "i2" | "int16" => Self::I16,
            "u4" | "uint32" => Self::U32,
            "i4" | "int32" => Self::I32,
            "i8" | "int64" => Self::I64,
            "f4" | "float32" => Self::F32,
            "f8" | "float64" => Self::F64,
            _ => {
                return Err(FfpipeError::validation(format!(
                    "unknown data type '{s}'"
                )));
            }
        };
        Ok(out)
    }
}

/// Absolute deadline derived from an optional relative timeout.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    pub(crate) fn after(timeout: Option<Duration>) -> Self {
        Self(timeout.map(|t| Instant::now() + t))
    }

    /// Time left, `None` when unbounded. Saturates at zero.
    pub(crate) fn remaining(self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub(crate) fn expired(self) -> bool {
        matches!(self.0, Some(at) if Instant::now() >= at)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
