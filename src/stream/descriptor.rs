use crate::foundation::core::DataType;
use crate::foundation::error::{FfpipeError, FfpipeResult};

/// Kind of media carried by a stream.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
    /// Subtitle, data or attachment stream.
    Other(String),
}

/// Fields of one `Stream #<file>:<stream>` line of ffmpeg's diagnostic output.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct StreamDescriptor {
    /// File index (`Output #<file>`).
    pub file_index: usize,
    /// Stream index within the file.
    pub stream_index: usize,
    /// Media kind.
    pub kind: MediaKind,
    /// Codec name (`rawvideo`, `pcm_s16le`, ...).
    pub codec: Option<String>,
    /// Pixel format (video).
    pub pix_fmt: Option<String>,
    /// Frame width in pixels (video).
    pub width: Option<usize>,
    /// Frame height in pixels (video).
    pub height: Option<usize>,
    /// Sample aspect ratio, e.g. `1:1` (video).
    pub sar: Option<String>,
    /// Display aspect ratio, e.g. `4:3` (video).
    pub dar: Option<String>,
    /// Frame rate (video).
    pub frame_rate: Option<f64>,
    /// Sample rate in Hz (audio).
    pub sample_rate: Option<u32>,
    /// Channel layout name (audio).
    pub channel_layout: Option<String>,
    /// Channel count (audio).
    pub channels: Option<usize>,
    /// Sample format (audio).
    pub sample_fmt: Option<String>,
    /// Bitrate in kb/s.
    pub bitrate_kbps: Option<f64>,
}

impl StreamDescriptor {
    fn empty(file_index: usize, stream_index: usize, kind: MediaKind) -> Self {
        Self {
            file_index,
            stream_index,
            kind,
            codec: None,
            pix_fmt: None,
            width: None,
            height: None,
            sar: None,
            dar: None,
            frame_rate: None,
            sample_rate: None,
            channel_layout: None,
            channels: None,
            sample_fmt: None,
            bitrate_kbps: None,
        }
    }

    /// Element shape and data type of this stream's raw output.
    ///
    /// Video elements are frames `[height, width, components]`; audio elements are sample
    /// frames `[channels]`.
    pub fn element_format(&self) -> FfpipeResult<(Vec<usize>, DataType)> {
        match self.kind {
            MediaKind::Video => {
                let pix_fmt = self
                    .pix_fmt
                    .as_deref()
                    .ok_or_else(|| FfpipeError::validation("video stream has no pixel format"))?;
                let (dtype, ncomp) = DataType::from_pix_fmt(pix_fmt).ok_or_else(|| {
                    FfpipeError::validation(format!(
                        "pixel format '{pix_fmt}' has no packed raw layout"
                    ))
                })?;
                match (self.height, self.width) {
                    (Some(h), Some(w)) => Ok((vec![h, w, ncomp], dtype)),
                    _ => Err(FfpipeError::validation("video stream has no frame size")),
                }
            }
            MediaKind::Audio => {
                let sample_fmt = self
                    .sample_fmt
                    .as_deref()
                    .ok_or_else(|| FfpipeError::validation("audio stream has no sample format"))?;
                let dtype = DataType::from_sample_fmt(sample_fmt).ok_or_else(|| {
                    FfpipeError::validation(format!("unknown sample format '{sample_fmt}'"))
                })?;
                let channels = self
                    .channels
                    .ok_or_else(|| FfpipeError::validation("audio stream has no channel count"))?;
                Ok((vec![channels], dtype))
            }
            MediaKind::Other(ref kind) => Err(FfpipeError::validation(format!(
                "{kind} stream has no raw element format"
            ))),
        }
    }
}

/// Find `Stream #<file_id>:<stream_id>` at or after line `hint` and parse it.
pub fn extract_output_stream(
    lines: &[String],
    hint: usize,
    file_id: usize,
    stream_id: usize,
) -> Option<StreamDescriptor> {
    lines.iter().skip(hint).find_map(|line| {
        let d = parse_stream_line(line)?;
        (d.file_index == file_id && d.stream_index == stream_id).then_some(d)
    })
}

/// Parse a `Stream #f:s[...]: Kind: ...` line.
pub fn parse_stream_line(line: &str) -> Option<StreamDescriptor> {
    let rest = line.trim().strip_prefix("Stream #")?;
    let (file_index, rest) = take_number(rest)?;
    let (stream_index, rest) = take_number(rest.strip_prefix(':')?)?;
    // skip `(lang)` / `[0x1]` decorations up to the `: Kind:` separator
    let (_, rest) = rest.split_once(": ")?;
    let (kind, body) = rest.split_once(':')?;
    let kind = match kind.trim() {
        "Video" => MediaKind::Video,
        "Audio" => MediaKind::Audio,
        other => MediaKind::Other(other.to_lowercase()),
    };

    let mut d = StreamDescriptor::empty(file_index, stream_index, kind);
    let fields = split_top_level(body);
    d.codec = fields
        .first()
        .and_then(|f| f.split_whitespace().next())
        .map(str::to_string);
    if d.kind == MediaKind::Video {
        parse_video_fields(&mut d, &fields);
    } else if d.kind == MediaKind::Audio {
        parse_audio_fields(&mut d, &fields);
    }
    for field in &fields {
        if let Some(rate) = field.strip_suffix(" kb/s") {
            d.bitrate_kbps = rate.trim().parse().ok();
        }
    }
    Some(d)
}

fn parse_video_fields(d: &mut StreamDescriptor, fields: &[&str]) {
    if let Some(f) = fields.get(1)
        && parse_size(f).is_none()
    {
        let name = f.split(['(', ' ']).next().unwrap_or_default();
        if !name.is_empty() {
            d.pix_fmt = Some(name.to_string());
        }
    }
    let mut tbr = None;
    for field in fields.iter().skip(1) {
        if let Some((w, h)) = parse_size(field) {
            d.width = Some(w);
            d.height = Some(h);
            d.sar = bracket_value(field, "SAR ");
            d.dar = bracket_value(field, "DAR ");
        } else if let Some(fps) = field.strip_suffix(" fps") {
            d.frame_rate = parse_rate(fps);
        } else if let Some(r) = field.strip_suffix(" tbr") {
            tbr = parse_rate(r);
        }
    }
    if d.frame_rate.is_none() {
        d.frame_rate = tbr;
    }
}

fn parse_audio_fields(d: &mut StreamDescriptor, fields: &[&str]) {
    let Some(hz) = fields.iter().position(|f| f.ends_with(" Hz")) else {
        return;
    };
    d.sample_rate = fields[hz].trim_end_matches(" Hz").trim().parse().ok();
    if let Some(layout) = fields.get(hz + 1) {
        d.channels = channel_count(layout);
        d.channel_layout = Some(layout.to_string());
    }
    if let Some(fmt) = fields.get(hz + 2)
        && !fmt.ends_with(" kb/s")
    {
        d.sample_fmt = fmt.split_whitespace().next().map(str::to_string);
    }
}

fn take_number(s: &str) -> Option<(usize, &str)> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    Some((s[..end].parse().ok()?, &s[end..]))
}

/// Split on commas outside parentheses and brackets.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                out.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(s[start..].trim());
    out.retain(|f| !f.is_empty());
    out
}

fn parse_size(field: &str) -> Option<(usize, usize)> {
    let token = field.split_whitespace().next()?;
    let (w, h) = token.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

fn bracket_value(field: &str, key: &str) -> Option<String> {
    let start = field.find(key)? + key.len();
    let value = field[start..].split([' ', ']']).next()?;
    (!value.is_empty()).then(|| value.to_string())
}

fn parse_rate(s: &str) -> Option<f64> {
    let s = s.trim();
    let scale = match s.chars().last()? {
        'k' => 1e3,
        _ => 1.0,
    };
    let digits = s.trim_end_matches('k');
    digits.parse::<f64>().ok().map(|v| v * scale)
}

/// Channel count of an ffmpeg channel layout name.
pub fn channel_count(layout: &str) -> Option<usize> {
    let base = layout.split('(').next().unwrap_or(layout).trim();
    match base {
        "mono" => return Some(1),
        "stereo" | "downmix" => return Some(2),
        "quad" => return Some(4),
        "hexagonal" => return Some(6),
        "octagonal" => return Some(8),
        _ => {}
    }
    if let Some(n) = base.strip_suffix(" channels") {
        return n.trim().parse().ok();
    }
    // `5.1`, `7.1`, `2.1`: main channels plus LFE
    let (main, lfe) = base.split_once('.')?;
    Some(main.parse::<usize>().ok()? + lfe.parse::<usize>().ok()?)
}

#[cfg(test)]
#[path = "../../tests/unit/stream/descriptor.rs"]
mod tests;
