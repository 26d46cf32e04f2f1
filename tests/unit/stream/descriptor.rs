use super::*;

const VIDEO: &str = "  Stream #0:0: Video: rawvideo (RGB[24] / 0x18424752), rgb24(pc, gbr/unknown/unknown, progressive), 320x240 [SAR 1:1 DAR 4:3], q=2-31, 46080 kb/s, 25 fps, 25 tbn";
const AUDIO: &str = "    Stream #1:2(eng): Audio: pcm_f32le, 48000 Hz, 5.1(side), flt, 9216 kb/s";

#[test]
fn parses_raw_video_stream() {
    let d = parse_stream_line(VIDEO).unwrap();
    assert_eq!((d.file_index, d.stream_index), (0, 0));
    assert_eq!(d.kind, MediaKind::Video);
    assert_eq!(d.codec.as_deref(), Some("rawvideo"));
    assert_eq!(d.pix_fmt.as_deref(), Some("rgb24"));
    assert_eq!((d.width, d.height), (Some(320), Some(240)));
    assert_eq!(d.sar.as_deref(), Some("1:1"));
    assert_eq!(d.dar.as_deref(), Some("4:3"));
    assert_eq!(d.frame_rate, Some(25.0));
    assert_eq!(d.bitrate_kbps, Some(46080.0));
    assert_eq!(
        d.element_format().unwrap(),
        (vec![240, 320, 3], DataType::U8)
    );
}

#[test]
fn parses_audio_stream_with_language_tag() {
    let d = parse_stream_line(AUDIO).unwrap();
    assert_eq!((d.file_index, d.stream_index), (1, 2));
    assert_eq!(d.kind, MediaKind::Audio);
    assert_eq!(d.sample_rate, Some(48000));
    assert_eq!(d.channel_layout.as_deref(), Some("5.1(side)"));
    assert_eq!(d.channels, Some(6));
    assert_eq!(d.sample_fmt.as_deref(), Some("flt"));
    assert_eq!(d.element_format().unwrap(), (vec![6], DataType::F32));
}

#[test]
fn falls_back_to_tbr_for_frame_rate() {
    let d = parse_stream_line(
        "Stream #0:0[0x1](und): Video: h264 (High), yuv420p(tv, bt709), 1920x1080, 29.97 tbr, 90k tbn",
    )
    .unwrap();
    assert_eq!(d.frame_rate, Some(29.97));
    assert_eq!(d.pix_fmt.as_deref(), Some("yuv420p"));
    assert!(d.element_format().is_err());
}

#[test]
fn rejects_non_stream_lines() {
    assert!(parse_stream_line("Output #0, rawvideo, to 'pipe:':").is_none());
    assert!(parse_stream_line("Stream #x:0: Video: foo").is_none());
    let d = parse_stream_line("Stream #0:3: Subtitle: mov_text").unwrap();
    assert_eq!(d.kind, MediaKind::Other("subtitle".into()));
    assert!(d.element_format().is_err());
}

#[test]
fn extract_matches_exact_stream_index() {
    let lines: Vec<String> = [
        "Input #0, lavfi, from 'testsrc':",
        "  Stream #0:0: Video: wrapped_avframe, rgb24, 64x48, 10 fps",
        "Output #0, rawvideo, to 'pipe:':",
        "  Stream #0:10: Audio: pcm_s16le, 8000 Hz, mono, s16, 128 kb/s",
        "  Stream #0:1: Audio: pcm_s16le, 44100 Hz, stereo, s16, 1411 kb/s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    let d = extract_output_stream(&lines, 2, 0, 1).unwrap();
    assert_eq!(d.sample_rate, Some(44100));
    assert_eq!(d.channels, Some(2));
    assert!(extract_output_stream(&lines, 2, 0, 0).is_none());
}

#[test]
fn channel_layout_names() {
    assert_eq!(channel_count("mono"), Some(1));
    assert_eq!(channel_count("stereo"), Some(2));
    assert_eq!(channel_count("7.1"), Some(8));
    assert_eq!(channel_count("3 channels"), Some(3));
    assert_eq!(channel_count("weird"), None);
}
