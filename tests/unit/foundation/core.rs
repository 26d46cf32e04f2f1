use std::time::Duration;

use super::*;

#[test]
fn numpy_strings_parse_by_byte_width() {
    assert_eq!("|u1".parse::<DataType>().unwrap(), DataType::U8);
    assert_eq!("<i2".parse::<DataType>().unwrap(), DataType::I16);
    assert_eq!("<f4".parse::<DataType>().unwrap(), DataType::F32);
    assert_eq!("i8".parse::<DataType>().unwrap(), DataType::I64);
    assert_eq!("float64".parse::<DataType>().unwrap(), DataType::F64);
    assert!(">f4".parse::<DataType>().is_err());
    assert!("<c8".parse::<DataType>().is_err());
}

#[test]
fn display_matches_parse() {
    for dt in [
        DataType::U8,
        DataType::I8,
        DataType::U16,
        DataType::I16,
        DataType::U32,
        DataType::I32,
        DataType::I64,
        DataType::F32,
        DataType::F64,
    ] {
        assert_eq!(dt.to_string().parse::<DataType>().unwrap(), dt);
        assert_eq!(dt.as_str().as_bytes().last().copied(), Some(b'0' + dt.size() as u8));
    }
}

#[test]
fn ffmpeg_formats_map_to_data_types() {
    assert_eq!(DataType::from_pix_fmt("rgb24"), Some((DataType::U8, 3)));
    assert_eq!(DataType::from_pix_fmt("gray16le"), Some((DataType::U16, 1)));
    assert_eq!(DataType::from_pix_fmt("yuv420p"), None);

    assert_eq!(DataType::from_sample_fmt("s16"), Some(DataType::I16));
    assert_eq!(DataType::from_sample_fmt("fltp"), Some(DataType::F32));
    assert_eq!(DataType::from_sample_fmt("dbl"), Some(DataType::F64));
    assert_eq!(DataType::from_sample_fmt("s24"), None);
}

#[test]
fn deadline_without_timeout_never_expires() {
    let d = Deadline::after(None);
    assert!(!d.expired());
    assert_eq!(d.remaining(), None);

    let d = Deadline::after(Some(Duration::ZERO));
    assert!(d.expired());
    assert_eq!(d.remaining(), Some(Duration::ZERO));
}
