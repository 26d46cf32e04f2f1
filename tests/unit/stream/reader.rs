use super::*;
use crate::buffer::codec::F32SamplesCodec;
use std::io::{Cursor, Write};

/// Hands out at most one byte per `read` call.
struct Trickle(Cursor<Vec<u8>>);

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = buf.len().min(1);
        self.0.read(&mut buf[..n])
    }
}

fn bytes(range: std::ops::Range<u8>) -> Vec<u8> {
    range.collect()
}

#[test]
fn start_requires_element_format() {
    let mut r = FrameReader::new(ReaderOpts::default());
    let err = r.start(Cursor::new(Vec::new())).unwrap_err();
    assert!(matches!(err, FfpipeError::Validation(_)));
    assert!(r.read(ReadCount::Available, None).unwrap_err().is_not_running());
}

#[test]
fn short_reads_are_accumulated_into_whole_elements() {
    let mut r = FrameReader::new(ReaderOpts::new(vec![3], DataType::U8));
    r.start(Trickle(Cursor::new(bytes(0..31)))).unwrap();

    let first = r.read(ReadCount::Exact(4), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(first.count(), 4);
    assert_eq!(first.data(), bytes(0..12).as_slice());

    // the trailing partial element (byte 30) is dropped
    let rest = r.read_all(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(rest.data(), bytes(12..30).as_slice());
    r.join(None).unwrap();
    assert_eq!(r.state(), ThreadState::Finished);
}

#[test]
fn exact_reads_from_a_continuous_producer_keep_order() {
    let (rx, mut tx) = std::io::pipe().unwrap();
    let opts = ReaderOpts {
        nmin: Some(4),
        ..ReaderOpts::new(vec![2], DataType::U8)
    };
    let mut r = FrameReader::new(opts);
    r.start(rx).unwrap();

    let producer = std::thread::spawn(move || {
        for chunk in bytes(0..200).chunks(14) {
            tx.write_all(chunk).unwrap();
            std::thread::sleep(Duration::from_millis(2));
        }
    });

    let a = r.read(ReadCount::Exact(10), None).unwrap();
    assert_eq!(a.data(), bytes(0..20).as_slice());
    let b = r.read(ReadCount::Exact(5), None).unwrap();
    assert_eq!(b.data(), bytes(20..30).as_slice());

    producer.join().unwrap();
    let rest = r.read_all(None).unwrap();
    assert_eq!(rest.count(), 85);
    assert_eq!(rest.data(), bytes(30..200).as_slice());

    let end = r.read(ReadCount::Exact(3), None).unwrap();
    assert!(end.is_empty());
    assert_eq!(end.shape(), &[2]);
}

#[test]
fn available_never_blocks_and_drain_takes_everything_queued() {
    let (rx, mut tx) = std::io::pipe().unwrap();
    let mut r = FrameReader::new(ReaderOpts::new(vec![1], DataType::I16));
    r.start(rx).unwrap();

    assert_eq!(r.read(ReadCount::Available, None).unwrap().count(), 0);
    assert_eq!(ReadCount::from(0), ReadCount::Available);

    tx.write_all(&[1, 0, 2, 0]).unwrap();
    let first = r.read(ReadCount::from(-1), Some(Duration::from_secs(5))).unwrap();
    assert!(first.count() >= 1);
    tx.write_all(&[3, 0]).unwrap();
    drop(tx);
    let mut all = first.into_data();
    all.extend(r.read_all(Some(Duration::from_secs(5))).unwrap().into_data());
    assert_eq!(all, vec![1, 0, 2, 0, 3, 0]);
}

#[test]
fn timeout_keeps_collected_elements_for_the_next_read() {
    let (rx, mut tx) = std::io::pipe().unwrap();
    let mut r = FrameReader::new(ReaderOpts::new(vec![1], DataType::U8));
    r.start(rx).unwrap();

    tx.write_all(&[1, 2, 3]).unwrap();
    let err = r
        .read(ReadCount::Exact(5), Some(Duration::from_millis(50)))
        .unwrap_err();
    assert!(err.is_timeout());

    tx.write_all(&[4, 5, 6]).unwrap();
    let got = r.read(ReadCount::Exact(5), Some(Duration::from_secs(5))).unwrap();
    assert_eq!(got.data(), &[1, 2, 3, 4, 5]);
    drop(tx);
    assert_eq!(r.read_all(None).unwrap().data(), &[6]);
}

#[test]
fn join_discards_a_full_queue_without_timeout() {
    let opts = ReaderOpts {
        nmin: Some(1),
        queue_size: Some(1),
        ..ReaderOpts::new(vec![4], DataType::U8)
    };
    let mut r = FrameReader::new(opts);
    r.start(Cursor::new(vec![7u8; 4 * 64])).unwrap();
    r.join(None).unwrap();
    assert_eq!(r.state(), ThreadState::Finished);
}

#[test]
fn join_times_out_while_the_producer_is_alive() {
    let (rx, tx) = std::io::pipe().unwrap();
    let mut r = FrameReader::new(ReaderOpts::new(vec![1], DataType::U8));
    r.start(rx).unwrap();
    assert!(r.join(Some(Duration::from_millis(30))).unwrap_err().is_timeout());
    drop(tx);
    r.join(Some(Duration::from_secs(5))).unwrap();
}

#[test]
fn cool_down_stops_collection() {
    let (rx, mut tx) = std::io::pipe().unwrap();
    let mut r = FrameReader::new(ReaderOpts::new(vec![1], DataType::U8));
    r.start(rx).unwrap();
    r.cool_down();
    tx.write_all(&[1, 2, 3]).unwrap();
    drop(tx);
    r.join(Some(Duration::from_secs(5))).unwrap();
    assert!(r.read_all(None).unwrap().is_empty());
}

#[test]
fn read_with_decodes_through_a_codec() {
    let samples = [0.5f32, -0.5, 1.0, -1.0];
    let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    let mut r = FrameReader::new(ReaderOpts::new(vec![2], DataType::F32));
    r.start(Cursor::new(data)).unwrap();
    let out = r
        .read_with(&F32SamplesCodec::new(2), ReadCount::Exact(2), Some(Duration::from_secs(5)))
        .unwrap();
    assert_eq!(out, samples.to_vec());
}

#[test]
fn signed_counts_map_to_read_modes() {
    assert_eq!(ReadCount::from(7i64), ReadCount::Exact(7));
    assert_eq!(ReadCount::from(-3i64), ReadCount::Drain);
    assert_eq!(ReadCount::from(0i64), ReadCount::Available);
    let big = ReadCount::from(i64::MAX);
    assert_eq!(
        big,
        ReadCount::Exact(usize::try_from(i64::MAX).unwrap_or(usize::MAX))
    );
}
