use super::*;
use std::io::Write;
use std::sync::Mutex;

const BLOCKS: &str = "frame=10\nfps=24.5\nout_time=00:00:00.400000\nprogress=continue\n\
frame=20\nfps=25.0\nout_time_us=800000\nprogress=continue\n\
frame=25\nbitrate=N/A\nprogress=end\n";

#[test]
fn parser_emits_one_snapshot_per_block() {
    let mut p = ProgressParser::default();
    let snaps = p.feed(BLOCKS.as_bytes(), false);
    assert_eq!(snaps.len(), 3);
    assert_eq!(snaps[0].frame(), Some(10));
    assert_eq!(snaps[0].get("fps"), Some(&ProgressValue::Float(24.5)));
    assert_eq!(
        snaps[0].get("out_time"),
        Some(&ProgressValue::Text("00:00:00.400000".into()))
    );
    assert!(snaps[0].get("progress").is_none());
    assert_eq!(snaps[1].out_time_us(), Some(800_000));
    assert_eq!(snaps.iter().map(|s| s.done).collect::<Vec<_>>(), vec![false, false, true]);
    assert_eq!(snaps[2].get("bitrate"), Some(&ProgressValue::Text("N/A".into())));
}

#[test]
fn parser_holds_partial_lines() {
    let mut p = ProgressParser::default();
    assert!(p.feed(b"frame=1\nprog", false).is_empty());
    let snaps = p.feed(b"ress=continue\nframe=2\nprogress=e", false);
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].frame(), Some(1));
    let snaps = p.feed(b"nd", true);
    assert_eq!(snaps.len(), 1);
    assert!(snaps[0].done);
    assert_eq!(snaps[0].frame(), Some(2));
}

#[test]
fn parser_skips_malformed_lines() {
    let mut p = ProgressParser::default();
    let snaps = p.feed(b"garbage\n=1\nkey=\nframe=3\r\nprogress=end\n", false);
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0].values.len(), 1);
    assert_eq!(snaps[0].frame(), Some(3));
}

#[test]
fn disabled_monitor_is_inert() {
    let mut m = ProgressMonitor::new(None, None, ProgressOpts::default()).unwrap();
    assert!(m.url().is_none());
    m.start().unwrap();
    assert_eq!(m.state(), ProgressState::Idle);
    m.join(None).unwrap();
}

fn recording_callback() -> (ProgressCallback, Arc<Mutex<Vec<ProgressSnapshot>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cb: ProgressCallback = Box::new(move |s: &ProgressSnapshot| {
        sink.lock().unwrap().push(s.clone());
        Ok(false)
    });
    (cb, seen)
}

#[test]
fn monitor_reports_each_block_of_a_growing_file() {
    let dir = tempfile::tempdir().unwrap();
    let url = dir.path().join("progress.txt");
    let (cb, seen) = recording_callback();
    let mut m = ProgressMonitor::new(Some(cb), None, ProgressOpts::new(&url)).unwrap();
    assert_eq!(m.url(), Some(url.as_path()));
    m.start().unwrap();

    std::thread::sleep(Duration::from_millis(30));
    let mut f = File::create(&url).unwrap();
    for block in BLOCKS.split_inclusive("progress=continue\n") {
        f.write_all(block.as_bytes()).unwrap();
        f.flush().unwrap();
        std::thread::sleep(Duration::from_millis(30));
    }
    m.join(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(m.state(), ProgressState::Stopped);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(
        seen.iter().map(|s| s.done).collect::<Vec<_>>(),
        vec![false, false, true]
    );
}

#[test]
fn file_written_before_stop_is_still_drained() {
    let dir = tempfile::tempdir().unwrap();
    let url = dir.path().join("progress.txt");
    std::fs::write(&url, BLOCKS).unwrap();
    let (cb, seen) = recording_callback();
    let opts = ProgressOpts {
        url: Some(url),
        interval: Duration::from_secs(1),
    };
    let mut m = ProgressMonitor::new(Some(cb), None, opts).unwrap();
    m.start().unwrap();
    m.join(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[test]
fn callback_failures_do_not_stop_the_monitor_and_true_cancels() {
    let dir = tempfile::tempdir().unwrap();
    let url = dir.path().join("progress.txt");
    std::fs::write(&url, BLOCKS).unwrap();

    let calls = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&calls);
    let cb: ProgressCallback = Box::new(move |s: &ProgressSnapshot| {
        *counter.lock().unwrap() += 1;
        match s.frame() {
            Some(10) => anyhow::bail!("boom"),
            Some(20) => panic!("callback panic"),
            _ => Ok(s.done),
        }
    });
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let cancel: CancelAction = Box::new(move || flag.store(true, Ordering::SeqCst));

    let mut m = ProgressMonitor::new(Some(cb), Some(cancel), ProgressOpts::new(&url)).unwrap();
    m.start().unwrap();
    m.join(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(*calls.lock().unwrap(), 3);
    assert!(cancelled.load(Ordering::SeqCst));
}

#[test]
fn private_progress_file_lives_in_a_temp_dir() {
    let (cb, _) = recording_callback();
    let mut m = ProgressMonitor::new(Some(cb), None, ProgressOpts::default()).unwrap();
    let url = m.url().unwrap().to_path_buf();
    assert_eq!(url.file_name().unwrap(), "progress.txt");
    let dir = url.parent().unwrap().to_path_buf();
    assert!(dir.is_dir());
    m.start().unwrap();
    m.join(Some(Duration::from_secs(5))).unwrap();
    assert!(!dir.exists());
}
