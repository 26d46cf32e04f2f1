use super::*;

#[test]
fn thread_state_transitions() {
    let cell = StateCell::new(ThreadState::Idle);
    assert!(!cell.advance(ThreadState::Idle));
    assert!(cell.advance(ThreadState::Running));
    assert!(!cell.advance(ThreadState::Idle));
    assert!(cell.advance(ThreadState::Finished));
    assert!(!cell.advance(ThreadState::Running));
    assert_eq!(cell.get(), ThreadState::Finished);
}

#[test]
fn progress_state_transitions() {
    let cell = StateCell::new(ProgressState::Idle);
    assert!(!cell.advance(ProgressState::Tailing));
    assert!(cell.advance(ProgressState::WaitingForFile));
    assert!(cell.advance(ProgressState::Tailing));
    assert!(!cell.advance(ProgressState::WaitingForFile));
    assert!(cell.advance(ProgressState::Stopped));
    assert!(ProgressState::Stopped.is_terminal());
}

#[test]
fn wait_terminal_times_out_then_wakes() {
    let cell = StateCell::new(ThreadState::Running);
    assert!(!cell.wait_terminal(Some(Duration::from_millis(20))));

    let other = cell.clone();
    let t = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        other.advance(ThreadState::Finished);
    });
    assert!(cell.wait_terminal(Some(Duration::from_secs(5))));
    t.join().unwrap();
    assert!(cell.wait_terminal(None));
}
