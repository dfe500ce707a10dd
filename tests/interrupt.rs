#![cfg(unix)]

use std::thread;
use std::time::{Duration, Instant};

use zmq_reactor::{
    install_interrupt_handler, is_interrupted, reset_interrupted, restore_interrupt_handler,
    EventLoop, Poller,
};

fn current_sigint_disposition() -> libc::sighandler_t {
    let mut action: libc::sigaction = unsafe { std::mem::zeroed() };
    unsafe { libc::sigaction(libc::SIGINT, std::ptr::null(), &mut action) };
    action.sa_sigaction
}

// The latch is process-global, so the whole lifecycle runs in one test
// body instead of racing across the harness's worker threads.
#[test]
fn latch_lifecycle_and_loop_interruption() {
    let disposition_before = current_sigint_disposition();

    install_interrupt_handler();
    assert_ne!(current_sigint_disposition(), disposition_before);
    assert!(!is_interrupted());

    unsafe { libc::raise(libc::SIGINT) };
    assert!(is_interrupted());
    reset_interrupted();
    assert!(!is_interrupted());

    // A loop watching a silent socket leaves the poll only through the
    // periodic interrupt check; the raising thread never touches it.
    let ctx = zmq::Context::new();
    let silent = ctx.socket(zmq::PULL).unwrap();
    silent.bind("inproc://interrupt-silent").unwrap();
    let mut evl = EventLoop::new();
    evl.add_socket(&silent, |_, _| true).unwrap();

    let raiser = thread::spawn(|| {
        thread::sleep(Duration::from_millis(20));
        unsafe { libc::raise(libc::SIGINT) };
    });

    let started = Instant::now();
    evl.run_with(true, Some(Duration::from_millis(5))).unwrap();
    assert!(evl.terminated());
    assert!(started.elapsed() < Duration::from_secs(2));
    raiser.join().unwrap();

    // With the latch still set, an interruptible poller terminates on
    // its pre-check without blocking.
    let mut interruptible = Poller::new();
    interruptible.add(&silent).unwrap();
    let checked = Instant::now();
    assert!(interruptible
        .wait(Some(Duration::from_secs(5)))
        .unwrap()
        .is_none());
    assert!(interruptible.terminated());
    assert!(checked.elapsed() < Duration::from_secs(1));

    // A non-interruptible poller ignores the latch and just times out.
    let mut stubborn = Poller::new();
    stubborn.set_interruptible(false);
    assert!(!stubborn.is_interruptible());
    stubborn.add(&silent).unwrap();
    assert!(stubborn
        .wait(Some(Duration::from_millis(10)))
        .unwrap()
        .is_none());
    assert!(!stubborn.terminated());

    // The flag survives the restore; only reset clears it.
    restore_interrupt_handler();
    assert_eq!(current_sigint_disposition(), disposition_before);
    assert!(is_interrupted());
    reset_interrupted();

    // A second install saves and restores again.
    install_interrupt_handler();
    assert_ne!(current_sigint_disposition(), disposition_before);
    restore_interrupt_handler();
    assert_eq!(current_sigint_disposition(), disposition_before);
}
