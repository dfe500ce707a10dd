use std::thread;
use std::time::{Duration, Instant};

use zmq_reactor::Poller;

fn push_pull(ctx: &zmq::Context, address: &str) -> (zmq::Socket, zmq::Socket) {
    let pull = ctx.socket(zmq::PULL).unwrap();
    pull.bind(address).unwrap();
    let push = ctx.socket(zmq::PUSH).unwrap();
    push.connect(address).unwrap();
    (push, pull)
}

#[test]
fn reports_the_first_ready_socket_in_registration_order() {
    let ctx = zmq::Context::new();
    let (push1, pull1) = push_pull(&ctx, "inproc://poller-first-1");
    let (push2, pull2) = push_pull(&ctx, "inproc://poller-first-2");
    let mut poller = Poller::new();
    poller.add(&pull1).unwrap();
    poller.add(&pull2).unwrap();

    push2.send("second", 0).unwrap();
    push1.send("first", 0).unwrap();

    let ready = poller
        .wait(Some(Duration::from_secs(1)))
        .unwrap()
        .expect("a socket must be ready");
    assert!(std::ptr::eq(ready, &pull1));
    assert!(!poller.terminated());
}

#[test]
fn wait_all_returns_every_ready_socket_in_registration_order() {
    let ctx = zmq::Context::new();
    let (push1, pull1) = push_pull(&ctx, "inproc://poller-all-1");
    let (_push2, pull2) = push_pull(&ctx, "inproc://poller-all-2");
    let (push3, pull3) = push_pull(&ctx, "inproc://poller-all-3");
    let mut poller = Poller::new();
    poller.add(&pull1).unwrap();
    poller.add(&pull2).unwrap();
    poller.add(&pull3).unwrap();

    push3.send("c", 0).unwrap();
    push1.send("a", 0).unwrap();

    let ready = poller.wait_all(Some(Duration::from_secs(1))).unwrap();
    assert_eq!(ready.len(), 2);
    assert!(std::ptr::eq(ready[0], &pull1));
    assert!(std::ptr::eq(ready[1], &pull3));
    assert!(!poller.terminated());
}

#[test]
fn duplicate_registration_is_rejected() {
    let ctx = zmq::Context::new();
    let (_push, pull) = push_pull(&ctx, "inproc://poller-dup");
    let mut poller = Poller::new();
    poller.add(&pull).unwrap();
    assert!(poller.add(&pull).is_err());
    assert_eq!(poller.len(), 1);
}

#[test]
fn wait_lingers_for_the_timeout_with_nothing_ready() {
    let ctx = zmq::Context::new();
    let (_push, pull) = push_pull(&ctx, "inproc://poller-linger");
    let mut poller = Poller::new();
    poller.add(&pull).unwrap();

    let started = Instant::now();
    let ready = poller.wait(Some(Duration::from_millis(50))).unwrap();
    assert!(ready.is_none());
    assert!(started.elapsed() >= Duration::from_millis(45));
    assert!(!poller.terminated());
}

#[test]
fn empty_poller_sleeps_for_the_full_timeout() {
    let mut poller = Poller::new();
    let started = Instant::now();
    assert!(poller
        .wait_all(Some(Duration::from_millis(50)))
        .unwrap()
        .is_empty());
    assert!(started.elapsed() >= Duration::from_millis(45));
    assert!(!poller.terminated());
}

#[test]
fn removed_socket_is_not_reported() {
    let ctx = zmq::Context::new();
    let (push, pull) = push_pull(&ctx, "inproc://poller-removed");
    let mut poller = Poller::new();
    poller.add(&pull).unwrap();
    push.send("pending", 0).unwrap();

    poller.remove(&pull);
    assert_eq!(poller.len(), 0);
    assert!(poller
        .wait(Some(Duration::from_millis(20)))
        .unwrap()
        .is_none());
}

#[test]
fn removing_an_unknown_socket_is_a_noop() {
    let ctx = zmq::Context::new();
    let (_push, pull) = push_pull(&ctx, "inproc://poller-unknown");
    let mut poller = Poller::new();
    poller.remove(&pull);
    assert!(poller.is_empty());
}

#[test]
fn context_shutdown_terminates_the_wait() {
    let ctx = zmq::Context::new();
    let socket = ctx.socket(zmq::PULL).unwrap();
    socket.bind("inproc://poller-eterm").unwrap();
    let mut poller = Poller::new();
    poller.add(&socket).unwrap();

    let mut terminator = ctx.clone();
    let shutdown = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let _ = terminator.destroy();
    });

    let ready = poller.wait_all(None).unwrap();
    assert!(ready.is_empty());
    assert!(poller.terminated());

    drop(poller);
    drop(socket);
    shutdown.join().unwrap();
}

#[test]
fn termination_flag_resets_on_the_next_wait() {
    let ctx = zmq::Context::new();
    let socket = ctx.socket(zmq::PULL).unwrap();
    socket.bind("inproc://poller-reset").unwrap();
    let mut poller = Poller::new();
    poller.add(&socket).unwrap();

    let mut terminator = ctx.clone();
    let shutdown = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let _ = terminator.destroy();
    });
    assert!(poller.wait(None).unwrap().is_none());
    assert!(poller.terminated());

    // The terminated context keeps answering ETERM, but the flag must
    // have been cleared on entry before it is set again.
    poller.remove(&socket);
    drop(socket);
    shutdown.join().unwrap();

    assert!(poller.wait(Some(Duration::from_millis(5))).unwrap().is_none());
    assert!(!poller.terminated());
}
