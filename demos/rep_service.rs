//! End-to-end demo: a REP request socket, an echo actor and a periodic
//! status timer wired into one interruptible event loop.
//!
//! Run with `cargo run --example rep_service`, talk to it with any REQ
//! client on tcp://127.0.0.1:5555 and stop it with Ctrl+C.

use std::error::Error as StdError;
use std::time::Duration;

use zmq_reactor::{
    install_interrupt_handler, recv_msg_retry_on_eintr, send_msg_retry_on_eintr,
    send_retry_on_eintr, Actor, EventLoop, Signal,
};

/// Actor body: echoes every payload back to the parent from its own
/// event loop until the stop request arrives.
fn echo_actor(socket: &zmq::Socket) -> bool {
    let mut worker = EventLoop::new();
    let registered = worker.add_socket(socket, |_, socket| {
        let msg = match recv_msg_retry_on_eintr(socket, zmq::DONTWAIT) {
            Ok(msg) => msg,
            Err(_) => return true,
        };
        if Signal::decode(&msg) == Some(Signal::Stop) {
            return false;
        }
        println!("[actor] received: {}", msg.as_str().unwrap_or("<binary>"));
        send_msg_retry_on_eintr(socket, &msg, 0).is_ok()
    });
    if registered.is_err() {
        return false;
    }
    if send_retry_on_eintr(socket, &Signal::Success.encode(), 0).is_err() {
        return false;
    }
    // Non-interruptible: only the parent's stop request ends this loop,
    // so the actor drains its queue even while the process shuts down.
    worker.run_with(false, None).is_ok()
}

fn main() -> Result<(), Box<dyn StdError>> {
    install_interrupt_handler();

    let context = zmq::Context::new();
    let mut actor = Actor::new(&context)?;
    actor.start(echo_actor)?;

    let rep = context.socket(zmq::REP)?;
    rep.bind("tcp://127.0.0.1:5555")?;

    let actor_socket = actor.socket().expect("actor just started");
    let mut main_loop = EventLoop::new();

    main_loop.add_socket(actor_socket, |_, socket| {
        match recv_msg_retry_on_eintr(socket, zmq::DONTWAIT) {
            Ok(msg) => {
                println!("[main] actor echoed: {}", msg.as_str().unwrap_or("<binary>"));
                true
            }
            Err(_) => false,
        }
    })?;

    main_loop.add_socket(&rep, move |_, socket| {
        let request = match recv_msg_retry_on_eintr(socket, zmq::DONTWAIT) {
            Ok(msg) => msg,
            Err(_) => return false,
        };
        println!(
            "[main] request received, forwarding to actor: {}",
            request.as_str().unwrap_or("<binary>")
        );
        if send_msg_retry_on_eintr(actor_socket, &request, 0).is_err() {
            return false;
        }
        send_retry_on_eintr(socket, b"Ok", 0).is_ok()
    })?;

    main_loop.add_timer(Duration::from_secs(2), 0, |_, _| {
        println!("[main] timer event, application is running");
        true
    })?;

    println!("[main] serving on tcp://127.0.0.1:5555, Ctrl+C stops");
    // The finite check interval bounds shutdown latency on platforms
    // where the poll primitive does not wake on signal delivery.
    main_loop.run_with(true, Some(Duration::from_millis(500)))?;

    println!("[main] loop finished, stopping actor");
    // The actor's destructor performs the stop handshake.
    Ok(())
}
