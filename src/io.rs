//! Send and receive helpers that transparently retry calls interrupted
//! by signal delivery.
//!
//! Only EINTR is retried. In particular a non-blocking operation that
//! is not ready reports the transport's native EAGAIN, which the
//! wrappers pass through untouched together with every other error;
//! callers combining [`zmq::DONTWAIT`] with these helpers must be
//! prepared for "not ready" results.

use zmq::{Message, Socket};

/// Sends a byte buffer, retrying while the call keeps being interrupted.
pub fn send_retry_on_eintr(socket: &Socket, data: &[u8], flags: i32) -> zmq::Result<()> {
    loop {
        match socket.send(data, flags) {
            Err(zmq::Error::EINTR) => continue,
            result => return result,
        }
    }
}

/// Sends a message, retrying while the call keeps being interrupted.
///
/// The transport consumes messages on send, so every attempt goes
/// through the message bytes; the frame delivered to the peer is
/// identical.
pub fn send_msg_retry_on_eintr(socket: &Socket, msg: &Message, flags: i32) -> zmq::Result<()> {
    send_retry_on_eintr(socket, msg, flags)
}

/// Receives into a caller-provided message, retrying while the call
/// keeps being interrupted.
pub fn recv_retry_on_eintr(socket: &Socket, msg: &mut Message, flags: i32) -> zmq::Result<()> {
    loop {
        match socket.recv(msg, flags) {
            Err(zmq::Error::EINTR) => continue,
            result => return result,
        }
    }
}

/// Receives a fresh message, retrying while the call keeps being
/// interrupted.
pub fn recv_msg_retry_on_eintr(socket: &Socket, flags: i32) -> zmq::Result<Message> {
    loop {
        match socket.recv_msg(flags) {
            Err(zmq::Error::EINTR) => continue,
            result => return result,
        }
    }
}

/// Receives into a byte buffer, retrying while the call keeps being
/// interrupted. Returns the length of the received frame, which may
/// exceed the buffer when the frame was truncated.
pub fn recv_into_retry_on_eintr(socket: &Socket, buf: &mut [u8], flags: i32) -> zmq::Result<usize> {
    loop {
        match socket.recv_into(buf, flags) {
            Err(zmq::Error::EINTR) => continue,
            result => return result,
        }
    }
}
