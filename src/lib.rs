//! Reactive layer for building multi-threaded ZeroMQ services whose
//! threads never share mutable state.
//!
//! The toolkit is a thin ergonomic shell around the transport's own
//! polling and consists of three cooperating pieces:
//!
//! - [`Poller`] waits on a dynamic, ordered set of sockets for
//!   readability, honoring the process interrupt latch and reporting
//!   context termination;
//! - [`EventLoop`] dispatches socket readability and timer expirations
//!   to user callbacks, which may re-enter the loop to add or remove
//!   work while it runs;
//! - [`Actor`] runs a user body on its own thread, owning one end of a
//!   private PAIR pipe, and synchronizes start-up and shutdown with the
//!   parent thread through tiny [`Signal`] control frames.
//!
//! Two cross-cutting services complete the picture: the process
//! interrupt latch fed by SIGINT/SIGTERM (see
//! [`install_interrupt_handler`]) and EINTR-tolerant send/receive
//! wrappers (see [`send_retry_on_eintr`] and friends).
//!
//! Sockets registered with a [`Poller`] or an [`EventLoop`] stay owned
//! by the caller; the toolkit stores plain references and identifies a
//! socket by its handle. Each poller, loop and actor instance belongs
//! to a single thread; the only intentionally shared state is the
//! interrupt latch and an actor's internal panic cell.

#[macro_use]
extern crate amplify;

mod actor;
mod error;
mod event_loop;
mod interrupt;
mod io;
mod poller;
mod signal;

pub use actor::Actor;
pub use error::Error;
pub use event_loop::{EventLoop, TimerId};
pub use interrupt::{
    install_interrupt_handler, is_interrupted, reset_interrupted, restore_interrupt_handler,
};
pub use io::{
    recv_into_retry_on_eintr, recv_msg_retry_on_eintr, recv_retry_on_eintr,
    send_msg_retry_on_eintr, send_retry_on_eintr,
};
pub use poller::Poller;
pub use signal::Signal;
