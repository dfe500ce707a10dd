use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rand::Rng;
use zmq::{Context, Socket};

use crate::io::{recv_msg_retry_on_eintr, send_retry_on_eintr};
use crate::signal::Signal;
use crate::Error;

/// Budget the destructor grants [`Actor::stop`], so a misbehaving body
/// cannot block teardown forever.
const DEFAULT_DESTRUCTOR_TIMEOUT: Duration = Duration::from_millis(100);

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(0);

/// Single-writer, single-reader slot carrying a panic message from the
/// worker to the parent. Written at most once, before the failure
/// signal; read at most once, after it.
type PanicCell = Arc<Mutex<Option<String>>>;

/// Worker thread owning one end of a private PAIR pipe.
///
/// Construction creates the pipe inside a caller-provided context and
/// binds the parent end to a unique inproc address. [`Actor::start`]
/// hands the child end to a freshly spawned thread running the
/// user-provided body and blocks until the body reports readiness with
/// a [`Signal`]; [`Actor::stop`] requests shutdown with a stop signal
/// and waits for the acknowledgement within a budget. Dropping the
/// actor stops it with the configured destructor timeout and swallows
/// every error.
///
/// The body must send a success frame as its first act once its setup
/// is done (`Signal::create_success()`), then serve the pipe until it
/// observes a stop frame and returns. Its boolean return value stands
/// for "initialization succeeded": a body that returns without having
/// sent its own signal makes the wrapper emit one on its behalf, which
/// unblocks the parent. A body that panics before readiness has the
/// panic reported out of [`Actor::start`].
///
/// The parent socket belongs to the constructing thread, the child
/// socket to the worker thread; the pipe between them is the only
/// communication channel.
pub struct Actor {
    parent: Option<Socket>,
    child: Option<Socket>,
    panic_cell: PanicCell,
    started: bool,
    stopped: bool,
    destructor_timeout: Duration,
}

impl Actor {
    /// Creates the PAIR pipe inside `context`. The parent end binds to
    /// an inproc address unique to this instance; the child end is
    /// connected and parked until [`Actor::start`].
    pub fn new(context: &Context) -> Result<Self, Error> {
        let parent = context.socket(zmq::PAIR)?;
        let child = context.socket(zmq::PAIR)?;
        let address = bind_to_unique_address(&parent)?;
        child.connect(&address)?;
        Ok(Actor {
            parent: Some(parent),
            child: Some(child),
            panic_cell: Arc::new(Mutex::new(None)),
            started: false,
            stopped: false,
            destructor_timeout: DEFAULT_DESTRUCTOR_TIMEOUT,
        })
    }

    /// Spawns the worker thread and blocks until the body signals its
    /// readiness.
    ///
    /// Success makes `start` return `Ok`. A failure signal surfaces the
    /// captured panic as [`Error::ActorPanicked`] when there is one and
    /// [`Error::ActorInitFailed`] otherwise; in both cases the actor
    /// counts as stopped and the parent socket is closed, as it is when
    /// no signal arrives at all ([`Error::NoInitSignal`]).
    pub fn start<F>(&mut self, body: F) -> Result<(), Error>
    where
        F: FnOnce(&Socket) -> bool + Send + 'static,
    {
        if self.started {
            return Err(Error::ActorAlreadyStarted);
        }
        let child = self.child.take().expect("child socket is present before start");
        let cell = Arc::clone(&self.panic_cell);
        thread::spawn(move || execute(body, child, cell));
        self.started = true;

        match recv_msg_retry_on_eintr(self.parent(), 0) {
            Ok(msg) => {
                if Signal::decode(&msg) == Some(Signal::Success) {
                    return Ok(());
                }
                self.close();
                let panicked = self
                    .panic_cell
                    .lock()
                    .unwrap_or_else(|err| err.into_inner())
                    .take();
                match panicked {
                    Some(message) => Err(Error::ActorPanicked(message)),
                    None => Err(Error::ActorInitFailed),
                }
            }
            Err(zmq::Error::EAGAIN) => {
                self.close();
                Err(Error::NoInitSignal)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Requests shutdown and waits for the acknowledgement.
    ///
    /// Returns `Ok(true)` once the worker acknowledged (or was already
    /// gone, or the actor never ran) and `Ok(false)` when no
    /// acknowledgement arrived within `timeout` (`None` waits forever).
    /// Payload frames the worker sent before noticing the request are
    /// drained and discarded. Every completion path leaves the actor
    /// stopped with the parent socket closed; repeated calls return
    /// `Ok(true)` without side effects.
    pub fn stop(&mut self, timeout: Option<Duration>) -> Result<bool, Error> {
        if !self.started || self.stopped {
            return Ok(true);
        }
        match send_retry_on_eintr(self.parent(), &Signal::Stop.encode(), zmq::DONTWAIT) {
            Ok(()) => {}
            Err(zmq::Error::EAGAIN) => {
                // Queue full or peer gone; consider the worker dead.
                self.close();
                return Ok(true);
            }
            Err(err) => return Err(err.into()),
        }
        let started_at = Instant::now();
        loop {
            let received = {
                let parent = self.parent();
                parent.set_rcvtimeo(remaining_budget_millis(timeout, started_at))?;
                recv_msg_retry_on_eintr(parent, 0)
            };
            match received {
                Ok(msg) if Signal::decode(&msg).is_some() => break,
                Ok(_) => {
                    // Payload sent before the worker observed the stop
                    // request; drain it and keep waiting.
                }
                Err(zmq::Error::EAGAIN) => {
                    log::debug!(target: "actor", "no stop acknowledgement within {timeout:?}");
                    self.close();
                    return Ok(false);
                }
                Err(err) => return Err(err.into()),
            }
        }
        self.close();
        Ok(true)
    }

    /// Parent end of the pipe; `None` once the actor stopped and the
    /// socket was closed.
    pub fn socket(&self) -> Option<&Socket> {
        self.parent.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn set_destructor_timeout(&mut self, timeout: Duration) {
        self.destructor_timeout = timeout;
    }

    pub fn get_destructor_timeout(&self) -> Duration {
        self.destructor_timeout
    }

    fn parent(&self) -> &Socket {
        self.parent
            .as_ref()
            .expect("parent socket is open until the actor stops")
    }

    fn close(&mut self) {
        self.stopped = true;
        self.parent = None;
    }
}

impl Drop for Actor {
    fn drop(&mut self) {
        let _ = self.stop(Some(self.destructor_timeout));
    }
}

/// Worker-side wrapper. Reports the body's outcome as the trailing
/// signal (which doubles as the stop acknowledgement for bodies that
/// already signalled readiness themselves) and never unwinds past the
/// thread boundary.
fn execute<F>(body: F, socket: Socket, cell: PanicCell)
where
    F: FnOnce(&Socket) -> bool,
{
    match panic::catch_unwind(AssertUnwindSafe(|| body(&socket))) {
        Ok(succeeded) => {
            let signal = if succeeded { Signal::Success } else { Signal::Failure };
            let _ = send_retry_on_eintr(&socket, &signal.encode(), 0);
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            *cell.lock().unwrap_or_else(|err| err.into_inner()) = Some(message);
            let _ = send_retry_on_eintr(&socket, &Signal::Failure.encode(), 0);
        }
    }
    // The child socket closes here, on the thread that owned it.
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&'static str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        s!("actor body panicked")
    }
}

/// Binds the parent socket to a fresh inproc address, redrawing the
/// random suffix while the drawn address is taken.
fn bind_to_unique_address(parent: &Socket) -> Result<String, Error> {
    let unique = NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed);
    let mut rng = rand::thread_rng();
    loop {
        let address = format!(
            "inproc://zmq-reactor-actor-{}-{}",
            unique,
            rng.gen_range(0..1_000_000)
        );
        match parent.bind(&address) {
            Ok(()) => return Ok(address),
            Err(zmq::Error::EADDRINUSE) => {
                log::debug!(target: "actor", "address {address} already in use; retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Remaining receive budget in the transport's integer milliseconds,
/// rounded up and clamped; `None` blocks forever.
fn remaining_budget_millis(timeout: Option<Duration>, started_at: Instant) -> i32 {
    match timeout {
        None => -1,
        Some(limit) => {
            let left = limit.saturating_sub(started_at.elapsed());
            let millis = (left.as_nanos() + 999_999) / 1_000_000;
            millis.min(i32::MAX as u128) as i32
        }
    }
}
