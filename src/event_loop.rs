use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use zmq::Socket;

use crate::poller::{socket_key, Poller};
use crate::Error;

/// Identifier of a timer registered with an [`EventLoop`]. Unique among
/// the loop's live timers and never zero.
pub type TimerId = usize;

type SocketCallback<'a> = dyn FnMut(&mut EventLoop<'a>, &'a Socket) -> bool + 'a;
type TimerCallback<'a> = dyn FnMut(&mut EventLoop<'a>, TimerId) -> bool + 'a;

struct Timer<'a> {
    id: TimerId,
    interval: Duration,
    /// Remaining firings; zero means "fire forever".
    occurrences: usize,
    next_deadline: Instant,
    handler: Rc<RefCell<TimerCallback<'a>>>,
    /// Removal is deferred so that it stays safe mid-iteration; flagged
    /// timers are collected at the start of the next tick.
    removed: bool,
}

/// Event loop dispatching socket readability and timer expirations to
/// user callbacks.
///
/// Every callback receives the loop itself, so it may register and
/// unregister further sockets and timers while the loop runs, including
/// the entry currently being dispatched. Callbacks return `true` to
/// keep the loop running and `false` to stop it once the current tick
/// completes: the remaining callbacks of the same step are skipped,
/// while a tick's ready sockets are still visited after a stopping
/// timer.
///
/// One iteration collects flagged timers, computes the nearest timer
/// deadline, waits on the poller within that budget, fires every due
/// timer in insertion order and then every ready socket in registration
/// order. The loop returns when it runs out of registered work, when a
/// callback returns `false`, or when the poller reports termination
/// (see [`EventLoop::terminated`]).
pub struct EventLoop<'a> {
    poller: Poller<'a>,
    socket_handlers: HashMap<usize, Rc<RefCell<SocketCallback<'a>>>>,
    timers: Vec<Timer<'a>>,
    last_timer_id: TimerId,
    overflowed: bool,
}

impl Default for EventLoop<'_> {
    fn default() -> Self {
        EventLoop::new()
    }
}

impl<'a> EventLoop<'a> {
    pub fn new() -> Self {
        EventLoop {
            poller: Poller::new(),
            socket_handlers: empty!(),
            timers: empty!(),
            last_timer_id: 0,
            overflowed: false,
        }
    }

    /// Registers a socket together with its readability callback.
    ///
    /// The poller registration comes first; a duplicate rolls it back so
    /// that the handler table and the poller always agree.
    pub fn add_socket<F>(&mut self, socket: &'a Socket, handler: F) -> Result<(), Error>
    where
        F: FnMut(&mut EventLoop<'a>, &'a Socket) -> bool + 'a,
    {
        self.poller.add(socket)?;
        match self.socket_handlers.entry(socket_key(socket)) {
            Entry::Occupied(_) => {
                self.poller.remove(socket);
                Err(Error::SocketAlreadyRegistered)
            }
            Entry::Vacant(entry) => {
                entry.insert(Rc::new(RefCell::new(handler)));
                Ok(())
            }
        }
    }

    /// Unregisters the socket from the poller and the handler table.
    /// Unknown sockets are ignored; calling this from inside a running
    /// callback is fine, including for the socket being dispatched.
    pub fn remove_socket(&mut self, socket: &Socket) {
        self.poller.remove(socket);
        self.socket_handlers.remove(&socket_key(socket));
    }

    /// Tells whether the socket is registered.
    pub fn has_socket(&self, socket: &Socket) -> bool {
        self.socket_handlers.contains_key(&socket_key(socket))
    }

    /// Registers a timer firing every `interval`, `occurrences` times
    /// (zero keeps it firing forever), and returns its id. The first
    /// deadline is one interval from now.
    pub fn add_timer<F>(
        &mut self,
        interval: Duration,
        occurrences: usize,
        handler: F,
    ) -> Result<TimerId, Error>
    where
        F: FnMut(&mut EventLoop<'a>, TimerId) -> bool + 'a,
    {
        let id = self.next_timer_id()?;
        self.timers.push(Timer {
            id,
            interval,
            occurrences,
            next_deadline: Instant::now() + interval,
            handler: Rc::new(RefCell::new(handler)),
            removed: false,
        });
        Ok(id)
    }

    /// Flags the timer for removal; it will not fire again. Unknown ids
    /// are ignored, and removing from inside any callback is fine.
    pub fn remove_timer(&mut self, id: TimerId) {
        if let Some(timer) = self.timers.iter_mut().find(|timer| timer.id == id) {
            timer.removed = true;
        }
    }

    /// Tells whether the last run ended because of an interrupt or a
    /// context shutdown.
    pub fn terminated(&self) -> bool {
        self.poller.terminated()
    }

    /// Runs interruptibly with no extra latch polling; shorthand for
    /// `run_with(true, None)`.
    pub fn run(&mut self) -> Result<(), Error> {
        self.run_with(true, None)
    }

    /// Drives the loop to completion.
    ///
    /// `interruptible` is handed to the poller; switching it off lets a
    /// worker drain its queue even while the process latch is set. A
    /// finite `interrupt_check_interval` caps every poller wait, which
    /// bounds the latency of interrupt observation on platforms where
    /// the poll primitive does not wake on signal delivery.
    pub fn run_with(
        &mut self,
        interruptible: bool,
        interrupt_check_interval: Option<Duration>,
    ) -> Result<(), Error> {
        self.poller.set_interruptible(interruptible);
        loop {
            self.timers.retain(|timer| !timer.removed);
            if self.poller.is_empty() && self.timers.is_empty() {
                return Ok(());
            }
            let timeout = self.next_timeout(Instant::now(), interrupt_check_interval);
            let ready = self.poller.wait_all(timeout)?;
            if self.poller.terminated() {
                return Ok(());
            }
            // A stopping timer callback ends the run only after the
            // tick's ready sockets were visited too.
            let timers_continue = self.fire_due_timers(Instant::now());
            let sockets_continue = self.fire_ready_sockets(ready);
            if !(timers_continue && sockets_continue) {
                return Ok(());
            }
        }
    }

    /// Nearest live deadline relative to `now`, capped by the interrupt
    /// check interval; `None` when the wait may last forever.
    fn next_timeout(&self, now: Instant, cap: Option<Duration>) -> Option<Duration> {
        let nearest = self
            .timers
            .iter()
            .filter(|timer| !timer.removed)
            .map(|timer| timer.next_deadline.saturating_duration_since(now))
            .min();
        match (nearest, cap) {
            (Some(deadline), Some(cap)) => Some(deadline.min(cap)),
            (nearest, cap) => nearest.or(cap),
        }
    }

    fn fire_due_timers(&mut self, now: Instant) -> bool {
        // Timers appended by a callback wait until the next tick.
        let live = self.timers.len();
        for index in 0..live {
            let due = {
                let timer = &self.timers[index];
                !timer.removed && timer.next_deadline <= now
            };
            if !due {
                continue;
            }
            let (id, handler) = {
                let timer = &self.timers[index];
                (timer.id, Rc::clone(&timer.handler))
            };
            if !(&mut *handler.borrow_mut())(self, id) {
                return false;
            }
            let timer = &mut self.timers[index];
            if timer.removed {
                continue;
            }
            if timer.occurrences > 0 {
                timer.occurrences -= 1;
                if timer.occurrences == 0 {
                    timer.removed = true;
                    continue;
                }
            }
            timer.next_deadline += timer.interval;
        }
        true
    }

    fn fire_ready_sockets(&mut self, ready: Vec<&'a Socket>) -> bool {
        for socket in ready {
            // An earlier callback of this tick may have unregistered it;
            // its message then stays queued in the transport.
            let handler = match self.socket_handlers.get(&socket_key(socket)) {
                Some(handler) => Rc::clone(handler),
                None => continue,
            };
            if !(&mut *handler.borrow_mut())(self, socket) {
                return false;
            }
        }
        true
    }

    /// Allocates a unique non-zero timer id. Until the counter wraps
    /// this is a plain increment; afterwards candidates are checked
    /// against the live timers, failing only when the whole id range is
    /// taken.
    fn next_timer_id(&mut self) -> Result<TimerId, Error> {
        self.last_timer_id = self.last_timer_id.wrapping_add(1);
        if self.last_timer_id == 0 {
            self.overflowed = true;
            self.last_timer_id = 1;
        }
        if !self.overflowed {
            return Ok(self.last_timer_id);
        }
        let first_candidate = self.last_timer_id;
        loop {
            let candidate = self.last_timer_id;
            if !self.timers.iter().any(|timer| timer.id == candidate) {
                return Ok(candidate);
            }
            self.last_timer_id = self.last_timer_id.wrapping_add(1);
            if self.last_timer_id == 0 {
                self.last_timer_id = 1;
            }
            if self.last_timer_id == first_candidate {
                return Err(Error::TimerIdsExhausted);
            }
        }
    }
}
