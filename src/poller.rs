use std::time::Duration;

use zmq::{PollItem, Socket};

use crate::interrupt::is_interrupted;
use crate::Error;

/// Identity key of a socket handle. Registered sockets are compared by
/// handle, not by value.
pub(crate) fn socket_key(socket: &Socket) -> usize {
    socket as *const Socket as usize
}

/// Converts an optional wait budget into the transport's millisecond
/// timeout. Rounds up, so sub-millisecond waits cannot busy-spin;
/// `None` maps to the transport's "forever".
fn poll_timeout_millis(timeout: Option<Duration>) -> i64 {
    match timeout {
        None => -1,
        Some(duration) => {
            let millis = (duration.as_nanos() + 999_999) / 1_000_000;
            millis.min(i64::MAX as u128) as i64
        }
    }
}

/// Waits on an ordered set of sockets for readability.
///
/// The poller stores plain references and never owns the registered
/// sockets. Waits honor the process interrupt latch (see
/// [`crate::install_interrupt_handler`]) unless interruptibility is
/// switched off, and report both interrupts and context termination
/// through [`Poller::terminated`] while returning an empty result.
pub struct Poller<'a> {
    sockets: Vec<&'a Socket>,
    interruptible: bool,
    terminated: bool,
}

impl Default for Poller<'_> {
    fn default() -> Self {
        Poller::new()
    }
}

impl<'a> Poller<'a> {
    pub fn new() -> Self {
        Poller {
            sockets: empty!(),
            interruptible: true,
            terminated: false,
        }
    }

    /// Appends a socket with readable interest. Registration order is
    /// kept across waits and decides reporting order.
    pub fn add(&mut self, socket: &'a Socket) -> Result<(), Error> {
        if self.has(socket) {
            return Err(Error::SocketAlreadyRegistered);
        }
        self.sockets.push(socket);
        Ok(())
    }

    /// Erases every entry for the handle; unknown handles are ignored.
    pub fn remove(&mut self, socket: &Socket) {
        let key = socket_key(socket);
        self.sockets.retain(|registered| socket_key(registered) != key);
    }

    /// Tells whether the handle is registered.
    pub fn has(&self, socket: &Socket) -> bool {
        let key = socket_key(socket);
        self.sockets.iter().any(|registered| socket_key(registered) == key)
    }

    pub fn len(&self) -> usize {
        self.sockets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sockets.is_empty()
    }

    /// Tells whether the last wait ended because of an observed
    /// interrupt or a context shutdown.
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    pub fn set_interruptible(&mut self, interruptible: bool) {
        self.interruptible = interruptible;
    }

    pub fn is_interruptible(&self) -> bool {
        self.interruptible
    }

    /// Waits up to `timeout` (`None` blocks forever) and returns the
    /// first entry, in registration order, that became readable.
    ///
    /// A continuously ready early entry can starve later ones; callers
    /// that need fairness should use [`Poller::wait_all`] and walk the
    /// returned set themselves.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Option<&'a Socket>, Error> {
        let items = match self.poll(timeout)? {
            Some(items) => items,
            None => return Ok(None),
        };
        Ok(self
            .sockets
            .iter()
            .zip(&items)
            .find(|(_, item)| item.is_readable())
            .map(|(socket, _)| *socket))
    }

    /// Like [`Poller::wait`], but returns every readable entry, in
    /// registration order.
    pub fn wait_all(&mut self, timeout: Option<Duration>) -> Result<Vec<&'a Socket>, Error> {
        let items = match self.poll(timeout)? {
            Some(items) => items,
            None => return Ok(empty!()),
        };
        Ok(self
            .sockets
            .iter()
            .zip(&items)
            .filter(|(_, item)| item.is_readable())
            .map(|(socket, _)| *socket)
            .collect())
    }

    /// One poll round with the interrupt protocol around it. `None`
    /// means the wait was cut short with no results; whether that marks
    /// termination is already recorded in the flag.
    fn poll(&mut self, timeout: Option<Duration>) -> Result<Option<Vec<PollItem<'a>>>, Error> {
        self.terminated = false;
        if self.interruptible && is_interrupted() {
            self.terminated = true;
            return Ok(None);
        }
        let mut items: Vec<PollItem<'a>> = self
            .sockets
            .iter()
            .map(|socket| socket.as_poll_item(zmq::POLLIN))
            .collect();
        // Blocking call
        match zmq::poll(&mut items, poll_timeout_millis(timeout)) {
            Ok(_) => {}
            Err(zmq::Error::EINTR) => {
                if self.interruptible {
                    self.terminated = true;
                }
                return Ok(None);
            }
            Err(zmq::Error::ETERM) => {
                self.terminated = true;
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        }
        // The signal may land between the pre-check and the poll entry
        // without surfacing as EINTR; check again before reading results.
        if self.interruptible && is_interrupted() {
            self.terminated = true;
            return Ok(None);
        }
        Ok(Some(items))
    }
}
