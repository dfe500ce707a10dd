//! Process-wide interrupt latch fed by OS termination signals.
//!
//! [`install_interrupt_handler`] replaces the SIGINT and SIGTERM
//! dispositions with a handler whose only effect is to set a
//! process-global flag; [`restore_interrupt_handler`] puts the previous
//! dispositions back. The flag itself survives a restore and is only
//! cleared by [`reset_interrupted`].
//!
//! Install and restore are meant to be called from a single supervisory
//! thread during process setup and teardown; the flag accessors are
//! lock-free and safe from any thread, including signal handlers.

use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Tells whether SIGINT or SIGTERM was delivered since the last reset.
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Clears the latch so that new interrupts can be observed.
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::Relaxed);
}

/// Installs the latch handler for SIGINT and SIGTERM.
///
/// The first call after process start, or after a restore, saves the
/// dispositions currently installed so they can be brought back later.
/// OS refusal is swallowed; the latch then simply never fires. On
/// targets without POSIX signals this is a no-op.
pub fn install_interrupt_handler() {
    #[cfg(unix)]
    unix::install();
}

/// Restores the dispositions saved by the first install.
///
/// Does nothing when nothing is saved; the latch value is left
/// untouched. The next install saves again.
pub fn restore_interrupt_handler() {
    #[cfg(unix)]
    unix::restore();
}

#[cfg(unix)]
mod unix {
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use std::{mem, ptr};

    use super::INTERRUPTED;

    struct SavedActions {
        sigint: libc::sigaction,
        sigterm: libc::sigaction,
    }

    // sigaction holds no thread-affine state; the mutex only serializes
    // save and restore.
    unsafe impl Send for SavedActions {}

    static SAVED: Mutex<Option<SavedActions>> = Mutex::new(None);

    extern "C" fn latch(_signum: libc::c_int) {
        // A relaxed atomic store is async-signal-safe.
        INTERRUPTED.store(true, Ordering::Relaxed);
    }

    fn current_action(signum: libc::c_int) -> libc::sigaction {
        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        unsafe { libc::sigaction(signum, ptr::null(), &mut action) };
        action
    }

    pub(super) fn install() {
        let mut saved = SAVED.lock().unwrap_or_else(|err| err.into_inner());
        if saved.is_none() {
            *saved = Some(SavedActions {
                sigint: current_action(libc::SIGINT),
                sigterm: current_action(libc::SIGTERM),
            });
        }
        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        action.sa_sigaction = latch as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        unsafe {
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(libc::SIGINT, &action, ptr::null_mut());
            libc::sigaction(libc::SIGTERM, &action, ptr::null_mut());
        }
    }

    pub(super) fn restore() {
        let mut saved = SAVED.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(actions) = saved.take() {
            unsafe {
                libc::sigaction(libc::SIGINT, &actions.sigint, ptr::null_mut());
                libc::sigaction(libc::SIGTERM, &actions.sigterm, ptr::null_mut());
            }
        }
    }
}
