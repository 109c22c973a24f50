//! Interrupt-context callback dispatch.
//!
//! The timer vector calls [`InterruptDispatcher::dispatch`] on every period
//! boundary. A callback that re-enables interrupts may be preempted by the
//! same vector; that nested call is dropped rather than queued.

use core::cell::Cell;
use critical_section::{CriticalSection, Mutex};

/// The dispatcher the hardware vector of this build calls into.
pub static DISPATCHER: InterruptDispatcher = InterruptDispatcher::new();

/// What one call to [`InterruptDispatcher::dispatch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Invoked,
    /// A previous invocation was still running.
    Busy,
    Unregistered,
}

pub struct InterruptDispatcher {
    callback: Mutex<Cell<Option<fn()>>>,
    in_handler: Mutex<Cell<bool>>,
}

/// Clears the in-handler flag on every way out of the callback.
struct HandlerGuard<'a>(&'a Mutex<Cell<bool>>);

impl Drop for HandlerGuard<'_> {
    fn drop(&mut self) {
        critical_section::with(|cs| self.0.borrow(cs).set(false));
    }
}

impl InterruptDispatcher {
    pub const fn new() -> Self {
        Self {
            callback: Mutex::new(Cell::new(None)),
            in_handler: Mutex::new(Cell::new(false)),
        }
    }

    /// Store `callback`. The caller is responsible for gating the interrupt
    /// source in the same critical section.
    pub fn register(&self, cs: CriticalSection<'_>, callback: Option<fn()>) {
        self.callback.borrow(cs).set(callback);
    }

    pub fn callback(&self) -> Option<fn()> {
        critical_section::with(|cs| self.callback.borrow(cs).get())
    }

    pub fn is_dispatching(&self) -> bool {
        critical_section::with(|cs| self.in_handler.borrow(cs).get())
    }

    /// Run the registered callback unless one is already running.
    ///
    /// The callback runs outside any critical section, so it sees interrupts
    /// in whatever state the vector entered with.
    pub fn dispatch(&self) -> Dispatch {
        let claimed = critical_section::with(|cs| {
            let in_handler = self.in_handler.borrow(cs);
            if in_handler.get() {
                return Err(Dispatch::Busy);
            }
            let callback = self.callback.borrow(cs).get().ok_or(Dispatch::Unregistered)?;
            in_handler.set(true);
            Ok(callback)
        });

        match claimed {
            Ok(callback) => {
                let _guard = HandlerGuard(&self.in_handler);
                callback();
                Dispatch::Invoked
            }
            Err(outcome) => outcome,
        }
    }
}

impl Default for InterruptDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
