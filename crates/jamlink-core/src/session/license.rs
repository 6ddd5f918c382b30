//! Blocking license-acceptance rendezvous
//!
//! The session engine requires a human accept/reject decision before it
//! will join some servers, and it requires the answer synchronously,
//! from inside its work step — i.e. on the poll-loop thread. This
//! module models that exchange explicitly: a single-slot handoff gated
//! by a condition variable, with a bounded timeout and an external
//! cancellation input (the shutdown flag).
//!
//! At most one rendezvous is outstanding at a time; a new request may
//! not begin until the previous response has been consumed. The poll
//! loop guarantees this by calling [`LicenseGate::request`]
//! synchronously.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// How long the poll thread waits for a decision before giving up
///
/// A timeout is treated identically to an explicit rejection.
pub const LICENSE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Response {
    Pending,
    Accept,
    Reject,
}

struct Slot {
    text: String,
    response: Response,
}

/// Single-slot condition-variable rendezvous for license decisions
pub struct LicenseGate {
    slot: Mutex<Slot>,
    cond: Condvar,
    /// Lock-free "a prompt is waiting" flag for the UI thread
    pending: AtomicBool,
}

impl LicenseGate {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                text: String::new(),
                response: Response::Reject,
            }),
            cond: Condvar::new(),
            pending: AtomicBool::new(false),
        }
    }

    /// Block until the user decides, the timeout fires, or shutdown
    ///
    /// Called on the poll-loop thread, from inside the engine's work
    /// step. Returns `true` for accept. Timeout and shutdown both
    /// resolve to reject; this call never blocks `stop()` beyond the
    /// condvar wakeup.
    pub fn request(&self, text: &str, timeout: Duration, shutdown: &AtomicBool) -> bool {
        {
            let mut slot = self.slot.lock().unwrap();
            slot.text = text.to_string();
            slot.response = Response::Pending;
        }
        self.pending.store(true, Ordering::Release);
        self.cond.notify_all();

        log::info!("License prompt raised, waiting for decision");

        let guard = self.slot.lock().unwrap();
        let (mut slot, _timeout_result) = self
            .cond
            .wait_timeout_while(guard, timeout, |slot| {
                slot.response == Response::Pending && !shutdown.load(Ordering::Acquire)
            })
            .unwrap();

        if slot.response == Response::Pending {
            // Timed out (or shutdown raced the notify): force reject
            log::info!("License prompt timed out, rejecting");
            slot.response = Response::Reject;
        }
        let accept = slot.response == Response::Accept;
        drop(slot);

        self.pending.store(false, Ordering::Release);
        log::info!("License decision: {}", if accept { "accept" } else { "reject" });
        accept
    }

    /// Supply the user's decision (UI thread)
    ///
    /// No-op if no rendezvous is outstanding.
    pub fn respond(&self, accept: bool) {
        let mut slot = self.slot.lock().unwrap();
        if slot.response == Response::Pending {
            slot.response = if accept { Response::Accept } else { Response::Reject };
        }
        drop(slot);
        self.cond.notify_all();
    }

    /// Force-complete any pending rendezvous as a rejection
    ///
    /// The shutdown path calls this after raising the shutdown flag so
    /// a worker blocked in [`request`] wakes immediately; without it,
    /// `stop()` would deadlock against the wait.
    pub fn force_reject(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.response = Response::Reject;
        drop(slot);
        self.pending.store(false, Ordering::Release);
        self.cond.notify_all();
    }

    /// Whether a prompt is currently waiting for the user
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// The license text of the current (or most recent) prompt
    pub fn text(&self) -> String {
        self.slot.lock().unwrap().text.clone()
    }
}

impl Default for LicenseGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_timeout_rejects() {
        let gate = LicenseGate::new();
        let shutdown = AtomicBool::new(false);

        let start = Instant::now();
        let accepted = gate.request("terms", Duration::from_millis(50), &shutdown);
        assert!(!accepted);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!gate.is_pending());
    }

    #[test]
    fn test_accept_from_other_thread() {
        let gate = Arc::new(LicenseGate::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let responder = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                while !gate.is_pending() {
                    std::thread::yield_now();
                }
                assert_eq!(gate.text(), "server terms");
                gate.respond(true);
            })
        };

        let accepted = gate.request("server terms", Duration::from_secs(10), &shutdown);
        assert!(accepted);
        assert!(!gate.is_pending());
        responder.join().unwrap();
    }

    #[test]
    fn test_reject_from_other_thread() {
        let gate = Arc::new(LicenseGate::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let responder = {
            let gate = Arc::clone(&gate);
            std::thread::spawn(move || {
                while !gate.is_pending() {
                    std::thread::yield_now();
                }
                gate.respond(false);
            })
        };

        assert!(!gate.request("terms", Duration::from_secs(10), &shutdown));
        responder.join().unwrap();
    }

    #[test]
    fn test_shutdown_unblocks_wait() {
        let gate = Arc::new(LicenseGate::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let stopper = {
            let gate = Arc::clone(&gate);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || {
                while !gate.is_pending() {
                    std::thread::yield_now();
                }
                shutdown.store(true, Ordering::Release);
                gate.force_reject();
            })
        };

        let start = Instant::now();
        let accepted = gate.request("terms", Duration::from_secs(60), &shutdown);
        assert!(!accepted);
        assert!(start.elapsed() < Duration::from_secs(10));
        stopper.join().unwrap();
    }

    #[test]
    fn test_gate_is_reusable() {
        let gate = LicenseGate::new();
        let shutdown = AtomicBool::new(false);

        assert!(!gate.request("first", Duration::from_millis(10), &shutdown));
        // The previous response has been consumed; a new prompt starts clean
        gate.respond(true);
        assert!(!gate.request("second", Duration::from_millis(10), &shutdown));
    }
}
