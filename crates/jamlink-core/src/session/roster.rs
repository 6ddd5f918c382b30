//! Mutex-guarded mirror of the remote user/channel roster
//!
//! The poll loop replaces the whole roster under the lock; the UI takes
//! a whole copy under the same lock. Nobody holds references across the
//! lock boundary, so a reader can never observe a partially-updated
//! roster and there is no iterator-invalidation hazard. The lock is
//! short and uncontended in the common case, and is never held across a
//! call into the engine.

use std::sync::Mutex;

use crate::types::RemoteUser;

/// Lock-protected copy of the remote roster for UI consumption
pub struct RosterMirror {
    users: Mutex<Vec<RemoteUser>>,
}

impl RosterMirror {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(Vec::new()),
        }
    }

    /// Replace the whole roster (poll thread)
    pub fn replace(&self, users: Vec<RemoteUser>) {
        *self.users.lock().unwrap() = users;
    }

    /// Take a whole copy of the roster (UI thread)
    pub fn snapshot(&self) -> Vec<RemoteUser> {
        self.users.lock().unwrap().clone()
    }

    /// Number of remote users currently mirrored
    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    /// Whether any remote channel has solo engaged
    ///
    /// Used by the UI to dim non-soloed channels.
    pub fn any_solo_active(&self) -> bool {
        self.users
            .lock()
            .unwrap()
            .iter()
            .any(|user| user.channels.iter().any(|chan| chan.solo))
    }

    /// Clear the roster (on disconnect)
    pub fn clear(&self) {
        self.users.lock().unwrap().clear();
    }
}

impl Default for RosterMirror {
    fn default() -> Self {
        Self::new()
    }
}
