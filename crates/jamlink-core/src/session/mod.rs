//! Session concurrency core
//!
//! Coordinates the three execution contexts of the client:
//! - the host's real-time audio thread (lock-free snapshot reads/writes),
//! - the poll-loop worker thread (drives the engine, publishes events),
//! - the UI thread (drains events, reads the snapshot and roster).
//!
//! - Command/SessionEvent: the bounded queues between UI and worker
//! - TransportSnapshot/MixerConfig: the atomic live snapshot
//! - RosterMirror: the mutex-guarded roster copy
//! - LicenseGate: the blocking accept/reject rendezvous
//! - SessionRunner: poll-loop orchestrator and lifecycle controller

mod command;
mod engine;
mod event;
mod license;
mod roster;
mod runner;
mod snapshot;

pub use command::*;
pub use engine::*;
pub use event::*;
pub use license::*;
pub use roster::*;
pub use runner::*;
pub use snapshot::*;

use std::sync::atomic::AtomicBool;
use std::sync::Mutex;

/// Connection credentials, written when a Connect command is applied
///
/// Guarded by a short, uncontended lock; read by persisted-state save
/// and by UI display. Never held across an engine call.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// State shared between the plugin instance, the poll-loop worker, and
/// the audio callback
///
/// Lives behind an `Arc`; the worker thread holds a strong reference so
/// the state outlives the thread even if the owning object is torn down
/// concurrently elsewhere.
pub struct SessionShared {
    /// The engine slot. The poll loop takes the engine out for each
    /// iteration and puts it back before sleeping, so no lock is ever
    /// held across `work_step` (which can block in the license
    /// rendezvous).
    pub engine: Mutex<Option<Box<dyn SessionEngine>>>,
    /// Atomic live snapshot (transport, VU, cached status)
    pub snapshot: TransportSnapshot,
    /// Mix configuration targets for the real-time path
    pub mixer: MixerConfig,
    /// Mutex-guarded roster copy for the UI
    pub roster: RosterMirror,
    /// License accept/reject rendezvous
    pub license: LicenseGate,
    /// The single cancellation primitive; unblocks every wait
    pub shutdown: AtomicBool,
    /// Server/user/password as last requested
    pub credentials: Mutex<SessionCredentials>,
}

impl SessionShared {
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(None),
            snapshot: TransportSnapshot::new(),
            mixer: MixerConfig::new(),
            roster: RosterMirror::new(),
            license: LicenseGate::new(),
            shutdown: AtomicBool::new(false),
            credentials: Mutex::new(SessionCredentials::default()),
        }
    }
}

impl Default for SessionShared {
    fn default() -> Self {
        Self::new()
    }
}
