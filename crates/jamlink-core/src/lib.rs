//! Jamlink Core - concurrency core of the jam-session client
//!
//! Coordinates a hard-real-time audio path, a background session poll
//! loop, and a UI path: lock-free bounded queues between UI and worker,
//! an atomic live snapshot for meters and transport, a mutex-guarded
//! roster mirror, the blocking license rendezvous, and the lifecycle
//! protocol that guarantees the worker joins without deadlock.

pub mod directory;
pub mod error;
pub mod queue;
pub mod session;
pub mod types;

pub use types::*;
