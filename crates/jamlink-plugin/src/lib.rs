//! Jamlink Plugin - host-facing glue over the concurrency core
//!
//! Everything the host ABI layer needs: the per-instance state bundle,
//! the automatable parameter surface, the real-time process entry, and
//! persisted-state serialization. The host translation itself (FFI,
//! port negotiation) sits above this crate and passes straight through.

pub mod instance;
pub mod params;
pub mod process;
pub mod state;

pub use instance::{PluginInstance, DEFAULT_SERVER, DEFAULT_USERNAME};
pub use params::{ParamAtomics, ParamId, ParamInfo, PARAMS, PARAM_COUNT};
pub use process::AudioGlue;
pub use state::{LocalChannelState, StateError, STATE_VERSION};
