//! The plugin instance
//!
//! One `PluginInstance` exists per loaded plugin. It bundles the shared
//! session state with the host-facing surfaces (parameters, persisted
//! state, UI accessors) and drives the worker lifecycle on
//! activate/deactivate. The host ABI glue on top of this is a thin
//! translation layer; everything stateful lives here.

use std::sync::{Arc, Mutex, Once};

use jamlink_core::error::SessionResult;
use jamlink_core::session::{
    Command, SessionEngine, SessionEvent, SessionRunner, SessionShared, TransportSnapshot,
    UiEndpoints,
};
use jamlink_core::types::{RemoteUser, SessionStatus, BITRATES_KBPS};

use crate::params::ParamAtomics;
use crate::process::AudioGlue;
use crate::state::{self, LocalChannelState, StateError};

/// Server suggested before any persisted state is loaded
pub const DEFAULT_SERVER: &str = "ninbot.com";

/// Username suggested before any persisted state is loaded
pub const DEFAULT_USERNAME: &str = "anonymous";

static INIT_LOGGING: Once = Once::new();

/// Initialize logging once per process
///
/// Honors `RUST_LOG`; hosts load many instances, so double init is
/// tolerated silently.
fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .format_timestamp_millis()
        .try_init();
    });
}

/// Per-plugin-instance state shared across the three execution contexts
pub struct PluginInstance {
    shared: Arc<SessionShared>,
    params: Arc<ParamAtomics>,
    runner: Mutex<SessionRunner>,
    /// UI-thread queue endpoints; present while activated
    ui: Mutex<Option<UiEndpoints>>,
    local_channel: Mutex<LocalChannelState>,
}

impl PluginInstance {
    pub fn new() -> Arc<Self> {
        init_logging();

        let shared = Arc::new(SessionShared::new());
        {
            let mut creds = shared.credentials.lock().unwrap();
            creds.server = DEFAULT_SERVER.to_string();
            creds.username = DEFAULT_USERNAME.to_string();
        }

        let runner = SessionRunner::new(Arc::clone(&shared));
        Arc::new(Self {
            shared,
            params: Arc::new(ParamAtomics::new()),
            runner: Mutex::new(runner),
            ui: Mutex::new(None),
            local_channel: Mutex::new(LocalChannelState::default()),
        })
    }

    /// Install the engine and start the session worker
    ///
    /// Returns the [`AudioGlue`] for the host's audio thread; the glue
    /// holds only atomics and the engine's real-time handle, so it may
    /// be dropped in any order relative to [`deactivate`].
    pub fn activate(&self, engine: Box<dyn SessionEngine>) -> SessionResult<AudioGlue> {
        let processor = engine.realtime_processor();
        let endpoints = self.runner.lock().unwrap().start(Some(engine))?;
        *self.ui.lock().unwrap() = Some(endpoints);

        let mut glue = AudioGlue::new(Arc::clone(&self.shared), Arc::clone(&self.params));
        glue.set_processor(Some(processor));
        log::info!("Plugin instance activated");
        Ok(glue)
    }

    /// Stop the session worker and tear down the engine
    ///
    /// Idempotent, and safe to call without a prior [`activate`].
    pub fn deactivate(&self) {
        self.runner.lock().unwrap().stop();
        *self.ui.lock().unwrap() = None;
        log::info!("Plugin instance deactivated");
    }

    /// Whether the session worker is currently running
    pub fn is_active(&self) -> bool {
        self.runner.lock().unwrap().is_running()
    }

    // ─────────────────────────────────────────────────────────────
    // UI-thread surface
    // ─────────────────────────────────────────────────────────────

    /// Queue a command for the worker (UI thread)
    ///
    /// Returns `false` if the instance is not active or the queue is
    /// full; either way the command is dropped, never blocked on.
    pub fn send_command(&self, command: Command) -> bool {
        match self.ui.lock().unwrap().as_mut() {
            Some(ui) => ui.commands.try_push(command),
            None => false,
        }
    }

    /// Drain pending events (UI thread, once per frame)
    pub fn drain_events<F: FnMut(SessionEvent)>(&self, visitor: F) {
        if let Some(ui) = self.ui.lock().unwrap().as_mut() {
            ui.events.drain(visitor);
        }
    }

    /// Record local channel settings and forward them to the engine
    pub fn set_local_channel_info(
        &self,
        channel: i32,
        name: &str,
        bitrate_index: Option<i32>,
        transmit: Option<bool>,
    ) -> bool {
        {
            let mut local = self.local_channel.lock().unwrap();
            local.name = name.to_string();
            if let Some(index) = bitrate_index {
                local.bitrate_index = index;
            }
            if let Some(transmit) = transmit {
                local.transmit = transmit;
            }
        }

        let bitrate = bitrate_index.map(|index| {
            let index = index.clamp(0, BITRATES_KBPS.len() as i32 - 1) as usize;
            BITRATES_KBPS[index]
        });
        self.send_command(Command::SetLocalChannelInfo {
            channel,
            name: name.to_string(),
            bitrate,
            transmit,
        })
    }

    /// Whether a license prompt is waiting for the user
    pub fn license_pending(&self) -> bool {
        self.shared.license.is_pending()
    }

    /// Text of the pending license prompt
    pub fn license_text(&self) -> String {
        self.shared.license.text()
    }

    /// Answer the pending license prompt
    pub fn respond_license(&self, accept: bool) {
        self.shared.license.respond(accept);
    }

    /// The live snapshot (transport, VU, cached status)
    pub fn snapshot(&self) -> &TransportSnapshot {
        &self.shared.snapshot
    }

    /// Current connection status (lock-free)
    pub fn status(&self) -> SessionStatus {
        self.shared.snapshot.status()
    }

    /// A whole copy of the remote roster
    pub fn roster(&self) -> Vec<RemoteUser> {
        self.shared.roster.snapshot()
    }

    /// Whether any remote channel currently has solo engaged
    pub fn any_solo_active(&self) -> bool {
        self.shared.roster.any_solo_active()
    }

    /// The parameter atomics (host parameter surface)
    pub fn params(&self) -> &ParamAtomics {
        &self.params
    }

    // ─────────────────────────────────────────────────────────────
    // Persisted state
    // ─────────────────────────────────────────────────────────────

    /// Serialize the instance state for the host
    pub fn save_state(&self) -> String {
        state::save_state(&self.shared, &self.params, &self.local_channel)
    }

    /// Apply persisted state from the host
    pub fn load_state(&self, data: &str) -> Result<(), StateError> {
        state::load_state(data, &self.shared, &self.params, &self.local_channel)
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        // SessionRunner::drop joins the worker, but do it explicitly so
        // the UI endpoints are released first.
        self.deactivate();
    }
}
