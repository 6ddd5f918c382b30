//! Collaborator contracts for the external session engine
//!
//! The engine itself (connect/disconnect handshakes, channel routing,
//! decode/encode, jitter buffering, mixing) lives outside this crate.
//! These traits pin down exactly what the concurrency core needs from
//! it, and nothing more.

use std::sync::Arc;

use crate::types::{RemoteUser, SessionStatus};

/// Result of one engine work step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkStatus {
    /// The engine has more work queued; call `work_step` again
    MoreWork,
    /// Nothing left to do this cycle
    Idle,
}

/// Notifications the engine raises from inside `work_step`
///
/// Both callbacks run on the poll-loop thread. `license_prompt` is a
/// synchronous request/response exchange: the engine will not proceed
/// until it returns, so the implementation is allowed to block (the
/// poll loop answers it through the license rendezvous).
pub trait EngineCallbacks {
    /// A chat-style message arrived (kind is the protocol verb, e.g.
    /// `MSG` or `TOPIC`)
    fn chat_message(&mut self, kind: &str, user: &str, text: &str);

    /// The server requires a license decision before continuing;
    /// return `true` to accept
    fn license_prompt(&mut self, text: &str) -> bool;
}

/// Control surface of the session engine, driven by the poll loop
///
/// All methods are called from the poll-loop thread only. `work_step`
/// may re-enter the callbacks, so the caller must not hold any lock the
/// UI thread needs while calling it.
pub trait SessionEngine: Send {
    /// Perform one slice of pending network/session work
    fn work_step(&mut self, callbacks: &mut dyn EngineCallbacks) -> WorkStatus;

    /// Current connection status
    fn status(&self) -> SessionStatus;

    /// Human-readable text for the most recent error, empty if none
    fn error_text(&self) -> String;

    /// Current interval position and length, in samples
    fn interval_position(&self) -> (i32, i32);

    /// Beats per interval
    fn bpi(&self) -> i32;

    /// Session tempo in beats per minute
    fn bpm(&self) -> f32;

    /// Whether the roster changed since the last call (edge-triggered)
    fn roster_changed(&mut self) -> bool;

    /// Copy the current roster into `out`
    fn roster(&self, out: &mut Vec<RemoteUser>);

    /// Begin a connection attempt
    fn connect(&mut self, server: &str, username: &str, password: &str);

    /// Tear down the current connection
    fn disconnect(&mut self);

    /// Update the local channel's broadcast settings; `None` leaves a
    /// field unchanged
    fn set_local_channel_info(
        &mut self,
        channel: i32,
        name: &str,
        bitrate: Option<i32>,
        transmit: Option<bool>,
    );

    /// Update local-channel monitoring; `None` leaves a field unchanged
    fn set_local_channel_monitoring(
        &mut self,
        channel: i32,
        volume: Option<f32>,
        pan: Option<f32>,
        mute: Option<bool>,
        solo: Option<bool>,
    );

    /// Update per-user state; `None` leaves a field unchanged
    fn set_user_state(&mut self, user_index: i32, mute: Option<bool>);

    /// Update a remote user's channel; `None` leaves a field unchanged
    #[allow(clippy::too_many_arguments)]
    fn set_user_channel_state(
        &mut self,
        user_index: i32,
        channel_index: i32,
        subscribed: Option<bool>,
        volume: Option<f32>,
        pan: Option<f32>,
        mute: Option<bool>,
        solo: Option<bool>,
    );

    /// Handle to the engine's real-time-safe processing entry
    ///
    /// Fetched once at activation and kept by the audio glue; the
    /// handle must stay valid for the engine's whole lifetime.
    fn realtime_processor(&self) -> Arc<dyn RealtimeProcessor>;
}

/// The engine's real-time-safe processing entry
///
/// Called on the host's audio thread. Implementations must be wait-free:
/// no heap allocation, no lock acquisition, no channel waits — atomic
/// loads/stores only.
pub trait RealtimeProcessor: Send + Sync {
    /// Process one block of audio in place
    ///
    /// `just_monitor` is set while the host transport is stopped: the
    /// engine should keep monitoring local input without advancing the
    /// session.
    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        input_left: &[f32],
        input_right: &[f32],
        output_left: &mut [f32],
        output_right: &mut [f32],
        sample_rate: u32,
        just_monitor: bool,
        is_playing: bool,
    );

    /// Most recent master output peak for a side (0 = left, 1 = right)
    fn output_peak(&self, side: usize) -> f32;

    /// Most recent local channel peak for a side (0 = left, 1 = right)
    fn local_peak(&self, side: usize) -> f32;
}
