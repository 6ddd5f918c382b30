//! Commands sent from the UI thread to the poll-loop worker
//!
//! This is the UI→worker half of the command/event pair: the UI pushes
//! intents into a bounded lock-free queue and the poll loop applies
//! them to the session engine at the top of each iteration.
//!
//! Optional fields use `Option<T>` so a command can set a subset of
//! attributes without clobbering the rest; `None` means "leave as-is".
//! Commands are immutable value objects, consumed exactly once.

use crate::queue::{spsc_channel, QueueReceiver, QueueSender};

/// Connection parameters for [`Command::Connect`]
///
/// Separated into a struct and boxed in the command enum so the three
/// strings don't inflate every queued command; the enum stays small
/// for cache-efficient lock-free queueing.
#[derive(Debug, Clone)]
pub struct ConnectArgs {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// Commands issued by the UI thread
///
/// Consumed with an exhaustive `match` in the poll loop, so adding a
/// variant is a compile-time-checked requirement on every consumer.
#[derive(Debug)]
pub enum Command {
    // ─────────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────────
    /// Connect to a server (boxed: three strings)
    Connect(Box<ConnectArgs>),
    /// Disconnect from the current server
    Disconnect,

    // ─────────────────────────────────────────────────────────────
    // Local Channel
    // ─────────────────────────────────────────────────────────────
    /// Update the local channel's broadcast settings
    SetLocalChannelInfo {
        channel: i32,
        name: String,
        /// Upload bitrate in kbps
        bitrate: Option<i32>,
        /// Whether the channel transmits
        transmit: Option<bool>,
    },
    /// Update local-channel monitoring (what we hear of ourselves)
    SetLocalChannelMonitoring {
        channel: i32,
        volume: Option<f32>,
        pan: Option<f32>,
        mute: Option<bool>,
        solo: Option<bool>,
    },

    // ─────────────────────────────────────────────────────────────
    // Remote Users
    // ─────────────────────────────────────────────────────────────
    /// Update per-user state (currently mute only)
    SetUserState {
        user_index: i32,
        mute: Option<bool>,
    },
    /// Update per-channel state of a remote user
    SetUserChannelState {
        user_index: i32,
        channel_index: i32,
        subscribed: Option<bool>,
        volume: Option<f32>,
        pan: Option<f32>,
        mute: Option<bool>,
        solo: Option<bool>,
    },

    // ─────────────────────────────────────────────────────────────
    // Server Directory
    // ─────────────────────────────────────────────────────────────
    /// Fetch the public server list from the given URL
    ///
    /// Handled by the directory fetcher, never forwarded to the engine.
    RequestServerList { url: String },
}

/// Capacity of the command queue
///
/// A UI frame produces at most a handful of commands; 256 gives ample
/// headroom for bursts (e.g. restoring a whole mixer panel) while
/// keeping memory modest.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Create the command channel (UI producer / poll-loop consumer pair)
pub fn command_channel() -> (QueueSender<Command>, QueueReceiver<Command>) {
    spsc_channel(COMMAND_QUEUE_CAPACITY)
}
