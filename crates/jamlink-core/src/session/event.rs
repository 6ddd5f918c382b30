//! Events published by the poll-loop worker to the UI thread
//!
//! Worker→UI half of the command/event pair. The poll loop is the sole
//! producer; the UI drains the queue once per render frame. Events are
//! notifications, not state: the authoritative live values come from
//! the snapshot atomics and the roster mirror.

use crate::queue::{spsc_channel, QueueReceiver, QueueSender};
use crate::types::{ServerListEntry, SessionStatus};

/// Events consumed by the UI thread
#[derive(Debug)]
pub enum SessionEvent {
    /// The engine's connection status changed
    ///
    /// Published only on actual transitions, with any engine error
    /// text captured at the moment of the change.
    StatusChanged {
        status: SessionStatus,
        error_text: String,
    },
    /// The remote roster changed; a fresh copy is in the roster mirror
    UserInfoChanged,
    /// The server topic line changed
    TopicChanged { topic: String },
    /// A chat-style message arrived
    ChatMessage {
        kind: String,
        user: String,
        text: String,
    },
    /// A server-directory fetch completed
    ServerList {
        entries: Vec<ServerListEntry>,
        error: Option<String>,
    },
}

/// Capacity of the event queue
///
/// Chat bursts are the only high-volume producer; 512 comfortably
/// covers several seconds of backlog at one UI frame of latency.
pub const EVENT_QUEUE_CAPACITY: usize = 512;

/// Create the event channel (poll-loop producer / UI consumer pair)
pub fn event_channel() -> (QueueSender<SessionEvent>, QueueReceiver<SessionEvent>) {
    spsc_channel(EVENT_QUEUE_CAPACITY)
}
