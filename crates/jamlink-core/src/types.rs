//! Common types for Jamlink
//!
//! Plain value types shared between the poll loop, the UI path, and the
//! host-facing plugin glue.

/// Connection status reported by the session engine
///
/// The orchestrator never invents transitions; it only mirrors what the
/// engine reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionStatus {
    /// Not connected to any server
    Disconnected = 0,
    /// Handshake in progress
    PreConnect = 1,
    /// Fully connected, transport running
    Connected = 2,
}

impl SessionStatus {
    /// All statuses in order
    pub const ALL: [SessionStatus; 3] = [
        SessionStatus::Disconnected,
        SessionStatus::PreConnect,
        SessionStatus::Connected,
    ];

    /// Convert from the raw value stored in the cached-status atomic
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            1 => SessionStatus::PreConnect,
            2 => SessionStatus::Connected,
            _ => SessionStatus::Disconnected,
        }
    }

    /// Short display label
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "Disconnected",
            SessionStatus::PreConnect => "Connecting",
            SessionStatus::Connected => "Connected",
        }
    }
}

/// One remote channel as mirrored for UI consumption
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteChannel {
    /// Channel name as broadcast by its owner
    pub name: String,
    /// Index of this channel within its user
    pub channel_index: i32,
    /// Whether we are subscribed to (receiving) this channel
    pub subscribed: bool,
    /// Local monitoring volume (linear)
    pub volume: f32,
    /// Local monitoring pan (-1.0 left .. 1.0 right)
    pub pan: f32,
    /// Local mute
    pub mute: bool,
    /// Local solo
    pub solo: bool,
    /// Most recent VU peak, left side
    pub vu_left: f32,
    /// Most recent VU peak, right side
    pub vu_right: f32,
}

/// One remote user as mirrored for UI consumption
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteUser {
    /// User name as reported by the server
    pub name: String,
    /// Whether all of this user's channels are locally muted
    pub mute: bool,
    /// The user's channels
    pub channels: Vec<RemoteChannel>,
}

/// One entry of the public server directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerListEntry {
    /// Display name of the server
    pub name: String,
    /// Host to connect to
    pub host: String,
    /// Port to connect to
    pub port: u16,
    /// Current user count
    pub users: i32,
    /// Server topic line
    pub topic: String,
}

impl ServerListEntry {
    /// "host:port" form used by connect commands
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upload bitrates offered for the local channel, in kbps
pub const BITRATES_KBPS: [i32; 5] = [64, 96, 128, 192, 256];
