//! Lock-free live snapshot shared across the three execution contexts
//!
//! The snapshot is a set of independently-atomic fields: the poll loop
//! writes transport values, the audio callback writes VU peaks and the
//! transient flag, and the UI thread reads everything without a queue
//! or a lock. Each field is individually consistent (no partial writes
//! are ever visible) but the set as a whole is NOT a point-in-time
//! snapshot — readers must tolerate cross-field staleness, e.g. tempo
//! and position from slightly different instants.
//!
//! All fields use `Ordering::Relaxed` since we only need visibility,
//! not synchronization — except the transient flag, which gates its
//! offset field and therefore uses acquire/release.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU8, Ordering};

use crate::types::SessionStatus;

/// Derive the beat index from an interval position
///
/// `floor(pos * bpi / len)`, clamped to `0..bpi`. Degenerate transport
/// values (empty interval, zero beats) yield beat 0 rather than a
/// division fault.
pub fn beat_index(pos: i32, len: i32, bpi: i32) -> i32 {
    if len <= 0 || bpi <= 0 {
        return 0;
    }
    let beat = (pos as i64 * bpi as i64) / len as i64;
    beat.clamp(0, (bpi - 1) as i64) as i32
}

/// Live transport and metering state for lock-free UI access
///
/// f32 fields are stored as their bit patterns in `AtomicU32`.
pub struct TransportSnapshot {
    /// Session tempo in beats per minute (f32 bits)
    bpm: AtomicU32,
    /// Beats per interval
    bpi: AtomicI32,
    /// Position within the current interval, in samples
    interval_position: AtomicI32,
    /// Length of the current interval, in samples
    interval_length: AtomicI32,
    /// Derived beat index within the interval
    beat_position: AtomicI32,
    /// Master output peak, left (f32 bits)
    master_vu_left: AtomicU32,
    /// Master output peak, right (f32 bits)
    master_vu_right: AtomicU32,
    /// Local channel peak, left (f32 bits)
    local_vu_left: AtomicU32,
    /// Local channel peak, right (f32 bits)
    local_vu_right: AtomicU32,
    /// A new transient has been detected and its offset stored
    transient_pending: AtomicBool,
    /// Frame offset of the most recent transient within its block
    transient_offset: AtomicU32,
    /// Cached connection status, also read by the audio callback
    status: AtomicU8,
}

impl TransportSnapshot {
    pub fn new() -> Self {
        Self {
            bpm: AtomicU32::new(0f32.to_bits()),
            bpi: AtomicI32::new(0),
            interval_position: AtomicI32::new(0),
            interval_length: AtomicI32::new(0),
            beat_position: AtomicI32::new(0),
            master_vu_left: AtomicU32::new(0f32.to_bits()),
            master_vu_right: AtomicU32::new(0f32.to_bits()),
            local_vu_left: AtomicU32::new(0f32.to_bits()),
            local_vu_right: AtomicU32::new(0f32.to_bits()),
            transient_pending: AtomicBool::new(false),
            transient_offset: AtomicU32::new(0),
            status: AtomicU8::new(SessionStatus::Disconnected as u8),
        }
    }

    /// Publish the transport values for one poll iteration
    pub fn store_transport(&self, bpm: f32, bpi: i32, pos: i32, len: i32) {
        self.bpm.store(bpm.to_bits(), Ordering::Relaxed);
        self.bpi.store(bpi, Ordering::Relaxed);
        self.interval_position.store(pos, Ordering::Relaxed);
        self.interval_length.store(len, Ordering::Relaxed);
        self.beat_position
            .store(beat_index(pos, len, bpi), Ordering::Relaxed);
    }

    #[inline]
    pub fn bpm(&self) -> f32 {
        f32::from_bits(self.bpm.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn bpi(&self) -> i32 {
        self.bpi.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn interval_position(&self) -> i32 {
        self.interval_position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn interval_length(&self) -> i32 {
        self.interval_length.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn beat_position(&self) -> i32 {
        self.beat_position.load(Ordering::Relaxed)
    }

    /// Store master output peaks (audio thread)
    #[inline]
    pub fn store_master_vu(&self, left: f32, right: f32) {
        self.master_vu_left.store(left.to_bits(), Ordering::Relaxed);
        self.master_vu_right.store(right.to_bits(), Ordering::Relaxed);
    }

    /// Store local channel peaks (audio thread)
    #[inline]
    pub fn store_local_vu(&self, left: f32, right: f32) {
        self.local_vu_left.store(left.to_bits(), Ordering::Relaxed);
        self.local_vu_right.store(right.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn master_vu(&self) -> (f32, f32) {
        (
            f32::from_bits(self.master_vu_left.load(Ordering::Relaxed)),
            f32::from_bits(self.master_vu_right.load(Ordering::Relaxed)),
        )
    }

    #[inline]
    pub fn local_vu(&self) -> (f32, f32) {
        (
            f32::from_bits(self.local_vu_left.load(Ordering::Relaxed)),
            f32::from_bits(self.local_vu_right.load(Ordering::Relaxed)),
        )
    }

    /// Record a detected transient (audio thread)
    ///
    /// The offset is written before the flag is raised; the release
    /// store pairs with the acquire in [`take_transient`] so a consumer
    /// that observes the flag also observes the offset.
    #[inline]
    pub fn store_transient(&self, frame_offset: u32) {
        self.transient_offset.store(frame_offset, Ordering::Relaxed);
        self.transient_pending.store(true, Ordering::Release);
    }

    /// Consume a pending transient, if any (UI thread)
    #[inline]
    pub fn take_transient(&self) -> Option<u32> {
        if self.transient_pending.swap(false, Ordering::Acquire) {
            Some(self.transient_offset.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Cache the connection status (poll thread)
    #[inline]
    pub fn store_status(&self, status: SessionStatus) {
        self.status.store(status as u8, Ordering::Relaxed);
    }

    /// Cached connection status (any thread, lock-free)
    #[inline]
    pub fn status(&self) -> SessionStatus {
        SessionStatus::from_u8(self.status.load(Ordering::Relaxed))
    }
}

impl Default for TransportSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Mix configuration targets read by the real-time path
///
/// Written by the host parameter surface (UI/audio boundary), read by
/// the engine's processing entry every block. Mirroring these as
/// atomics keeps the real-time path away from any lock.
pub struct MixerConfig {
    master_volume: AtomicU32,
    master_mute: AtomicBool,
    metronome_volume: AtomicU32,
    metronome_mute: AtomicBool,
}

impl MixerConfig {
    pub fn new() -> Self {
        Self {
            master_volume: AtomicU32::new(1.0f32.to_bits()),
            master_mute: AtomicBool::new(false),
            metronome_volume: AtomicU32::new(0.5f32.to_bits()),
            metronome_mute: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn set_master_volume(&self, volume: f32) {
        self.master_volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn master_volume(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_master_mute(&self, mute: bool) {
        self.master_mute.store(mute, Ordering::Relaxed);
    }

    #[inline]
    pub fn master_mute(&self) -> bool {
        self.master_mute.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_metronome_volume(&self, volume: f32) {
        self.metronome_volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn metronome_volume(&self) -> f32 {
        f32::from_bits(self.metronome_volume.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_metronome_mute(&self, mute: bool) {
        self.metronome_mute.store(mute, Ordering::Relaxed);
    }

    #[inline]
    pub fn metronome_mute(&self) -> bool {
        self.metronome_mute.load(Ordering::Relaxed)
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self::new()
    }
}
