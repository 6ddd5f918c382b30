//! Real-time audio callback glue
//!
//! Runs on the host's audio thread under hard timing deadlines. The
//! rules on this path: no heap allocation, no lock acquisition, no
//! queue waits — only atomic loads/stores and the engine's designated
//! real-time-safe processing entry.
//!
//! When the session is not connected and ready, the block is a direct
//! input-to-output copy (never silence, never a wait).

use std::sync::Arc;

use jamlink_core::session::{RealtimeProcessor, SessionShared};
use jamlink_core::types::SessionStatus;

use crate::params::ParamAtomics;

/// Peak level that counts as a transient onset
const TRANSIENT_THRESHOLD: f32 = 0.5;

/// Per-instance state for the audio callback
///
/// Created by `PluginInstance::activate` and moved to the audio thread.
/// Everything it touches is an `Arc` of atomics, so dropping it (or the
/// rest of the instance) in any order is safe.
pub struct AudioGlue {
    processor: Option<Arc<dyn RealtimeProcessor>>,
    shared: Arc<SessionShared>,
    params: Arc<ParamAtomics>,
    /// Master peak of the previous block, for transient edge detection
    prev_master_peak: f32,
}

impl AudioGlue {
    pub fn new(shared: Arc<SessionShared>, params: Arc<ParamAtomics>) -> Self {
        Self {
            processor: None,
            shared,
            params,
            prev_master_peak: 0.0,
        }
    }

    /// Install or clear the engine's processing entry
    pub fn set_processor(&mut self, processor: Option<Arc<dyn RealtimeProcessor>>) {
        self.processor = processor;
    }

    /// Process one block of audio
    ///
    /// All four slices must have the same length. `is_playing` mirrors
    /// the host transport; while stopped the engine keeps monitoring
    /// local input without advancing the session.
    pub fn process_block(
        &mut self,
        input_left: &[f32],
        input_right: &[f32],
        output_left: &mut [f32],
        output_right: &mut [f32],
        sample_rate: u32,
        is_playing: bool,
    ) {
        // Mirror host parameters into the engine's config atomics
        let mixer = &self.shared.mixer;
        mixer.set_master_volume(self.params.master_volume_value());
        mixer.set_master_mute(self.params.master_mute_value());
        mixer.set_metronome_volume(self.params.metronome_volume_value());
        mixer.set_metronome_mute(self.params.metronome_mute_value());

        let connected = self.shared.snapshot.status() == SessionStatus::Connected;

        if connected {
            if let Some(processor) = &self.processor {
                let just_monitor = !is_playing;
                processor.process(
                    input_left,
                    input_right,
                    output_left,
                    output_right,
                    sample_rate,
                    just_monitor,
                    is_playing,
                );

                let peak_left = processor.output_peak(0);
                let peak_right = processor.output_peak(1);
                self.shared.snapshot.store_master_vu(peak_left, peak_right);
                self.shared
                    .snapshot
                    .store_local_vu(processor.local_peak(0), processor.local_peak(1));

                self.detect_transient(output_left, output_right, peak_left.max(peak_right));
                return;
            }
        }

        // Not connected (or no engine): pass input through unchanged
        output_left.copy_from_slice(input_left);
        output_right.copy_from_slice(input_right);
    }

    /// Flag a transient when the master peak rises through the threshold
    ///
    /// The offset of the first frame at or above the threshold is
    /// published before the flag, so a consumer that sees the flag also
    /// sees the offset.
    fn detect_transient(&mut self, left: &[f32], right: &[f32], block_peak: f32) {
        if block_peak >= TRANSIENT_THRESHOLD && self.prev_master_peak < TRANSIENT_THRESHOLD {
            let offset = left
                .iter()
                .zip(right.iter())
                .position(|(l, r)| l.abs().max(r.abs()) >= TRANSIENT_THRESHOLD)
                .unwrap_or(0);
            self.shared.snapshot.store_transient(offset as u32);
        }
        self.prev_master_peak = block_peak;
    }
}
