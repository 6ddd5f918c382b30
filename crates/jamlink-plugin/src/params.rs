//! Host-automatable parameters
//!
//! Four parameters are exposed to the host: master volume/mute and
//! metronome volume/mute. Values live in relaxed atomics so the audio
//! thread can mirror them into the engine's mix configuration every
//! block without touching a lock. The host surface (descriptor table,
//! value/text conversion) passes through to these atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Parameter identifiers, stable across sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ParamId {
    MasterVolume = 0,
    MasterMute = 1,
    MetronomeVolume = 2,
    MetronomeMute = 3,
}

/// Number of exposed parameters
pub const PARAM_COUNT: usize = 4;

impl ParamId {
    /// All parameters in descriptor order
    pub const ALL: [ParamId; PARAM_COUNT] = [
        ParamId::MasterVolume,
        ParamId::MasterMute,
        ParamId::MetronomeVolume,
        ParamId::MetronomeMute,
    ];

    /// Convert from a raw host id
    pub fn from_u32(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ParamId::MasterVolume),
            1 => Some(ParamId::MasterMute),
            2 => Some(ParamId::MetronomeVolume),
            3 => Some(ParamId::MetronomeMute),
            _ => None,
        }
    }
}

/// Descriptor metadata for one parameter
pub struct ParamInfo {
    pub id: ParamId,
    pub name: &'static str,
    pub module: &'static str,
    pub min_value: f64,
    pub max_value: f64,
    pub default_value: f64,
    /// Stepped parameters are on/off switches
    pub stepped: bool,
}

/// Descriptor table in host order
pub const PARAMS: [ParamInfo; PARAM_COUNT] = [
    ParamInfo {
        id: ParamId::MasterVolume,
        name: "Master Volume",
        module: "Master",
        min_value: 0.0,
        max_value: 2.0,
        default_value: 1.0,
        stepped: false,
    },
    ParamInfo {
        id: ParamId::MasterMute,
        name: "Master Mute",
        module: "Master",
        min_value: 0.0,
        max_value: 1.0,
        default_value: 0.0,
        stepped: true,
    },
    ParamInfo {
        id: ParamId::MetronomeVolume,
        name: "Metronome Volume",
        module: "Metronome",
        min_value: 0.0,
        max_value: 2.0,
        default_value: 0.5,
        stepped: false,
    },
    ParamInfo {
        id: ParamId::MetronomeMute,
        name: "Metronome Mute",
        module: "Metronome",
        min_value: 0.0,
        max_value: 1.0,
        default_value: 0.0,
        stepped: true,
    },
];

/// Live parameter values as lock-free atomics
///
/// Written by the host (UI or parameter events on the audio thread),
/// read by the audio callback. f32 values are stored as bit patterns.
pub struct ParamAtomics {
    master_volume: AtomicU32,
    master_mute: AtomicBool,
    metronome_volume: AtomicU32,
    metronome_mute: AtomicBool,
}

impl ParamAtomics {
    pub fn new() -> Self {
        Self {
            master_volume: AtomicU32::new(1.0f32.to_bits()),
            master_mute: AtomicBool::new(false),
            metronome_volume: AtomicU32::new(0.5f32.to_bits()),
            metronome_mute: AtomicBool::new(false),
        }
    }

    /// Set a parameter from a host value
    pub fn set(&self, id: ParamId, value: f64) {
        match id {
            ParamId::MasterVolume => self
                .master_volume
                .store((value as f32).to_bits(), Ordering::Relaxed),
            ParamId::MasterMute => self.master_mute.store(value >= 0.5, Ordering::Relaxed),
            ParamId::MetronomeVolume => self
                .metronome_volume
                .store((value as f32).to_bits(), Ordering::Relaxed),
            ParamId::MetronomeMute => self.metronome_mute.store(value >= 0.5, Ordering::Relaxed),
        }
    }

    /// Read a parameter as a host value
    pub fn get(&self, id: ParamId) -> f64 {
        match id {
            ParamId::MasterVolume => self.master_volume_value() as f64,
            ParamId::MasterMute => {
                if self.master_mute_value() {
                    1.0
                } else {
                    0.0
                }
            }
            ParamId::MetronomeVolume => self.metronome_volume_value() as f64,
            ParamId::MetronomeMute => {
                if self.metronome_mute_value() {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    #[inline]
    pub fn master_volume_value(&self) -> f32 {
        f32::from_bits(self.master_volume.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn master_mute_value(&self) -> bool {
        self.master_mute.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn metronome_volume_value(&self) -> f32 {
        f32::from_bits(self.metronome_volume.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn metronome_mute_value(&self) -> bool {
        self.metronome_mute.load(Ordering::Relaxed)
    }
}

impl Default for ParamAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a parameter value as display text
pub fn value_to_text(id: ParamId, value: f64) -> String {
    match id {
        ParamId::MasterVolume | ParamId::MetronomeVolume => {
            if value <= 0.0 {
                "-inf dB".to_string()
            } else {
                format!("{:.1} dB", 20.0 * value.log10())
            }
        }
        ParamId::MasterMute | ParamId::MetronomeMute => {
            if value >= 0.5 { "Muted" } else { "Active" }.to_string()
        }
    }
}

/// Parse display text back into a parameter value
pub fn text_to_value(id: ParamId, text: &str) -> Option<f64> {
    match id {
        ParamId::MasterVolume | ParamId::MetronomeVolume => {
            let db: f64 = text
                .trim()
                .trim_end_matches("dB")
                .trim()
                .parse()
                .ok()?;
            Some(10f64.powf(db / 20.0))
        }
        ParamId::MasterMute | ParamId::MetronomeMute => {
            if text.contains("Mute") || text.trim() == "1" {
                Some(1.0)
            } else {
                Some(0.0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_descriptors() {
        let params = ParamAtomics::new();
        for info in &PARAMS {
            assert_eq!(params.get(info.id), info.default_value);
        }
    }

    #[test]
    fn test_set_get_round_trip() {
        let params = ParamAtomics::new();
        params.set(ParamId::MasterVolume, 0.25);
        params.set(ParamId::MasterMute, 1.0);
        assert_eq!(params.get(ParamId::MasterVolume), 0.25);
        assert_eq!(params.get(ParamId::MasterMute), 1.0);
        assert!(params.master_mute_value());
        assert_eq!(params.master_volume_value(), 0.25);
    }

    #[test]
    fn test_param_id_from_raw() {
        for id in ParamId::ALL {
            assert_eq!(ParamId::from_u32(id as u32), Some(id));
        }
        assert_eq!(ParamId::from_u32(99), None);
    }

    #[test]
    fn test_volume_text() {
        assert_eq!(value_to_text(ParamId::MasterVolume, 1.0), "0.0 dB");
        assert_eq!(value_to_text(ParamId::MasterVolume, 0.0), "-inf dB");
        assert_eq!(value_to_text(ParamId::MetronomeVolume, 2.0), "6.0 dB");

        let unity = text_to_value(ParamId::MasterVolume, "0.0 dB").unwrap();
        assert!((unity - 1.0).abs() < 1e-9);
        assert!(text_to_value(ParamId::MasterVolume, "garbage").is_none());
    }

    #[test]
    fn test_mute_text() {
        assert_eq!(value_to_text(ParamId::MasterMute, 1.0), "Muted");
        assert_eq!(value_to_text(ParamId::MasterMute, 0.0), "Active");
        assert_eq!(text_to_value(ParamId::MasterMute, "Muted"), Some(1.0));
        assert_eq!(text_to_value(ParamId::MasterMute, "Active"), Some(0.0));
        assert_eq!(text_to_value(ParamId::MetronomeMute, "1"), Some(1.0));
    }
}
