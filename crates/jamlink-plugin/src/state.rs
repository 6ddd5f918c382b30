//! Host persisted-state serialization
//!
//! The host hands us an opaque byte stream to save into and load from.
//! The payload is a small JSON document: connection defaults, the four
//! parameters, and the local channel settings. The password is never
//! persisted.
//!
//! Loading is field-tolerant: each field is applied only if it is
//! present with the expected type, so one malformed field never
//! discards the rest of the document.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use jamlink_core::session::SessionShared;

use crate::params::{ParamAtomics, ParamId};

/// Current persisted-state format version
pub const STATE_VERSION: u32 = 1;

/// Errors that can occur while loading persisted state
#[derive(Error, Debug)]
pub enum StateError {
    /// The host stream was empty
    #[error("State payload is empty")]
    Empty,

    /// The payload is not valid JSON
    #[error("Failed to parse state: {0}")]
    Parse(#[from] serde_json::Error),

    /// The payload was written by a newer format
    #[error("Unsupported state version {0}")]
    UnsupportedVersion(u64),
}

/// Local channel settings kept for persistence and UI display
///
/// The live values travel to the engine via commands; this copy is what
/// gets saved with the host project.
#[derive(Debug, Clone)]
pub struct LocalChannelState {
    pub name: String,
    /// Index into [`jamlink_core::types::BITRATES_KBPS`]
    pub bitrate_index: i32,
    pub transmit: bool,
}

impl Default for LocalChannelState {
    fn default() -> Self {
        Self {
            name: "channel0".to_string(),
            bitrate_index: 2,
            transmit: false,
        }
    }
}

#[derive(Serialize)]
struct LevelSection {
    volume: f32,
    mute: bool,
}

#[derive(Serialize)]
struct LocalChannelSection {
    name: String,
    bitrate: i32,
    transmit: bool,
}

#[derive(Serialize)]
struct StateDoc {
    version: u32,
    server: String,
    username: String,
    master: LevelSection,
    metronome: LevelSection,
    #[serde(rename = "localChannel")]
    local_channel: LocalChannelSection,
}

/// Serialize the current state to the persisted JSON document
pub fn save_state(
    shared: &SessionShared,
    params: &ParamAtomics,
    local: &Mutex<LocalChannelState>,
) -> String {
    let (server, username) = {
        let creds = shared.credentials.lock().unwrap();
        (creds.server.clone(), creds.username.clone())
    };
    let local = local.lock().unwrap().clone();

    let doc = StateDoc {
        version: STATE_VERSION,
        server,
        username,
        master: LevelSection {
            volume: params.master_volume_value(),
            mute: params.master_mute_value(),
        },
        metronome: LevelSection {
            volume: params.metronome_volume_value(),
            mute: params.metronome_mute_value(),
        },
        local_channel: LocalChannelSection {
            name: local.name,
            bitrate: local.bitrate_index,
            transmit: local.transmit,
        },
    };

    // StateDoc contains no map keys that can fail to serialize
    serde_json::to_string(&doc).expect("state serialization cannot fail")
}

/// Apply a persisted JSON document
///
/// Fields that are missing or have the wrong type are skipped; only an
/// empty payload, unparseable JSON, or a newer format version fail the
/// load.
pub fn load_state(
    data: &str,
    shared: &SessionShared,
    params: &ParamAtomics,
    local: &Mutex<LocalChannelState>,
) -> Result<(), StateError> {
    if data.is_empty() {
        return Err(StateError::Empty);
    }

    let root: Value = serde_json::from_str(data)?;

    if let Some(version) = root.get("version").and_then(Value::as_u64) {
        if version > STATE_VERSION as u64 {
            return Err(StateError::UnsupportedVersion(version));
        }
    }

    {
        let mut creds = shared.credentials.lock().unwrap();
        if let Some(server) = root.get("server").and_then(Value::as_str) {
            creds.server = server.to_string();
        }
        if let Some(username) = root.get("username").and_then(Value::as_str) {
            creds.username = username.to_string();
        }
    }

    apply_level_section(root.get("master"), params, ParamId::MasterVolume, ParamId::MasterMute);
    apply_level_section(
        root.get("metronome"),
        params,
        ParamId::MetronomeVolume,
        ParamId::MetronomeMute,
    );

    if let Some(section) = root.get("localChannel") {
        let mut local = local.lock().unwrap();
        if let Some(name) = section.get("name").and_then(Value::as_str) {
            local.name = name.to_string();
        }
        if let Some(bitrate) = section.get("bitrate").and_then(Value::as_i64) {
            local.bitrate_index = bitrate as i32;
        }
        if let Some(transmit) = section.get("transmit").and_then(Value::as_bool) {
            local.transmit = transmit;
        }
    }

    log::info!("Persisted state loaded");
    Ok(())
}

fn apply_level_section(
    section: Option<&Value>,
    params: &ParamAtomics,
    volume_id: ParamId,
    mute_id: ParamId,
) {
    let Some(section) = section else { return };
    if let Some(volume) = section.get("volume").and_then(Value::as_f64) {
        params.set(volume_id, volume);
    }
    if let Some(mute) = section.get("mute").and_then(Value::as_bool) {
        params.set(mute_id, if mute { 1.0 } else { 0.0 });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (SessionShared, ParamAtomics, Mutex<LocalChannelState>) {
        (
            SessionShared::new(),
            ParamAtomics::new(),
            Mutex::new(LocalChannelState::default()),
        )
    }

    #[test]
    fn test_save_load_round_trip() {
        let (shared, params, local) = fresh();
        {
            let mut creds = shared.credentials.lock().unwrap();
            creds.server = "jam.example.com:2049".to_string();
            creds.username = "tester".to_string();
            creds.password = "secret".to_string();
        }
        params.set(ParamId::MasterVolume, 0.8);
        params.set(ParamId::MetronomeMute, 1.0);
        local.lock().unwrap().transmit = true;

        let saved = save_state(&shared, &params, &local);
        // Credentials are persisted; the password never is
        assert!(!saved.contains("secret"));

        let (shared2, params2, local2) = fresh();
        load_state(&saved, &shared2, &params2, &local2).unwrap();

        let creds = shared2.credentials.lock().unwrap();
        assert_eq!(creds.server, "jam.example.com:2049");
        assert_eq!(creds.username, "tester");
        assert!(creds.password.is_empty());
        assert_eq!(params2.master_volume_value(), 0.8f32);
        assert_eq!(params2.get(ParamId::MetronomeMute), 1.0);
        assert!(local2.lock().unwrap().transmit);
    }

    #[test]
    fn test_malformed_field_is_skipped() {
        let (shared, params, local) = fresh();
        // server has the wrong type, master.volume is fine
        let doc = r#"{
            "version": 1,
            "server": 42,
            "username": "tester",
            "master": { "volume": 0.25, "mute": "not-a-bool" }
        }"#;

        load_state(doc, &shared, &params, &local).unwrap();

        let creds = shared.credentials.lock().unwrap();
        assert_eq!(creds.server, "");
        assert_eq!(creds.username, "tester");
        assert_eq!(params.get(ParamId::MasterVolume), 0.25);
        // Malformed mute left at its default
        assert_eq!(params.get(ParamId::MasterMute), 0.0);
    }

    #[test]
    fn test_missing_sections_keep_defaults() {
        let (shared, params, local) = fresh();
        load_state(r#"{"version": 1}"#, &shared, &params, &local).unwrap();
        assert_eq!(params.get(ParamId::MasterVolume), 1.0);
        assert_eq!(local.lock().unwrap().bitrate_index, 2);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let (shared, params, local) = fresh();
        let result = load_state(r#"{"version": 2}"#, &shared, &params, &local);
        assert!(matches!(result, Err(StateError::UnsupportedVersion(2))));
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let (shared, params, local) = fresh();
        assert!(matches!(
            load_state("", &shared, &params, &local),
            Err(StateError::Empty)
        ));
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        let (shared, params, local) = fresh();
        assert!(matches!(
            load_state("{not json", &shared, &params, &local),
            Err(StateError::Parse(_))
        ));
    }
}
