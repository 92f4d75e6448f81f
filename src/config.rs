use crate::codec::ZONE_COUNT;
use crate::error::Result;
use crate::types::DeviceAddress;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Plugin options, as stored by the host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Scan the source inventory for a stereo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_discover: Option<bool>,

    /// Fixed stereo bus address
    #[serde(
        default,
        deserialize_with = "deserialize_device_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub deviceid: Option<DeviceAddress>,

    /// Announce alarms on the stereo
    #[serde(default)]
    pub enable_alarms: bool,

    #[serde(default = "default_true")]
    pub play_sound: bool,

    /// Display name of the input the alarm audio is wired to
    #[serde(default = "default_alarm_input")]
    pub alarm_input: String,

    #[serde(default = "default_alarm_audio_file")]
    pub alarm_audio_file: String,

    #[serde(rename = "alarmUnMute", default = "default_true")]
    pub alarm_unmute: bool,

    #[serde(default)]
    pub alarm_set_volume: bool,

    /// Volume applied to enabled zones (0-24)
    #[serde(default = "default_alarm_volume")]
    pub alarm_volume: u32,

    #[serde(default = "default_true")]
    pub alarm_zone1: bool,
    #[serde(default = "default_true")]
    pub alarm_zone2: bool,
    #[serde(default = "default_true")]
    pub alarm_zone3: bool,
    #[serde(default = "default_true")]
    pub alarm_zone4: bool,

    /// Command line audio player
    #[serde(default = "default_audio_player")]
    pub alarm_audio_player: String,

    /// Extra player arguments, separated by spaces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alarm_audio_player_arguments: Option<String>,

    /// Poll the stereo for status every ten seconds
    #[serde(default = "default_true")]
    pub send_status_requests: bool,
}

fn default_true() -> bool {
    true
}

fn default_alarm_input() -> String {
    "Aux1".to_string()
}

fn default_alarm_audio_file() -> String {
    "builtin_alarm.mp3".to_string()
}

fn default_alarm_volume() -> u32 {
    12
}

fn default_audio_player() -> String {
    if cfg!(target_os = "macos") {
        "afplay".to_string()
    } else {
        "omxplayer".to_string()
    }
}

/// The schema stores the id as a string, older configs as a number
fn deserialize_device_id<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DeviceAddress>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(DeviceAddress),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_discover: None,
            deviceid: None,
            enable_alarms: false,
            play_sound: true,
            alarm_input: default_alarm_input(),
            alarm_audio_file: default_alarm_audio_file(),
            alarm_unmute: true,
            alarm_set_volume: false,
            alarm_volume: default_alarm_volume(),
            alarm_zone1: true,
            alarm_zone2: true,
            alarm_zone3: true,
            alarm_zone4: true,
            alarm_audio_player: default_audio_player(),
            alarm_audio_player_arguments: None,
            send_status_requests: true,
        }
    }
}

impl Config {
    /// Parse the host's option document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Auto-discovery runs when asked for, or when no address is configured
    pub fn auto_discovery_enabled(&self) -> bool {
        self.auto_discover.unwrap_or(self.deviceid.is_none())
    }

    pub fn alarm_zones(&self) -> [bool; ZONE_COUNT] {
        [
            self.alarm_zone1,
            self.alarm_zone2,
            self.alarm_zone3,
            self.alarm_zone4,
        ]
    }

    /// Per-zone volumes to apply while an alarm sounds
    pub fn alarm_volumes(&self) -> [u32; ZONE_COUNT] {
        self.alarm_zones()
            .map(|enabled| if enabled { self.alarm_volume } else { 0 })
    }

    /// Audio file path, relative names resolved against `asset_dir`
    pub fn alarm_audio_path(&self, asset_dir: &Path) -> PathBuf {
        let file = Path::new(&self.alarm_audio_file);
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            asset_dir.join(file)
        }
    }

    /// Player arguments followed by the audio file
    pub fn player_args(&self, file: &Path) -> Vec<String> {
        self.alarm_audio_player_arguments
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .chain(std::iter::once(file.to_string_lossy().into_owned()))
            .collect()
    }
}
