use crate::codec::ZONE_COUNT;
use crate::error::{FusionError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest volume step the stereo accepts
pub const MAX_VOLUME: u32 = 24;

/// Abstract stereo command, validated and ready to encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Next,
    Prev,
    Play,
    Pause,
    Status,
    Mute,
    Unmute,
    /// Select a `source<N>` input. `None` selects source 0.
    SetSource { source: Option<String> },
    /// Set one `zone<N>` volume
    SetZoneVolume { zone: String, volume: u32 },
    /// Set all four zone volumes at once, missing zones become 0
    SetAllVolumes { volumes: [Option<u32>; ZONE_COUNT] },
    PowerOn,
    PowerOff,
    /// Pair with the bluetooth device at the given menu position
    SetBluetoothDevice { value: u32 },
    /// Turn alarm announcements on or off (handled locally, never encoded)
    SetAlarmOutputEnabled(bool),
}

impl Command {
    /// Wire action name as used by the command intake
    pub fn name(&self) -> &'static str {
        match self {
            Command::Next => "next",
            Command::Prev => "prev",
            Command::Play => "play",
            Command::Pause => "pause",
            Command::Status => "status",
            Command::Mute => "mute",
            Command::Unmute => "unmute",
            Command::SetSource { .. } => "setSource",
            Command::SetZoneVolume { .. } => "setVolume",
            Command::SetAllVolumes { .. } => "setAllVolume",
            Command::PowerOn => "poweron",
            Command::PowerOff => "poweroff",
            Command::SetBluetoothDevice { .. } => "setBTDevice",
            Command::SetAlarmOutputEnabled(_) => "playAlarms",
        }
    }

    /// Whether encoding needs the currently selected source
    pub fn is_media_transport(&self) -> bool {
        matches!(
            self,
            Command::Next | Command::Prev | Command::Play | Command::Pause
        )
    }

    /// `SetAllVolumes` with every zone given explicitly
    pub fn all_volumes(volumes: [u32; ZONE_COUNT]) -> Self {
        Command::SetAllVolumes {
            volumes: volumes.map(Some),
        }
    }
}

/// Intake request shaped like `{action, device, zone?, value?}`
///
/// This is what HTTP routes, UI controls and internal callers hand to
/// [`Controller::submit`](crate::Controller::submit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A parsed intake request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Command(Command),
    /// Mute if unmuted, unmute if muted
    ToggleMute,
    /// Power off if on, power on if off
    TogglePower,
    /// Pause if playing, play otherwise
    PlayPause,
    /// Flip the alarm output setting
    ToggleOutputAlarms,
}

impl CommandRequest {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            device: None,
            zone: None,
            value: None,
        }
    }

    pub fn with_zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Validate the request and turn it into an [`Intent`]
    pub fn parse(&self) -> Result<Intent> {
        let command = match self.action.as_str() {
            "next" => Command::Next,
            "prev" => Command::Prev,
            "play" => Command::Play,
            "pause" => Command::Pause,
            "status" => Command::Status,
            "mute" => Command::Mute,
            "unmute" => Command::Unmute,
            "poweron" => Command::PowerOn,
            "poweroff" => Command::PowerOff,
            "setSource" => {
                let source = match &self.value {
                    None | Some(Value::Null) => None,
                    Some(Value::String(s)) => Some(s.clone()),
                    Some(other) => {
                        return Err(FusionError::MalformedIdentifier(other.to_string()))
                    }
                };
                Command::SetSource { source }
            }
            "setVolume" => {
                let zone = self.zone.clone().ok_or_else(|| {
                    FusionError::MissingContext("setVolume requires a zone".to_string())
                })?;
                let value = self.value.as_ref().ok_or_else(|| {
                    FusionError::MissingContext("setVolume requires a value".to_string())
                })?;
                Command::SetZoneVolume {
                    zone,
                    volume: checked_volume(value)?,
                }
            }
            "setAllVolume" => {
                let mut volumes = [None; ZONE_COUNT];
                if let Some(obj) = self.value.as_ref().and_then(|v| v.as_object()) {
                    for (i, slot) in volumes.iter_mut().enumerate() {
                        if let Some(v) = obj.get(&format!("zone{}", i + 1)) {
                            *slot = Some(checked_volume(v)?);
                        }
                    }
                }
                Command::SetAllVolumes { volumes }
            }
            "setBTDevice" => {
                let value = self.value.as_ref().ok_or_else(|| {
                    FusionError::MissingContext("setBTDevice requires a device number".to_string())
                })?;
                let value = value
                    .as_u64()
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| FusionError::InvalidValue {
                        field: "device number",
                        value: value.to_string(),
                    })?;
                Command::SetBluetoothDevice { value }
            }
            "playAlarms" => Command::SetAlarmOutputEnabled(truthy(self.value.as_ref())),
            "toggleMute" => return Ok(Intent::ToggleMute),
            "togglePower" => return Ok(Intent::TogglePower),
            "playPause" => return Ok(Intent::PlayPause),
            "toggleOutputAlarms" => return Ok(Intent::ToggleOutputAlarms),
            other => return Err(FusionError::UnsupportedAction(other.to_string())),
        };

        Ok(Intent::Command(command))
    }
}

fn checked_volume(value: &Value) -> Result<u32> {
    let n = value.as_i64().ok_or_else(|| FusionError::InvalidValue {
        field: "volume",
        value: value.to_string(),
    })?;

    if !(0..=MAX_VOLUME as i64).contains(&n) {
        return Err(FusionError::OutOfRange {
            field: "volume",
            value: n,
            min: 0,
            max: MAX_VOLUME as i64,
        });
    }

    Ok(n as u32)
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => s == "on" || s == "true",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> Result<Intent> {
        serde_json::from_value::<CommandRequest>(v).unwrap().parse()
    }

    #[test]
    fn parses_simple_actions() {
        assert_eq!(
            parse(json!({"action": "next", "device": "entertainment.device.fusion1"})).unwrap(),
            Intent::Command(Command::Next)
        );
        assert_eq!(
            parse(json!({"action": "poweroff"})).unwrap(),
            Intent::Command(Command::PowerOff)
        );
        assert_eq!(parse(json!({"action": "playPause"})).unwrap(), Intent::PlayPause);
    }

    #[test]
    fn unknown_action_is_unsupported() {
        assert!(matches!(
            parse(json!({"action": "eject"})),
            Err(FusionError::UnsupportedAction(a)) if a == "eject"
        ));
    }

    #[test]
    fn set_volume_is_range_checked() {
        assert_eq!(
            parse(json!({"action": "setVolume", "zone": "zone2", "value": 24})).unwrap(),
            Intent::Command(Command::SetZoneVolume {
                zone: "zone2".to_string(),
                volume: 24
            })
        );
        assert!(matches!(
            parse(json!({"action": "setVolume", "zone": "zone2", "value": 25})),
            Err(FusionError::OutOfRange { value: 25, .. })
        ));
        assert!(matches!(
            parse(json!({"action": "setVolume", "zone": "zone2", "value": -1})),
            Err(FusionError::OutOfRange { value: -1, .. })
        ));
        assert!(parse(json!({"action": "setVolume", "value": 3})).is_err());
    }

    #[test]
    fn non_integer_values_are_invalid() {
        for value in [json!(12.5), json!("x"), json!([3])] {
            assert!(matches!(
                parse(json!({"action": "setVolume", "zone": "zone1", "value": value})),
                Err(FusionError::InvalidValue { field: "volume", .. })
            ));
        }
        assert!(matches!(
            parse(json!({"action": "setAllVolume", "value": {"zone2": "loud"}})),
            Err(FusionError::InvalidValue { field: "volume", .. })
        ));
        assert!(matches!(
            parse(json!({"action": "setBTDevice", "value": "phone"})),
            Err(FusionError::InvalidValue { .. })
        ));
        assert!(matches!(
            parse(json!({"action": "setBTDevice"})),
            Err(FusionError::MissingContext(_))
        ));
    }

    #[test]
    fn set_all_volume_leaves_missing_zones_empty() {
        let intent =
            parse(json!({"action": "setAllVolume", "value": {"zone1": 5, "zone3": 7}})).unwrap();
        assert_eq!(
            intent,
            Intent::Command(Command::SetAllVolumes {
                volumes: [Some(5), None, Some(7), None]
            })
        );
    }

    #[test]
    fn set_source_tolerates_missing_value() {
        assert_eq!(
            parse(json!({"action": "setSource"})).unwrap(),
            Intent::Command(Command::SetSource { source: None })
        );
        assert_eq!(
            parse(json!({"action": "setSource", "value": "source3"})).unwrap(),
            Intent::Command(Command::SetSource {
                source: Some("source3".to_string())
            })
        );
    }

    #[test]
    fn play_alarms_reads_truthy_values() {
        assert_eq!(
            parse(json!({"action": "playAlarms", "value": true})).unwrap(),
            Intent::Command(Command::SetAlarmOutputEnabled(true))
        );
        assert_eq!(
            parse(json!({"action": "playAlarms", "value": 0})).unwrap(),
            Intent::Command(Command::SetAlarmOutputEnabled(false))
        );
    }
}
