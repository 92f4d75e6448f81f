use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// NMEA 2000 proprietary fast-packet PGN used for every outbound command
pub const PROPRIETARY_PGN: u32 = 126720;

/// PGN the stereo uses to stream menu entries back
pub const MENU_ITEM_PGN: u32 = 130820;

/// Our own address on the bus
pub const DEFAULT_SOURCE: u8 = 1;

/// Priority of single-frame style commands
pub const STANDARD_PRIORITY: u8 = 6;

/// Priority of the longer SiriusXM and menu commands
pub const EXTENDED_PRIORITY: u8 = 7;

/// Manufacturer 419 with industry group 4 packed little-endian
const MANUFACTURER_HEADER: [&str; 2] = ["a3", "99"];

/// Manufacturer name in structured messages
pub const MANUFACTURER_CODE: &str = "Fusion Electronics";

/// Industry name in structured messages
pub const INDUSTRY_CODE: &str = "Marine Industry";

/// Manufacturer name as reported by the analyzer
const ANALYZER_MANUFACTURER: &str = "Fusion";

/// One encoded command, in whichever representation its action uses
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Comma separated text frame for the raw output channel
    Legacy(LegacyFrame),
    /// Typed message for the JSON output channel
    Structured(ProprietaryMessage),
}

impl Frame {
    /// Number of payload bytes on the wire, manufacturer header included
    pub fn payload_len(&self) -> usize {
        match self {
            Frame::Legacy(f) => f.payload.len(),
            Frame::Structured(m) => m.fields.body.byte_len(),
        }
    }

    pub fn as_legacy(&self) -> Option<&LegacyFrame> {
        match self {
            Frame::Legacy(f) => Some(f),
            Frame::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&ProprietaryMessage> {
        match self {
            Frame::Legacy(_) => None,
            Frame::Structured(m) => Some(m),
        }
    }
}

/// Text frame in the `timestamp,prio,pgn,src,dst,len,bytes...` layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyFrame {
    pub timestamp: String,
    pub priority: u8,
    pub pgn: u32,
    pub source: u8,
    pub destination: u8,
    /// Hex byte fields, starting with the manufacturer header
    pub payload: Vec<String>,
}

impl LegacyFrame {
    /// Build a proprietary frame; `body` is everything after the manufacturer header
    pub fn proprietary<I, S>(priority: u8, destination: u8, body: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let payload = MANUFACTURER_HEADER
            .iter()
            .map(|s| s.to_string())
            .chain(body.into_iter().map(Into::into))
            .collect();

        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            priority,
            pgn: PROPRIETARY_PGN,
            source: DEFAULT_SOURCE,
            destination,
            payload,
        }
    }

    /// All text fields in wire order
    pub fn fields(&self) -> Vec<String> {
        let mut fields = vec![
            self.timestamp.clone(),
            self.priority.to_string(),
            self.pgn.to_string(),
            self.source.to_string(),
            self.destination.to_string(),
            self.payload.len().to_string(),
        ];
        fields.extend(self.payload.iter().cloned());
        fields
    }

    /// Payload fields after the manufacturer header
    pub fn body(&self) -> &[String] {
        &self.payload[MANUFACTURER_HEADER.len().min(self.payload.len())..]
    }
}

impl fmt::Display for LegacyFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields().join(","))
    }
}

/// Structured proprietary message for the JSON output channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProprietaryMessage {
    pub pgn: u32,
    pub dst: u8,
    pub prio: u8,
    pub fields: MessageFields,
}

impl ProprietaryMessage {
    pub fn new(dst: u8, body: MessageBody) -> Self {
        Self {
            pgn: PROPRIETARY_PGN,
            dst,
            prio: STANDARD_PRIORITY,
            fields: MessageFields {
                manufacturer_code: MANUFACTURER_CODE,
                industry_code: INDUSTRY_CODE,
                body,
            },
        }
    }
}

/// Common manufacturer framing plus the command specific body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageFields {
    #[serde(rename = "Manufacturer Code")]
    pub manufacturer_code: &'static str,
    #[serde(rename = "Industry Code")]
    pub industry_code: &'static str,
    #[serde(flatten)]
    pub body: MessageBody,
}

/// Command specific fields of a structured message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Message ID")]
pub enum MessageBody {
    #[serde(rename = "Media Control")]
    MediaControl {
        #[serde(rename = "Source ID")]
        source_id: u32,
        #[serde(rename = "Command")]
        command: MediaCommand,
    },
    #[serde(rename = "Mute")]
    Mute {
        #[serde(rename = "Command")]
        command: MuteCommand,
    },
    #[serde(rename = "Power")]
    Power {
        #[serde(rename = "State")]
        state: PowerState,
    },
}

impl MessageBody {
    /// Wire length, matching the equivalent legacy frame
    pub fn byte_len(&self) -> usize {
        match self {
            MessageBody::MediaControl { .. } => 6,
            MessageBody::Mute { .. } | MessageBody::Power { .. } => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MediaCommand {
    Play,
    Pause,
    Next,
    Prev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MuteCommand {
    #[serde(rename = "Mute On")]
    MuteOn,
    #[serde(rename = "Mute Off")]
    MuteOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerState {
    On,
    Off,
}

/// Decoded inbound frame from the bus analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerFrame {
    pub pgn: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<u8>,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl AnalyzerFrame {
    /// Build a menu item frame as the stereo would send it
    pub fn menu_item(text: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert("Manufacturer Code".to_string(), Value::from(ANALYZER_MANUFACTURER));
        fields.insert("Industry Code".to_string(), Value::from("Marine Industry"));
        fields.insert("Message ID".to_string(), Value::from("Menu Item"));
        fields.insert("Text".to_string(), Value::from(text.into()));
        Self {
            pgn: MENU_ITEM_PGN,
            src: None,
            fields,
        }
    }

    /// Label of a Fusion menu item frame, `None` for anything else
    pub fn menu_item_text(&self) -> Option<&str> {
        if self.pgn != MENU_ITEM_PGN {
            return None;
        }
        let field = |name: &str| self.fields.get(name).and_then(|v| v.as_str());
        if field("Manufacturer Code") != Some(ANALYZER_MANUFACTURER)
            || field("Message ID") != Some("Menu Item")
        {
            return None;
        }
        field("Text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_frame_renders_header_and_length() {
        let frame = LegacyFrame::proprietary(STANDARD_PRIORITY, 10, ["11", "00", "01"]);
        let fields = frame.fields();
        assert_eq!(&fields[1..], ["6", "126720", "1", "10", "5", "a3", "99", "11", "00", "01"]);
        assert!(frame.to_string().ends_with(",6,126720,1,10,5,a3,99,11,00,01"));
        assert_eq!(frame.body(), ["11", "00", "01"]);
        assert!(frame.timestamp.ends_with('Z'));
    }

    #[test]
    fn structured_message_serializes_flat_fields() {
        let msg = ProprietaryMessage::new(
            10,
            MessageBody::MediaControl {
                source_id: 3,
                command: MediaCommand::Next,
            },
        );
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "pgn": 126720,
                "dst": 10,
                "prio": 6,
                "fields": {
                    "Manufacturer Code": "Fusion Electronics",
                    "Industry Code": "Marine Industry",
                    "Message ID": "Media Control",
                    "Source ID": 3,
                    "Command": "Next"
                }
            })
        );
    }

    #[test]
    fn menu_item_text_filters_other_frames() {
        assert_eq!(AnalyzerFrame::menu_item("Phone").menu_item_text(), Some("Phone"));

        let other: AnalyzerFrame = serde_json::from_value(json!({
            "pgn": 130820,
            "fields": {"Manufacturer Code": "Fusion", "Message ID": "Track Title", "Text": "Song"}
        }))
        .unwrap();
        assert_eq!(other.menu_item_text(), None);

        let wrong_pgn: AnalyzerFrame = serde_json::from_value(json!({"pgn": 127245})).unwrap();
        assert_eq!(wrong_pgn.menu_item_text(), None);
    }
}
