//! Command to bus frame encoding.
//!
//! Mute, power and standard media transport commands have structured
//! constructors and go out as [`ProprietaryMessage`]s on the JSON channel.
//! Everything else, including the SiriusXM transport variants and the
//! bluetooth menu frames, is only understood as legacy text.

use crate::codec::{hex2, source_index, zone_index};
use crate::command::Command;
use crate::error::{FusionError, Result};
use crate::protocol::{
    Frame, LegacyFrame, MediaCommand, MessageBody, MuteCommand, PowerState, ProprietaryMessage,
    EXTENDED_PRIORITY, STANDARD_PRIORITY,
};

/// Source name that switches transport commands to the SiriusXM set
pub const SIRIUS_XM: &str = "SiriusXM";

/// Encode a command addressed to the stereo at `device`
///
/// Media transport commands need the currently selected source id
/// (`source<N>`) and, when available, its display name.
pub fn encode(
    command: &Command,
    device: u8,
    current_source_name: Option<&str>,
    current_source_id: Option<&str>,
) -> Result<Frame> {
    let frame = match command {
        Command::Status => legacy(STANDARD_PRIORITY, device, ["01".to_string(), "00".to_string()]),
        Command::Mute => structured(device, MessageBody::Mute { command: MuteCommand::MuteOn }),
        Command::Unmute => structured(device, MessageBody::Mute { command: MuteCommand::MuteOff }),
        Command::PowerOn => structured(device, MessageBody::Power { state: PowerState::On }),
        Command::PowerOff => structured(device, MessageBody::Power { state: PowerState::Off }),
        Command::SetSource { source } => {
            let index = source_index(source.as_deref())?;
            legacy(STANDARD_PRIORITY, device, ["02".to_string(), "00".to_string(), hex2(index)])
        }
        Command::SetZoneVolume { zone, volume } => {
            let zone = zone_index(zone)?;
            legacy(
                STANDARD_PRIORITY,
                device,
                ["18".to_string(), "00".to_string(), hex2(zone), hex2(*volume)],
            )
        }
        Command::SetAllVolumes { volumes } => {
            let mut body = vec!["19".to_string(), "00".to_string()];
            body.extend(volumes.iter().map(|v| hex2(v.unwrap_or(0))));
            legacy(STANDARD_PRIORITY, device, body)
        }
        Command::Next | Command::Prev | Command::Play | Command::Pause => {
            let source_id = current_source_id.ok_or_else(|| {
                FusionError::MissingContext(format!("{} needs the current source", command.name()))
            })?;
            let index = source_index(Some(source_id))?;

            if current_source_name == Some(SIRIUS_XM) {
                let code = match command {
                    Command::Next => "01",
                    Command::Prev => "02",
                    _ => {
                        return Err(FusionError::UnsupportedAction(format!(
                            "{} on {}",
                            command.name(),
                            SIRIUS_XM
                        )))
                    }
                };
                legacy(
                    EXTENDED_PRIORITY,
                    device,
                    [
                        "1e".to_string(),
                        "00".to_string(),
                        hex2(index),
                        code.to_string(),
                        "00".to_string(),
                        "00".to_string(),
                    ],
                )
            } else {
                let media = match command {
                    Command::Next => MediaCommand::Next,
                    Command::Prev => MediaCommand::Prev,
                    Command::Play => MediaCommand::Play,
                    _ => MediaCommand::Pause,
                };
                structured(
                    device,
                    MessageBody::MediaControl {
                        source_id: index,
                        command: media,
                    },
                )
            }
        }
        Command::SetBluetoothDevice { value } => legacy(
            EXTENDED_PRIORITY,
            device,
            ["09", "00", "0b"]
                .into_iter()
                .map(String::from)
                .chain(std::iter::once(hex2(*value)))
                .chain(["00", "00", "00", "02", "02"].into_iter().map(String::from)),
        ),
        Command::SetAlarmOutputEnabled(_) => {
            return Err(FusionError::UnsupportedAction(command.name().to_string()))
        }
    };

    Ok(frame)
}

/// The three frames that open the bluetooth device menu
pub fn open_bluetooth_menu(device: u8) -> [LegacyFrame; 3] {
    let select = ["09", "00", "0b", "00", "00", "00", "00", "01", "02"];
    [
        LegacyFrame::proprietary(EXTENDED_PRIORITY, device, select),
        LegacyFrame::proprietary(EXTENDED_PRIORITY, device, select),
        LegacyFrame::proprietary(
            EXTENDED_PRIORITY,
            device,
            ["0b", "00", "0b", "00", "00", "00", "00", "05", "00", "00", "00", "02"],
        ),
    ]
}

/// Frame that closes whatever menu is open
pub fn end_menu(device: u8) -> LegacyFrame {
    LegacyFrame::proprietary(
        EXTENDED_PRIORITY,
        device,
        ["09", "00", "0b", "00", "00", "00", "00", "04", "02"],
    )
}

fn legacy<I>(priority: u8, device: u8, body: I) -> Frame
where
    I: IntoIterator<Item = String>,
{
    Frame::Legacy(LegacyFrame::proprietary(priority, device, body))
}

fn structured(device: u8, body: MessageBody) -> Frame {
    Frame::Structured(ProprietaryMessage::new(device, body))
}
