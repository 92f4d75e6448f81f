use crate::bus::BusSender;
use crate::command::{Command, CommandRequest, Intent};
use crate::encoder::encode;
use crate::error::{FusionError, Result};
use crate::store::{publish_device, DeviceView, StateStore};
use crate::types::DeviceAddress;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/// Single entry point for every outbound stereo command
///
/// HTTP routes, UI controls and the alarm override all funnel through
/// here so that context lookup, encoding and emission happen one way.
#[derive(Clone)]
pub struct Controller {
    store: Arc<dyn StateStore>,
    bus: BusSender,
    device: watch::Receiver<Option<DeviceAddress>>,
    alarm_output: Arc<watch::Sender<bool>>,
}

impl Controller {
    pub fn new(
        store: Arc<dyn StateStore>,
        bus: BusSender,
        device: watch::Receiver<Option<DeviceAddress>>,
        alarm_output: Arc<watch::Sender<bool>>,
    ) -> Self {
        Self {
            store,
            bus,
            device,
            alarm_output,
        }
    }

    /// Bus address of the stereo, once known
    pub fn device(&self) -> Option<DeviceAddress> {
        *self.device.borrow()
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn view(&self) -> DeviceView<'_> {
        DeviceView::new(self.store.as_ref())
    }

    /// Whether alarms are currently announced on the stereo
    pub fn alarm_output_enabled(&self) -> bool {
        *self.alarm_output.borrow()
    }

    /// Watch the alarm output setting
    pub fn subscribe_alarm_output(&self) -> watch::Receiver<bool> {
        self.alarm_output.subscribe()
    }

    /// Handle a `{action, device, zone?, value?}` request
    pub fn submit(&self, request: &CommandRequest) -> Result<()> {
        tracing::debug!(
            "path: {:?} deviceid: {:?} command: {}",
            request.device,
            self.device(),
            serde_json::to_string(request)?
        );

        let missing = |what: &str| FusionError::MissingContext(format!("no current {what}"));
        let view = self.view();

        let command = match request.parse()? {
            Intent::Command(command) => command,
            Intent::ToggleMute => match view.muted().ok_or_else(|| missing("mute state"))? {
                true => Command::Unmute,
                false => Command::Mute,
            },
            Intent::TogglePower => {
                match view.power_state().ok_or_else(|| missing("power state"))?.as_str() {
                    "on" => Command::PowerOff,
                    _ => Command::PowerOn,
                }
            }
            Intent::PlayPause => match view.playing().ok_or_else(|| missing("playbackState"))? {
                true => Command::Pause,
                false => Command::Play,
            },
            Intent::ToggleOutputAlarms => {
                let enabled = view
                    .output_alarms()
                    .ok_or_else(|| missing("outputAlarms state"))?;
                Command::SetAlarmOutputEnabled(!enabled)
            }
        };

        self.send(&command)
    }

    /// Encode and emit one command
    pub fn send(&self, command: &Command) -> Result<()> {
        if let Command::SetAlarmOutputEnabled(enabled) = command {
            self.set_alarm_output(*enabled);
            return Ok(());
        }

        let device = self.device().ok_or(FusionError::NoDevice)?;

        let (source_name, source_id) = if command.is_media_transport() {
            let view = self.view();
            let id = view.current_source_id();
            let name = id.as_deref().and_then(|id| view.source_name(id));
            tracing::debug!("cur_source_id: {:?} source name: {:?}", id, name);
            (name, id)
        } else {
            (None, None)
        };

        let frame = encode(command, device, source_name.as_deref(), source_id.as_deref())?;
        self.bus.send(frame)
    }

    /// Turn alarm announcements on or off and publish the setting
    pub fn set_alarm_output(&self, enabled: bool) {
        let changed = self.alarm_output.send_if_modified(|current| {
            let changed = *current != enabled;
            *current = enabled;
            changed
        });

        if changed {
            tracing::info!("Alarm output {}", if enabled { "enabled" } else { "disabled" });
            self.publish_alarm_output();
        }
    }

    /// Publish the current alarm output setting to the data model
    pub fn publish_alarm_output(&self) {
        publish_device(
            self.store.as_ref(),
            "outputAlarms",
            Value::Bool(self.alarm_output_enabled()),
        );
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::bus::{self, BusReceiver};
    use crate::protocol::{MediaCommand, MessageBody, MuteCommand};
    use crate::store::tests::stereo_store;
    use crate::store::{MemoryStore, DEVICE_PREFIX};
    use serde_json::json;

    pub(crate) fn controller_with(
        store: Arc<MemoryStore>,
        device: Option<DeviceAddress>,
    ) -> (Controller, BusReceiver, watch::Sender<Option<DeviceAddress>>) {
        let (bus, rx) = bus::channel();
        let (device_tx, device_rx) = watch::channel(device);
        let alarm_output = Arc::new(watch::channel(false).0);
        (Controller::new(store, bus, device_rx, alarm_output), rx, device_tx)
    }

    fn request(v: Value) -> CommandRequest {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn submit_without_device_fails() {
        let (controller, _rx, _tx) = controller_with(Arc::new(stereo_store()), None);
        assert!(matches!(
            controller.submit(&request(json!({"action": "status"}))),
            Err(FusionError::NoDevice)
        ));
    }

    #[test]
    fn media_commands_resolve_current_source() {
        let store = Arc::new(stereo_store());
        let (controller, mut rx, _tx) = controller_with(store.clone(), Some(10));

        controller.submit(&request(json!({"action": "next"}))).unwrap();
        let (_, json) = rx.drain();
        assert_eq!(
            json[0].fields.body,
            MessageBody::MediaControl {
                source_id: 3,
                command: MediaCommand::Next
            }
        );

        store.publish(
            &format!("{DEVICE_PREFIX}.output.zone1.source"),
            json!(format!("{DEVICE_PREFIX}.avsource.source7")),
        );
        controller.submit(&request(json!({"action": "next"}))).unwrap();
        let (text, _) = rx.drain();
        assert!(text[0].ends_with(",7,126720,1,10,8,a3,99,1e,00,07,01,00,00"));
    }

    #[test]
    fn media_command_without_source_is_missing_context() {
        let (controller, _rx, _tx) = controller_with(Arc::new(MemoryStore::new()), Some(10));
        assert!(matches!(
            controller.submit(&request(json!({"action": "play"}))),
            Err(FusionError::MissingContext(_))
        ));
    }

    #[test]
    fn toggles_read_device_state() {
        let store = Arc::new(stereo_store());
        let (controller, mut rx, _tx) = controller_with(store.clone(), Some(10));

        controller.submit(&request(json!({"action": "toggleMute"}))).unwrap();
        let (_, json) = rx.drain();
        assert_eq!(json[0].fields.body, MessageBody::Mute { command: MuteCommand::MuteOn });

        controller.submit(&request(json!({"action": "togglePower"}))).unwrap();
        assert_eq!(rx.drain().1.len(), 1);

        assert!(matches!(
            controller.submit(&request(json!({"action": "playPause"}))),
            Err(FusionError::MissingContext(_))
        ));
    }

    #[test]
    fn play_alarms_updates_setting_without_bus_traffic() {
        let store = Arc::new(stereo_store());
        let (controller, mut rx, _tx) = controller_with(store.clone(), Some(10));

        controller
            .submit(&request(json!({"action": "playAlarms", "value": true})))
            .unwrap();
        assert!(controller.alarm_output_enabled());
        assert_eq!(
            store.get(&format!("{DEVICE_PREFIX}.outputAlarms")),
            Some(json!(true))
        );

        controller
            .submit(&request(json!({"action": "toggleOutputAlarms"})))
            .unwrap();
        assert!(!controller.alarm_output_enabled());

        let (text, json) = rx.drain();
        assert!(text.is_empty() && json.is_empty());
    }

    #[test]
    fn set_volume_out_of_range_sends_nothing() {
        let (controller, mut rx, _tx) = controller_with(Arc::new(stereo_store()), Some(10));
        assert!(controller
            .submit(&request(json!({"action": "setVolume", "zone": "zone1", "value": 30})))
            .is_err());
        let (text, json) = rx.drain();
        assert!(text.is_empty() && json.is_empty());
    }
}
