use crate::alarm::Notification;
use crate::bluetooth::BluetoothDiscovery;
use crate::bus::{AnalyzerFeed, BusSender};
use crate::command::{Command, CommandRequest};
use crate::config::Config;
use crate::controller::Controller;
use crate::discovery::Discovery;
use crate::error::{FusionError, Result};
use crate::playback::AudioPlayer;
use crate::store::StateStore;
use crate::takeover::{AlarmOverride, AlarmSettings, OverrideStatus};
use crate::types::{BtDevice, DeviceAddress, DiscoveredStereo};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

/// How often a status request is sent to the stereo
pub const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// What the host provides to the service
pub struct Collaborators {
    pub store: Arc<dyn StateStore>,
    pub bus: BusSender,
    pub analyzer: AnalyzerFeed,
    /// Alarm sound player; ignored when `playSound` is off
    pub player: Option<Arc<dyn AudioPlayer>>,
}

/// The running stereo integration
///
/// Owns every background task: stereo discovery, the status poll and the
/// alarm override. Dropping the service without calling [`stop`] leaves
/// those tasks running until the runtime shuts down.
///
/// [`stop`]: FusionService::stop
pub struct FusionService {
    controller: Controller,
    device_tx: Arc<watch::Sender<Option<DeviceAddress>>>,
    discovery: Discovery,
    alarm_override: AlarmOverride,
    bluetooth: BluetoothDiscovery,
    poll_stop_tx: Option<broadcast::Sender<()>>,
    poll_handle: Option<JoinHandle<()>>,
}

impl FusionService {
    /// Start the integration
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            store,
            bus,
            analyzer,
            player,
        } = collaborators;

        let device_tx = Arc::new(watch::channel(config.deviceid).0);
        let alarm_output = Arc::new(watch::channel(config.enable_alarms).0);
        let controller = Controller::new(
            store.clone(),
            bus.clone(),
            device_tx.subscribe(),
            alarm_output,
        );
        controller.publish_alarm_output();

        let mut discovery = Discovery::new();
        if config.auto_discovery_enabled() {
            tracing::info!("Looking for a Fusion stereo");
            discovery.start(store, device_tx.clone());
        } else {
            match config.deviceid {
                Some(id) => tracing::info!("Using stereo at src {}", id),
                None => tracing::warn!("No stereo address configured"),
            }
        }

        let player = if config.play_sound { player } else { None };
        let alarm_override =
            AlarmOverride::start(AlarmSettings::from(config), controller.clone(), player);

        let mut service = Self {
            controller,
            device_tx,
            discovery,
            alarm_override,
            bluetooth: BluetoothDiscovery::new(bus, analyzer),
            poll_stop_tx: None,
            poll_handle: None,
        };

        if config.send_status_requests {
            service.start_status_poll();
        }

        service
    }

    fn start_status_poll(&mut self) {
        let (stop_tx, mut stop_rx) = broadcast::channel(1);
        self.poll_stop_tx = Some(stop_tx);
        let controller = self.controller.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + STATUS_INTERVAL, STATUS_INTERVAL);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => break,
                    _ = ticker.tick() => match controller.send(&Command::Status) {
                        Ok(()) | Err(FusionError::NoDevice) => {}
                        Err(e) => tracing::warn!("status request failed: {}", e),
                    },
                }
            }
        });

        self.poll_handle = Some(handle);
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Bus address of the stereo, once known
    pub fn device(&self) -> Option<DeviceAddress> {
        *self.device_tx.borrow()
    }

    /// Watch for the stereo address becoming known
    pub fn subscribe_device(&self) -> watch::Receiver<Option<DeviceAddress>> {
        self.device_tx.subscribe()
    }

    /// Stereo found by auto-discovery
    pub fn discovered(&self) -> Option<DiscoveredStereo> {
        self.discovery.found()
    }

    /// Ask for a full status as soon as the bus output is up
    pub fn on_output_available(&self) -> Result<()> {
        self.controller.send(&Command::Status)
    }

    /// Handle one command intake request
    pub fn submit(&self, request: &CommandRequest) -> Result<()> {
        self.controller.submit(request)
    }

    /// List the stereo's bluetooth devices
    pub async fn bluetooth_devices(&self) -> Result<Vec<BtDevice>> {
        let device = self.device().ok_or(FusionError::NoDevice)?;
        self.bluetooth.discover(device).await
    }

    /// Feed notification updates to the alarm override
    pub fn notify(&self, batch: Vec<Notification>) -> Result<()> {
        self.alarm_override.notify(batch)
    }

    /// Feed a delta document carrying notification updates
    pub fn notify_delta(&self, delta: &Value) -> Result<()> {
        let batch = Notification::from_delta(delta);
        if batch.is_empty() {
            return Ok(());
        }
        self.notify(batch)
    }

    pub fn override_status(&self) -> OverrideStatus {
        self.alarm_override.status()
    }

    /// Stop every background task
    ///
    /// Pending override steps are dropped and a running alarm sound is
    /// killed; the stereo is left as it is.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.poll_stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.poll_handle.take() {
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
        self.discovery.stop().await;
        self.alarm_override.stop().await;
        tracing::info!("Fusion service stopped");
    }
}
