use crate::bus::{AnalyzerFeed, BusSender};
use crate::encoder::{end_menu, open_bluetooth_menu};
use crate::error::{FusionError, Result};
use crate::protocol::Frame;
use crate::types::{BtDevice, DeviceAddress};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// How long to wait for the menu to finish listing devices
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Menu entry that follows the last paired device
const SENTINEL: &str = "Discoverable";

/// Lists pairable bluetooth sources by walking the stereo's menu
///
/// Opening the menu makes the stereo stream its entries back as menu
/// item frames. Entries are collected until the "Discoverable" entry
/// shows up, then the menu is closed again.
pub struct BluetoothDiscovery {
    bus: BusSender,
    analyzer: AnalyzerFeed,
    session: tokio::sync::Mutex<()>,
    last_good: Mutex<Option<Vec<BtDevice>>>,
    timeout: Duration,
}

impl BluetoothDiscovery {
    pub fn new(bus: BusSender, analyzer: AnalyzerFeed) -> Self {
        Self {
            bus,
            analyzer,
            session: tokio::sync::Mutex::new(()),
            last_good: Mutex::new(None),
            timeout: DISCOVERY_TIMEOUT,
        }
    }

    /// Query the stereo for its bluetooth devices
    ///
    /// Falls back to the last complete list on timeout. Only one query may
    /// run at a time; a concurrent call fails with `DiscoveryBusy`.
    pub async fn discover(&self, device: DeviceAddress) -> Result<Vec<BtDevice>> {
        let _session = self
            .session
            .try_lock()
            .map_err(|_| FusionError::DiscoveryBusy)?;

        // Listen before asking so no menu item can be missed
        let mut rx = self.analyzer.subscribe();
        for frame in open_bluetooth_menu(device) {
            self.bus.send(Frame::Legacy(frame))?;
        }

        let deadline = Instant::now() + self.timeout;
        let mut devices: Vec<BtDevice> = Vec::new();

        loop {
            match timeout_at(deadline, rx.recv()).await {
                Ok(Ok(frame)) => {
                    let Some(name) = frame.menu_item_text() else {
                        continue;
                    };
                    tracing::debug!("menu item: {}", name);

                    if name == SENTINEL {
                        tracing::debug!("found {} bluetooth device(s)", devices.len());
                        self.bus.send(Frame::Legacy(end_menu(device)))?;
                        *self.last_good.lock().unwrap_or_else(PoisonError::into_inner) =
                            Some(devices.clone());
                        return Ok(devices);
                    }

                    devices.push(BtDevice {
                        id: devices.len() as u32,
                        name: name.to_string(),
                    });
                }
                Ok(Err(FusionError::ChannelError(e))) => {
                    tracing::warn!("bluetooth discovery: {}", e);
                }
                Ok(Err(e)) => {
                    tracing::warn!("bluetooth discovery: {}", e);
                    break;
                }
                Err(_) => {
                    tracing::debug!("timed out waiting for devices");
                    break;
                }
            }
        }

        self.bus.send(Frame::Legacy(end_menu(device)))?;
        self.cached().ok_or(FusionError::DiscoveryTimeout)
    }

    /// Result of the last successful query
    pub fn cached(&self) -> Option<Vec<BtDevice>> {
        self.last_good
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{self, BusReceiver};
    use crate::protocol::AnalyzerFrame;
    use std::sync::Arc;

    fn setup() -> (Arc<BluetoothDiscovery>, AnalyzerFeed, BusReceiver) {
        let (bus, rx) = bus::channel();
        let feed = bus::analyzer_channel();
        (Arc::new(BluetoothDiscovery::new(bus, feed.clone())), feed, rx)
    }

    async fn until_listening(feed: &AnalyzerFeed) {
        while feed.listener_count() == 0 {
            tokio::task::yield_now().await;
        }
    }

    fn end_menu_count(text: &[String]) -> usize {
        text.iter().filter(|t| t.ends_with(",00,00,00,00,04,02")).count()
    }

    fn spawn_discover(
        bt: &Arc<BluetoothDiscovery>,
    ) -> tokio::task::JoinHandle<Result<Vec<BtDevice>>> {
        let bt = bt.clone();
        tokio::spawn(async move { bt.discover(10).await })
    }

    #[tokio::test(start_paused = true)]
    async fn collects_items_until_sentinel() {
        let (bt, feed, mut rx) = setup();
        let task = spawn_discover(&bt);
        until_listening(&feed).await;

        feed.publish(AnalyzerFrame::menu_item("Phone"));
        feed.publish(serde_json::from_value(serde_json::json!({"pgn": 127245})).unwrap());
        feed.publish(AnalyzerFrame::menu_item("Tablet"));
        feed.publish(AnalyzerFrame::menu_item("Discoverable"));

        let devices = task.await.unwrap().unwrap();
        assert_eq!(
            devices,
            [
                BtDevice { id: 0, name: "Phone".to_string() },
                BtDevice { id: 1, name: "Tablet".to_string() },
            ]
        );

        let (text, json) = rx.drain();
        assert!(json.is_empty());
        assert_eq!(text.len(), 4);
        assert_eq!(end_menu_count(&text), 1);
        assert_eq!(bt.cached(), Some(devices));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_without_cache_fails() {
        let (bt, _feed, mut rx) = setup();

        let result = bt.discover(10).await;
        assert!(matches!(result, Err(FusionError::DiscoveryTimeout)));

        let (text, _) = rx.drain();
        assert_eq!(text.len(), 4);
        assert_eq!(end_menu_count(&text), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_returns_cached_list() {
        let (bt, feed, _rx) = setup();

        let task = spawn_discover(&bt);
        until_listening(&feed).await;
        feed.publish(AnalyzerFrame::menu_item("Phone"));
        feed.publish(AnalyzerFrame::menu_item("Discoverable"));
        task.await.unwrap().unwrap();

        let task = spawn_discover(&bt);
        until_listening(&feed).await;
        feed.publish(AnalyzerFrame::menu_item("Laptop"));
        let devices = task.await.unwrap().unwrap();
        assert_eq!(devices, [BtDevice { id: 0, name: "Phone".to_string() }]);
    }

    #[tokio::test(start_paused = true)]
    async fn second_query_while_pending_is_busy() {
        let (bt, feed, _rx) = setup();

        let first = spawn_discover(&bt);
        until_listening(&feed).await;
        assert!(matches!(bt.discover(10).await, Err(FusionError::DiscoveryBusy)));

        feed.publish(AnalyzerFrame::menu_item("Discoverable"));
        assert!(first.await.unwrap().unwrap().is_empty());
    }
}
