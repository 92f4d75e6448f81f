use crate::store::StateStore;
use crate::types::{DeviceAddress, DiscoveredStereo};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{interval_at, Instant};

const DISCOVERY_INTERVAL: Duration = Duration::from_secs(5);
const HARDWARE_PREFIX: &str = "FUSION-LINK";

/// Path of the host's source inventory
pub const SOURCES_PATH: &str = "sources";

/// Find the first Fusion stereo in the host's source inventory
///
/// The inventory maps each provider to its devices; a device is a stereo
/// when its `n2k.hardwareVersion` starts with `FUSION-LINK`.
pub fn find_stereo(inventory: &Value) -> Option<DiscoveredStereo> {
    inventory
        .as_object()?
        .values()
        .filter_map(|provider| provider.as_object())
        .flat_map(|devices| devices.values())
        .filter_map(|device| device.get("n2k"))
        .find(|n2k| {
            n2k.get("hardwareVersion")
                .and_then(|v| v.as_str())
                .is_some_and(|v| v.starts_with(HARDWARE_PREFIX))
        })
        .and_then(|n2k| {
            let src = match n2k.get("src")? {
                Value::String(s) => s.parse().ok()?,
                Value::Number(n) => DeviceAddress::try_from(n.as_u64()?).ok()?,
                _ => return None,
            };
            let product_name = n2k
                .get("productName")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Some(DiscoveredStereo { src, product_name })
        })
}

/// Background search for the stereo's bus address
///
/// Scans the source inventory every five seconds until a stereo turns up,
/// then publishes its address and stops.
pub struct Discovery {
    found: Arc<Mutex<Option<DiscoveredStereo>>>,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Discovery {
    pub fn new() -> Self {
        Self {
            found: Arc::new(Mutex::new(None)),
            stop_tx: None,
            task_handle: None,
        }
    }

    /// The stereo found so far
    pub fn found(&self) -> Option<DiscoveredStereo> {
        self.found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start scanning; the address is sent on `device_tx` when found
    pub fn start(
        &mut self,
        store: Arc<dyn StateStore>,
        device_tx: Arc<watch::Sender<Option<DeviceAddress>>>,
    ) {
        if self.task_handle.is_some() {
            tracing::warn!("Stereo discovery already running");
            return;
        }

        let (stop_tx, mut stop_rx) = broadcast::channel(1);
        self.stop_tx = Some(stop_tx);
        let found = self.found.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + DISCOVERY_INTERVAL, DISCOVERY_INTERVAL);

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        tracing::info!("Stereo discovery stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        tracing::debug!("looking for a stereo");
                        let inventory = store.get(SOURCES_PATH);
                        let Some(stereo) = inventory.as_ref().and_then(find_stereo) else {
                            continue;
                        };

                        tracing::info!("Found a {} with src {}", stereo.product_name, stereo.src);
                        device_tx.send_replace(Some(stereo.src));
                        *found.lock().unwrap_or_else(PoisonError::into_inner) = Some(stereo);
                        break;
                    }
                }
            }
        });

        self.task_handle = Some(handle);
    }

    /// Stop scanning; a stereo already found stays available
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn inventory() -> Value {
        json!({
            "can0": {
                "3": {"n2k": {"hardwareVersion": "GPS 19x", "src": "3", "productName": "GPS"}},
                "10": {"n2k": {
                    "hardwareVersion": "FUSION-LINK 1.0",
                    "src": "10",
                    "productName": "MS-RA770"
                }}
            },
            "label": "not a provider"
        })
    }

    #[test]
    fn finds_fusion_link_device() {
        assert_eq!(
            find_stereo(&inventory()),
            Some(DiscoveredStereo {
                src: 10,
                product_name: "MS-RA770".to_string()
            })
        );
        assert_eq!(find_stereo(&json!({"can0": {}})), None);
        assert_eq!(find_stereo(&json!(null)), None);
    }

    #[test]
    fn numeric_src_is_accepted() {
        let inv = json!({
            "n2k-on-ve.can-socket": {"7": {"n2k": {"hardwareVersion": "FUSION-LINK", "src": 7}}}
        });
        assert_eq!(find_stereo(&inv).map(|s| s.src), Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn background_scan_publishes_address() {
        let store = Arc::new(MemoryStore::new());
        let (device_tx, device_rx) = watch::channel(None);
        let mut discovery = Discovery::new();
        discovery.start(store.clone(), Arc::new(device_tx));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(*device_rx.borrow(), None);

        store.publish(SOURCES_PATH, inventory());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(*device_rx.borrow(), Some(10));
        assert_eq!(discovery.found().map(|s| s.product_name), Some("MS-RA770".to_string()));

        discovery.stop().await;
    }
}
