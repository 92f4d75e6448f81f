use crate::codec::ZONE_COUNT;
use crate::error::{FusionError, Result};
use crate::types::DeviceStateSnapshot;
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};

/// Path prefix under which the stereo reports its state
pub const DEVICE_PREFIX: &str = "entertainment.device.fusion1";

/// Key-value view of the host's data model
pub trait StateStore: Send + Sync {
    /// Look up the value at a dotted path
    fn get(&self, path: &str) -> Option<Value>;

    /// Publish a value at a dotted path
    fn publish(&self, path: &str, value: Value);
}

/// In-memory [`StateStore`] over a nested JSON tree
#[derive(Debug, Default)]
pub struct MemoryStore {
    root: Mutex<Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
        }
    }
}

impl StateStore for MemoryStore {
    fn get(&self, path: &str) -> Option<Value> {
        let root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        path.split('.')
            .try_fold(&*root, |node, part| node.get(part))
            .cloned()
    }

    fn publish(&self, path: &str, value: Value) {
        let mut root = self.root.lock().unwrap_or_else(PoisonError::into_inner);
        let mut node = &mut *root;
        for part in path.split('.') {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = match node {
                Value::Object(obj) => obj.entry(part.to_string()).or_insert(Value::Null),
                _ => return,
            };
        }
        *node = value;
    }
}

/// Typed reads of the stereo's reported state
pub struct DeviceView<'a> {
    store: &'a dyn StateStore,
}

impl<'a> DeviceView<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self { store }
    }

    fn get(&self, suffix: &str) -> Option<Value> {
        self.store.get(&format!("{}.{}", DEVICE_PREFIX, suffix))
    }

    /// Currently selected source as `source<N>`
    pub fn current_source_id(&self) -> Option<String> {
        let full = self.get("output.zone1.source")?;
        let full = full.as_str()?;
        let prefix = format!("{}.avsource.", DEVICE_PREFIX);
        Some(full.strip_prefix(&prefix).unwrap_or(full).to_string())
    }

    /// Display name of a source
    pub fn source_name(&self, source_id: &str) -> Option<String> {
        self.get(&format!("avsource.{}.name", source_id))?
            .as_str()
            .map(str::to_string)
    }

    pub fn current_source_name(&self) -> Option<String> {
        self.source_name(&self.current_source_id()?)
    }

    /// Find the source id whose display name is `name`
    pub fn find_source(&self, name: &str) -> Option<String> {
        let sources = self.get("avsource")?;
        sources
            .as_object()?
            .iter()
            .find(|(_, source)| source.get("name").and_then(|n| n.as_str()) == Some(name))
            .map(|(id, _)| id.clone())
    }

    /// Master volume of a zone (1-based), 0 when unknown
    pub fn zone_volume(&self, zone: usize) -> u32 {
        self.get(&format!("output.zone{}.volume.master", zone))
            .and_then(|v| v.as_u64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    }

    pub fn zone_volumes(&self) -> [u32; ZONE_COUNT] {
        std::array::from_fn(|i| self.zone_volume(i + 1))
    }

    pub fn muted(&self) -> Option<bool> {
        self.get("output.zone1.isMuted")?.as_bool()
    }

    /// Raw power state, `"on"` or `"off"`
    pub fn power_state(&self) -> Option<String> {
        self.get("state")?.as_str().map(str::to_string)
    }

    pub fn powered(&self) -> bool {
        self.power_state().as_deref() == Some("on")
    }

    pub fn playing(&self) -> Option<bool> {
        self.get("playbackState")?.as_bool()
    }

    pub fn output_alarms(&self) -> Option<bool> {
        self.get("outputAlarms")?.as_bool()
    }

    /// Capture the state an alarm override has to put back afterwards
    pub fn snapshot(&self) -> Result<DeviceStateSnapshot> {
        let source_id = self
            .current_source_id()
            .ok_or_else(|| FusionError::DeviceUnavailable("no current source".to_string()))?;

        Ok(DeviceStateSnapshot {
            source_id,
            zone_volumes: self.zone_volumes(),
            muted: self.muted().unwrap_or(false),
            powered: self.powered(),
        })
    }
}

/// Publish a value under the device prefix
pub fn publish_device(store: &dyn StateStore, suffix: &str, value: Value) {
    store.publish(&format!("{}.{}", DEVICE_PREFIX, suffix), value);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Stereo on source3 ("AM/FM"), zone volumes 5/6/7/8, unmuted, powered on
    pub(crate) fn stereo_store() -> MemoryStore {
        let store = MemoryStore::new();
        let p = DEVICE_PREFIX;
        store.publish(&format!("{p}.output.zone1.source"), json!(format!("{p}.avsource.source3")));
        store.publish(&format!("{p}.avsource.source3.name"), json!("AM/FM"));
        store.publish(&format!("{p}.avsource.source5.name"), json!("Aux1"));
        store.publish(&format!("{p}.avsource.source7.name"), json!("SiriusXM"));
        for (zone, vol) in [(1, 5), (2, 6), (3, 7), (4, 8)] {
            store.publish(&format!("{p}.output.zone{zone}.volume.master"), json!(vol));
        }
        store.publish(&format!("{p}.output.zone1.isMuted"), json!(false));
        store.publish(&format!("{p}.state"), json!("on"));
        store
    }

    #[test]
    fn memory_store_nests_dotted_paths() {
        let store = MemoryStore::new();
        store.publish("a.b.c", json!(1));
        store.publish("a.b.d", json!("x"));
        assert_eq!(store.get("a.b"), Some(json!({"c": 1, "d": "x"})));
        assert_eq!(store.get("a.b.c"), Some(json!(1)));
        assert_eq!(store.get("a.z"), None);

        // A leaf is replaced by a subtree when a deeper path is published
        store.publish("a.b.c.e", json!(true));
        assert_eq!(store.get("a.b.c"), Some(json!({"e": true})));
    }

    #[test]
    fn device_view_reads_current_source() {
        let store = stereo_store();
        let view = DeviceView::new(&store);
        assert_eq!(view.current_source_id().as_deref(), Some("source3"));
        assert_eq!(view.current_source_name().as_deref(), Some("AM/FM"));
        assert_eq!(view.find_source("Aux1").as_deref(), Some("source5"));
        assert_eq!(view.find_source("Aux2"), None);
    }

    #[test]
    fn snapshot_captures_volumes_mute_and_power() {
        let store = stereo_store();
        let snapshot = DeviceView::new(&store).snapshot().unwrap();
        assert_eq!(
            snapshot,
            DeviceStateSnapshot {
                source_id: "source3".to_string(),
                zone_volumes: [5, 6, 7, 8],
                muted: false,
                powered: true,
            }
        );
    }

    #[test]
    fn snapshot_without_source_is_unavailable() {
        let store = MemoryStore::new();
        assert!(matches!(
            DeviceView::new(&store).snapshot(),
            Err(FusionError::DeviceUnavailable(_))
        ));
    }
}
