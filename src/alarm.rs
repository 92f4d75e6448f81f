use crate::types::AlarmPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Alarm states that take over the stereo
const SOUNDING_STATES: [&str; 2] = ["alarm", "emergency"];

/// One notification update delivered by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub path: AlarmPath,
    #[serde(default)]
    pub value: Option<NotificationValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationValue {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub method: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Notification {
    pub fn new(path: impl Into<AlarmPath>, state: &str, method: &[&str]) -> Self {
        Self {
            path: path.into(),
            value: Some(NotificationValue {
                state: Some(state.to_string()),
                method: method.iter().map(|m| m.to_string()).collect(),
                message: None,
            }),
        }
    }

    /// A cleared notification (null value)
    pub fn cleared(path: impl Into<AlarmPath>) -> Self {
        Self {
            path: path.into(),
            value: None,
        }
    }

    /// Alarm or emergency, announced by sound
    pub fn is_sounding(&self) -> bool {
        self.value.as_ref().is_some_and(|v| {
            v.state
                .as_deref()
                .is_some_and(|s| SOUNDING_STATES.contains(&s))
                && v.method.iter().any(|m| m == "sound")
        })
    }

    /// Extract notification updates from a delta document
    ///
    /// Entries without a path are skipped; values that do not look like
    /// a notification are treated as cleared.
    pub fn from_delta(delta: &Value) -> Vec<Notification> {
        let Some(updates) = delta.get("updates").and_then(|u| u.as_array()) else {
            return Vec::new();
        };

        updates
            .iter()
            .filter_map(|update| update.get("values").and_then(|v| v.as_array()))
            .flatten()
            .filter_map(|pv| {
                let path = pv.get("path")?.as_str()?.to_string();
                let value = pv
                    .get("value")
                    .and_then(|v| serde_json::from_value::<NotificationValue>(v.clone()).ok());
                Some(Notification { path, value })
            })
            .collect()
    }
}

/// Sounding alarms, keyed by notification path
///
/// The alarm override is active exactly while this is non-empty.
#[derive(Debug, Default, Clone)]
pub struct AlarmTracker {
    active: BTreeMap<AlarmPath, String>,
}

/// Result of applying one notification batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrackerChange {
    pub added: usize,
    pub removed: usize,
}

impl AlarmTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a batch of notifications
    ///
    /// Decisions for the whole batch are made before the map is touched.
    pub fn apply(&mut self, batch: &[Notification]) -> TrackerChange {
        let decisions: Vec<(&str, Option<&str>)> = batch
            .iter()
            .map(|n| {
                let state = n
                    .is_sounding()
                    .then(|| n.value.as_ref().and_then(|v| v.state.as_deref()))
                    .flatten();
                (n.path.as_str(), state)
            })
            .collect();

        let mut change = TrackerChange::default();
        for (path, state) in decisions {
            match state {
                Some(state) => {
                    if self.active.insert(path.to_string(), state.to_string()).is_none() {
                        change.added += 1;
                    }
                }
                None => {
                    if self.active.remove(path).is_some() {
                        change.removed += 1;
                    }
                }
            }
        }
        change
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn paths(&self) -> Vec<AlarmPath> {
        self.active.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.active.clear();
    }
}
