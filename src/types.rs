use crate::codec::ZONE_COUNT;
use serde::{Deserialize, Serialize};

/// Bus address of a device on the NMEA 2000 network
pub type DeviceAddress = u8;

/// Alarm notification identity (its notification path)
pub type AlarmPath = String;

/// Device state captured right before an alarm override
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStateSnapshot {
    /// Selected input as `source<N>`
    pub source_id: String,

    /// Master volume of each zone
    pub zone_volumes: [u32; ZONE_COUNT],

    pub muted: bool,

    pub powered: bool,
}

/// Pairable bluetooth source reported by the stereo's menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtDevice {
    /// Position in the menu, usable with `setBTDevice`
    pub id: u32,
    pub name: String,
}

/// Stereo found in the host's source inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredStereo {
    pub src: DeviceAddress,
    pub product_name: String,
}
