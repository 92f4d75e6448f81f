//! Rust library for controlling Fusion marine stereos over NMEA 2000
//!
//! This library turns high level stereo commands into the proprietary
//! NMEA 2000 frames a Fusion stereo understands, and takes the stereo over
//! to announce vessel alarms. It supports:
//!
//! - Media transport, source selection, volume, mute and power commands
//! - Both legacy comma separated frames and structured JSON messages
//! - Alarm override: switch to the alarm input, play a sound, restore after
//! - Bluetooth device listing through the stereo's menu
//! - Stereo auto-discovery from the host's source inventory
//!
//! # Quick Start
//!
//! ```no_run
//! use fusion_stereo::{bus, CommandRequest, Collaborators, Config, FusionService, MemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_json(r#"{"deviceid": "10", "enableAlarms": true}"#)?;
//!     let (sender, mut receiver) = bus::channel();
//!
//!     let mut service = FusionService::start(
//!         &config,
//!         Collaborators {
//!             store: Arc::new(MemoryStore::new()),
//!             bus: sender,
//!             analyzer: bus::analyzer_channel(),
//!             player: None,
//!         },
//!     );
//!
//!     service.submit(&CommandRequest::new("poweron"))?;
//!
//!     // Hand frames to the bus transport
//!     while let Ok(message) = receiver.json_rx.try_recv() {
//!         println!("{}", serde_json::to_string(&message)?);
//!     }
//!
//!     service.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Encoding Directly
//!
//! Without the service, a single command can be encoded for a known
//! stereo address:
//!
//! ```
//! use fusion_stereo::{encoder::encode, Command};
//!
//! let frame = encode(&Command::Status, 10, None, None).unwrap();
//! assert!(frame.as_legacy().unwrap().to_string().ends_with(",6,126720,1,10,4,a3,99,01,00"));
//! ```
//!
//! # Architecture
//!
//! - **Codec / Encoder / Protocol**: identifiers, byte layouts and frames
//! - **Bus**: outbound text and JSON channels, inbound analyzer feed
//! - **Store**: the host's data model, read through `DeviceView`
//! - **Controller**: command intake, context lookup and emission
//! - **Takeover**: the alarm override state machine
//! - **Service**: wires everything together and owns background tasks

mod alarm;
mod bluetooth;
pub mod bus;
pub mod codec;
mod command;
mod config;
mod controller;
mod discovery;
pub mod encoder;
mod error;
pub mod logging;
mod playback;
pub mod protocol;
pub mod sequence;
mod service;
mod store;
mod subscription;
mod takeover;
mod types;

// Public exports
pub use alarm::{AlarmTracker, Notification, NotificationValue, TrackerChange};
pub use bluetooth::{BluetoothDiscovery, DISCOVERY_TIMEOUT};
pub use bus::{AnalyzerFeed, BusReceiver, BusSender};
pub use command::{Command, CommandRequest, Intent, MAX_VOLUME};
pub use config::Config;
pub use controller::Controller;
pub use discovery::{find_stereo, Discovery};
pub use error::{FusionError, Result};
pub use playback::{AudioPlayer, CommandPlayer};
pub use protocol::Frame;
pub use service::{Collaborators, FusionService, STATUS_INTERVAL};
pub use store::{DeviceView, MemoryStore, StateStore, DEVICE_PREFIX};
pub use subscription::AnalyzerReceiver;
pub use takeover::{AlarmOverride, AlarmSettings, OverrideStatus, Phase};
pub use types::{AlarmPath, BtDevice, DeviceAddress, DeviceStateSnapshot, DiscoveredStereo};
