//! Runs one alarm episode against an in-memory stereo and prints every
//! frame that would go out on the bus.
//!
//! ```text
//! cargo run --example alarm_drill
//! FUSION_LOG_LEVEL=debug cargo run --example alarm_drill
//! ```

use fusion_stereo::logging::{init_logging, LoggingMode};
use fusion_stereo::{
    bus, Collaborators, CommandRequest, Config, FusionService, MemoryStore, Notification, Phase,
    StateStore, DEVICE_PREFIX,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn stereo() -> MemoryStore {
    let store = MemoryStore::new();
    let p = DEVICE_PREFIX;
    store.publish(&format!("{p}.output.zone1.source"), json!(format!("{p}.avsource.source0")));
    store.publish(&format!("{p}.avsource.source0.name"), json!("AM"));
    store.publish(&format!("{p}.avsource.source5.name"), json!("Aux1"));
    for zone in 1..=4 {
        store.publish(&format!("{p}.output.zone{zone}.volume.master"), json!(4));
    }
    store.publish(&format!("{p}.output.zone1.isMuted"), json!(true));
    store.publish(&format!("{p}.state"), json!("off"));
    store
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingMode::Development)?;

    let config = Config::from_json(
        r#"{
            "deviceid": 10,
            "enableAlarms": true,
            "playSound": false,
            "alarmSetVolume": true,
            "alarmVolume": 18,
            "alarmZone4": false,
            "sendStatusRequests": false
        }"#,
    )?;

    let (sender, mut receiver) = bus::channel();
    let mut service = FusionService::start(
        &config,
        Collaborators {
            store: Arc::new(stereo()),
            bus: sender,
            analyzer: bus::analyzer_channel(),
            player: None,
        },
    );

    let printer = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(text) = receiver.text_rx.recv() => println!("text  {}", text),
                Some(message) = receiver.json_rx.recv() => match serde_json::to_string(&message) {
                    Ok(json) => println!("json  {}", json),
                    Err(e) => eprintln!("unprintable message: {}", e),
                },
                else => break,
            }
        }
    });

    service.on_output_available()?;
    service.submit(&CommandRequest::new("setVolume").with_zone("zone2").with_value(json!(9)))?;

    println!("-- raising alarm");
    service.notify(vec![Notification::new(
        "notifications.bilge",
        "alarm",
        &["visual", "sound"],
    )])?;
    tokio::time::sleep(Duration::from_secs(4)).await;

    println!("-- clearing alarm");
    service.notify(vec![Notification::cleared("notifications.bilge")])?;

    while service.override_status().phase != Phase::Idle {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    println!("-- stereo restored");

    service.stop().await;
    drop(service);
    let _ = tokio::time::timeout(Duration::from_secs(1), printer).await;
    Ok(())
}
