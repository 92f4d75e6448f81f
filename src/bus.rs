use crate::error::{FusionError, Result};
use crate::protocol::{AnalyzerFrame, Frame, ProprietaryMessage};
use crate::subscription::AnalyzerReceiver;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Outbound side of the bus
///
/// Legacy frames leave on the text channel and structured messages on the
/// JSON channel, so the transport can hand each to the consumer that
/// understands it.
#[derive(Clone)]
pub struct BusSender {
    text_tx: mpsc::UnboundedSender<String>,
    json_tx: mpsc::UnboundedSender<ProprietaryMessage>,
    sent: Arc<AtomicU64>,
}

/// Receiving ends handed to the bus transport
pub struct BusReceiver {
    pub text_rx: mpsc::UnboundedReceiver<String>,
    pub json_rx: mpsc::UnboundedReceiver<ProprietaryMessage>,
}

/// Create a connected bus sender and receiver pair
pub fn channel() -> (BusSender, BusReceiver) {
    let (text_tx, text_rx) = mpsc::unbounded_channel();
    let (json_tx, json_rx) = mpsc::unbounded_channel();
    (
        BusSender {
            text_tx,
            json_tx,
            sent: Arc::new(AtomicU64::new(0)),
        },
        BusReceiver { text_rx, json_rx },
    )
}

impl BusSender {
    /// Emit one frame on the channel matching its representation
    pub fn send(&self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Legacy(f) => {
                let text = f.to_string();
                tracing::debug!("n2k_msg: {}", text);
                self.text_tx.send(text).map_err(|_| FusionError::BusClosed)?;
            }
            Frame::Structured(m) => {
                tracing::debug!("n2k_json: {}", serde_json::to_string(&m)?);
                self.json_tx.send(m).map_err(|_| FusionError::BusClosed)?;
            }
        }
        self.sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Total frames emitted through this sender and its clones
    pub fn frames_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl BusReceiver {
    /// Drain everything currently queued, legacy text first
    pub fn drain(&mut self) -> (Vec<String>, Vec<ProprietaryMessage>) {
        let mut text = Vec::new();
        while let Ok(t) = self.text_rx.try_recv() {
            text.push(t);
        }
        let mut json = Vec::new();
        while let Ok(m) = self.json_rx.try_recv() {
            json.push(m);
        }
        (text, json)
    }
}

/// Inbound analyzer feed, fanned out to any number of listeners
#[derive(Clone)]
pub struct AnalyzerFeed {
    tx: broadcast::Sender<AnalyzerFrame>,
}

/// Create the broadcast feed that carries decoded inbound frames
pub fn analyzer_channel() -> AnalyzerFeed {
    let (tx, _) = broadcast::channel(100);
    AnalyzerFeed { tx }
}

impl AnalyzerFeed {
    /// Publish a decoded frame to current listeners
    pub fn publish(&self, frame: AnalyzerFrame) {
        // No listeners is the normal case outside discovery
        let _ = self.tx.send(frame);
    }

    pub fn subscribe(&self) -> AnalyzerReceiver {
        AnalyzerReceiver::new(self.tx.subscribe())
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::encoder::encode;

    #[test]
    fn frames_are_routed_by_representation() {
        let (bus, mut rx) = channel();
        bus.send(encode(&Command::Status, 10, None, None).unwrap()).unwrap();
        bus.send(encode(&Command::Mute, 10, None, None).unwrap()).unwrap();

        let (text, json) = rx.drain();
        assert_eq!(text.len(), 1);
        assert!(text[0].ends_with(",6,126720,1,10,4,a3,99,01,00"));
        assert_eq!(json.len(), 1);
        assert_eq!(bus.frames_sent(), 2);
    }

    #[test]
    fn send_fails_once_receiver_is_dropped() {
        let (bus, rx) = channel();
        drop(rx);
        assert!(matches!(
            bus.send(encode(&Command::Status, 10, None, None).unwrap()),
            Err(FusionError::BusClosed)
        ));
    }
}
