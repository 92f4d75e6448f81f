use crate::error::{FusionError, Result};
use crate::protocol::AnalyzerFrame;
use tokio::sync::broadcast;

/// Receiver for decoded analyzer frames
pub struct AnalyzerReceiver {
    rx: broadcast::Receiver<AnalyzerFrame>,
}

impl AnalyzerReceiver {
    pub(crate) fn new(rx: broadcast::Receiver<AnalyzerFrame>) -> Self {
        Self { rx }
    }

    /// Receive the next analyzer frame
    ///
    /// Returns `BusClosed` once the feed has been dropped.
    pub async fn recv(&mut self) -> Result<AnalyzerFrame> {
        self.rx.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => FusionError::BusClosed,
            broadcast::error::RecvError::Lagged(n) => {
                FusionError::ChannelError(format!("Lagged by {} messages", n))
            }
        })
    }

    /// Try to receive a frame without waiting
    ///
    /// Returns `None` if no frame is queued.
    pub fn try_recv(&mut self) -> Result<Option<AnalyzerFrame>> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(broadcast::error::TryRecvError::Empty) => Ok(None),
            Err(broadcast::error::TryRecvError::Closed) => Err(FusionError::BusClosed),
            Err(broadcast::error::TryRecvError::Lagged(n)) => {
                Err(FusionError::ChannelError(format!("Lagged by {} messages", n)))
            }
        }
    }
}
