//! Whale intent intake.
//!
//! Unlike the order-book and derivatives streams, this sub-stream has no
//! socket of its own: it is a channel fed by the HTTP webhook handler
//! (`http::webhook`), which decodes native transfers and ERC-20 Transfer
//! logs into `WhaleIntent`s and pushes them here.

use tokio::sync::mpsc;

use super::types::WhaleIntent;

/// Bounded so a burst of webhook deliveries cannot grow memory unbounded;
/// whale intents are inherently transient (30s validity window) so dropping
/// under extreme backpressure is acceptable.
const CHANNEL_CAPACITY: usize = 256;

pub struct WhaleIntake {
    sender: mpsc::Sender<WhaleIntent>,
}

impl WhaleIntake {
    /// Returns the producer handle (kept by the HTTP webhook handler) and the
    /// consumer handle (kept by the Engine).
    pub fn channel() -> (WhaleIntake, mpsc::Receiver<WhaleIntent>) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (WhaleIntake { sender: tx }, rx)
    }

    pub async fn publish(&self, intent: WhaleIntent) -> bool {
        self.sender.send(intent).await.is_ok()
    }

    pub fn sender(&self) -> mpsc::Sender<WhaleIntent> {
        self.sender.clone()
    }
}
