// Event bus for internal change notifications

use tokio::sync::broadcast;
use tracing::debug;

use crate::message::ChangeNotification;

const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus. Every subscriber sees every notification published after it
/// subscribed; slow subscribers may observe `Lagged` and should treat it as
/// "something changed".
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeNotification>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers that received the notification.
    pub fn publish(&self, notification: ChangeNotification) -> usize {
        match self.sender.send(notification) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(dropped)) => {
                debug!("📭 No subscribers for change on campaign {}", dropped.campaign_id);
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
