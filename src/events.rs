use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services. Event publication is best-effort:
/// a failed send never fails the operation that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Item events
    ItemCreated(Uuid),
    ItemUpdated(Uuid),
    ItemArchived(Uuid),
    LowStock {
        item_id: Uuid,
        quantity: i32,
        reorder_point: i32,
    },

    // Supply request events
    RequestSubmitted(Uuid),
    RequestApproved {
        request_id: Uuid,
        approver_id: Uuid,
    },
    RequestRejected {
        request_id: Uuid,
        approver_id: Uuid,
    },
    RequestReceived(Uuid),

    // Memorandum events
    MemorandumCreated(Uuid),
    MemorandumDeleted(Uuid),

    // Upload events
    FileUploaded {
        attachment_id: Uuid,
        object_key: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Create a connected sender/receiver pair with the given channel capacity.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Background consumer draining the event channel. Events feed the audit log;
/// low-stock events are surfaced at warn level so operators notice them.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::LowStock {
                item_id,
                quantity,
                reorder_point,
            } => {
                warn!(
                    item_id = %item_id,
                    quantity = quantity,
                    reorder_point = reorder_point,
                    "Item at or below reorder point"
                );
            }
            other => {
                info!(event = ?other, "Domain event");
            }
        }
    }
    info!("Event channel closed; event processor shutting down");
}
