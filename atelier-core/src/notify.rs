use async_trait::async_trait;
use atelier_shared::BuyerNotification;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification transport failed: {0}")]
    Transport(String),
    #[error("Notification encoding failed: {0}")]
    Encoding(String),
}

/// Hands buyer notifications to whatever renders and delivers them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &BuyerNotification) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of a queue.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &BuyerNotification) -> Result<(), NotifyError> {
        tracing::info!(
            account_id = %notification.account_id,
            order_id = %notification.order_id,
            kind = notification.kind_name(),
            "Buyer notification (log only)"
        );
        Ok(())
    }
}

/// Keeps every notification in memory. Can be told to fail every send.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<BuyerNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<BuyerNotification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &BuyerNotification) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("recording notifier set to fail".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        Ok(())
    }
}

/// Front door for every state transition that wants to tell the buyer about it.
///
/// Dispatch never fails: by the time it runs the transition is already stored.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn Notifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn logging() -> Self {
        Self::new(Arc::new(LogNotifier))
    }

    pub async fn dispatch(&self, notification: BuyerNotification) {
        if let Err(e) = self.notifier.send(&notification).await {
            tracing::error!(
                order_id = %notification.order_id,
                kind = notification.kind_name(),
                "Failed to dispatch buyer notification: {}",
                e
            );
        }
    }
}
