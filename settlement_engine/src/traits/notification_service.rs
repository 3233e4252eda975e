use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationServiceError {
    /// The service will never accept this message. Retrying is pointless.
    #[error("The notification was rejected: {0}")]
    Rejected(String),
    #[error("Temporary notification failure: {0}")]
    Transient(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAck {
    pub message_id: String,
}

/// An outbound mail (or SMS, or push) service.
#[allow(async_fn_in_trait)]
pub trait NotificationService {
    async fn send(
        &self,
        to: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<NotificationAck, NotificationServiceError>;
}
