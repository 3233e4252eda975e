use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use settlement_engine::{
    events::{EventHandlers, EventHooks},
    notify_settled_order,
    settlement_api::notifications::NotificationDispatcher,
    traits::{NotificationAck, NotificationService, NotificationServiceError},
};

use crate::{config::NotificationApiConfig, errors::ServerError};

pub const NOTIFICATION_EVENT_BUFFER_SIZE: usize = 50;

/// Sends templated messages through an HTTP mail service.
#[derive(Clone)]
pub struct HttpNotificationService {
    url: String,
    client: Arc<Client>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    template: &'a str,
    data: &'a serde_json::Value,
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(alias = "id")]
    message_id: String,
}

impl HttpNotificationService {
    pub fn new(config: &NotificationApiConfig) -> Result<Self, ServerError> {
        let mut headers = HeaderMap::with_capacity(2);
        if !config.api_key.is_empty() {
            let auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key.reveal()))
                .map_err(|e| ServerError::InitializeError(format!("Invalid notification API key. {e}")))?;
            headers.insert(AUTHORIZATION, auth);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ServerError::InitializeError(e.to_string()))?;
        let url = format!("{}/messages", config.api_url.trim_end_matches('/'));
        Ok(Self { url, client: Arc::new(client) })
    }
}

impl NotificationService for HttpNotificationService {
    async fn send(
        &self,
        to: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<NotificationAck, NotificationServiceError> {
        let body = SendRequest { to, template, data };
        trace!("📨 POST {} ({template} to {to})", self.url);
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationServiceError::Transient(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            let ack = response
                .json::<SendResponse>()
                .await
                .map_err(|e| NotificationServiceError::Transient(format!("unreadable response. {e}")))?;
            Ok(NotificationAck { message_id: ack.message_id })
        } else {
            let message = response.text().await.unwrap_or_default();
            if status.is_server_error() || status.as_u16() == 408 || status.as_u16() == 429 {
                Err(NotificationServiceError::Transient(format!("{status}: {message}")))
            } else {
                Err(NotificationServiceError::Rejected(format!("{status}: {message}")))
            }
        }
    }
}

/// Creates the event handlers that send order confirmations in the background.
///
/// Only the `OrderSettled` event is of interest. Each settled order gets its confirmation sent through `dispatcher`,
/// with the dispatcher's retry policy. Failures are logged and otherwise ignored, since the order has already settled.
pub fn create_notification_event_handlers(dispatcher: NotificationDispatcher<HttpNotificationService>) -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_order_settled(move |ev| {
        let dispatcher = dispatcher.clone();
        Box::pin(async move {
            debug!("📨 Sending the confirmation for order {} in the background", ev.order.id);
            notify_settled_order(&dispatcher, &ev).await;
        })
    });
    EventHandlers::new(NOTIFICATION_EVENT_BUFFER_SIZE, hooks)
}
