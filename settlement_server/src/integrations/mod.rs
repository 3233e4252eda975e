//! HTTP clients for the marketplace's external collaborators, and the event handlers that use them.
mod notification_service;
mod payment_processor;

pub use notification_service::{create_notification_event_handlers, HttpNotificationService, NOTIFICATION_EVENT_BUFFER_SIZE};
pub use payment_processor::{classify_status, HttpPaymentProcessor, IDEMPOTENCY_HEADER, SIGNATURE_HEADER};
